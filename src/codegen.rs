//! Code generation for SQL values.
//!
//! [`CodeGen`] emits a small SSA-form IR, [`Interpreter`] executes it, and
//! [`TypedValue`] is the SQL-level view of registers in that IR.

pub mod builder;
pub mod hash;
pub mod interp;
pub mod ir;
pub mod value;

pub use builder::CodeGen;
pub use hash::Hash;
pub use interp::Interpreter;
pub use value::{Materialized, TypedValue};
