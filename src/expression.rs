//! Expressions compiled to generated code.
//!
//! This module provides:
//! - Expression AST representation
//! - Compilation of expressions, sort comparators and key equality/hash
//!   functions over input rows
//! - Evaluation of compiled functions against rows of values

pub mod compile;
pub mod expr;
pub mod operator;

pub use compile::{CompiledExpression, ExpressionCompiler, SortKey};
pub use expr::{ColumnRef, Expression, Literal};
pub use operator::{BinaryOperator, UnaryOperator};
