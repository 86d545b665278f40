pub mod codegen;
pub mod config;
pub mod error;
pub mod expression;
pub mod types;
pub mod value;
