//! Error types for code generation and for executing generated code.

use crate::types::TypeId;
use thiserror::Error;

/// Errors raised while generating code. These abort compilation of the
/// enclosing query; nothing falls back to a default behavior.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    #[error("No operator {operator} registered for left={left}, right={right:?}")]
    NoSuchOperator {
        operator: String,
        left: String,
        right: Option<String>,
    },

    #[error("No cast path from {from} to {to}")]
    NoCastPath { from: String, to: String },

    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Cannot build a PHI without incoming values")]
    EmptyPhi,

    #[error("PHI inputs have different types: {0} and {1}")]
    PhiTypeMismatch(String, String),

    #[error("Value lists have different lengths: {left} and {right}")]
    ArityMismatch { left: usize, right: usize },

    #[error("Unknown type id {0:?}")]
    UnknownType(TypeId),

    #[error("Type {0} is already registered")]
    DuplicateType(String),

    #[error("Column index {index} out of bounds for row with {row_size} columns")]
    ColumnIndexOutOfBounds { index: usize, row_size: usize },

    #[error("Block {0} has no terminator")]
    UnterminatedBlock(String),

    #[error("Block {0} is already terminated")]
    BlockAlreadyTerminated(String),
}

/// Result type for code generation
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Numeric faults that generated code can hit at runtime
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithFault {
    #[error("numeric value out of range")]
    Overflow,

    #[error("division by zero")]
    DivideByZero,
}

/// Errors raised while executing generated code
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithFault),

    #[error("Trap in generated code: {0}")]
    Trap(String),

    #[error("Expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
}

/// Result type for executing generated code
pub type RuntimeResult<T> = Result<T, RuntimeError>;
