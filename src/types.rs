//! SQL types and the per-type operator implementations behind them.
//!
//! The type set is open: a [`TypeId`] is just a number, and everything a
//! type can do (casts, comparisons, arithmetic, arbitrary named operators)
//! is looked up in a [`TypeRegistry`] at code generation time. Built-in
//! types live in the submodules and are installed by
//! [`TypeRegistry::with_builtins`].

pub mod boolean;
pub mod decimal;
pub mod integer;
pub mod registry;
pub mod varchar;

pub use registry::{BinaryOpEntry, TypeRegistry, UnaryOpEntry};

use crate::codegen::ir::{CmpPred, IrType, Reg};
use crate::codegen::{CodeGen, TypedValue};
use crate::error::{ArithFault, CodegenResult};
use std::fmt;

/// Identifier of a SQL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u16);

impl TypeId {
    /// Type of the empty sentinel value; never registered
    pub const INVALID: TypeId = TypeId(0);
    pub const BOOLEAN: TypeId = TypeId(1);
    pub const SMALLINT: TypeId = TypeId(2);
    pub const INTEGER: TypeId = TypeId(3);
    pub const BIGINT: TypeId = TypeId(4);
    pub const DECIMAL: TypeId = TypeId(5);
    pub const VARCHAR: TypeId = TypeId(6);

    /// First id available to types registered outside this crate
    pub const FIRST_CUSTOM: u16 = 64;
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TypeId::INVALID => f.write_str("Invalid"),
            TypeId::BOOLEAN => f.write_str("Boolean"),
            TypeId::SMALLINT => f.write_str("SmallInt"),
            TypeId::INTEGER => f.write_str("Integer"),
            TypeId::BIGINT => f.write_str("BigInt"),
            TypeId::DECIMAL => f.write_str("Decimal"),
            TypeId::VARCHAR => f.write_str("Varchar"),
            TypeId(id) => write!(f, "Type#{}", id),
        }
    }
}

/// A SQL type together with its nullability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlType {
    pub id: TypeId,
    pub nullable: bool,
}

impl SqlType {
    pub fn new(id: TypeId, nullable: bool) -> Self {
        Self { id, nullable }
    }

    pub fn not_null(id: TypeId) -> Self {
        Self::new(id, false)
    }

    pub fn nullable(id: TypeId) -> Self {
        Self::new(id, true)
    }

    pub fn as_nullable(self) -> Self {
        Self::new(self.id, true)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} NOT NULL", self.id)
        }
    }
}

/// How a type is laid out in registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub id: TypeId,
    pub name: String,
    /// Type of the primary register
    pub ir_type: IrType,
    /// Whether values carry a length register
    pub variable_length: bool,
}

impl TypeDescriptor {
    pub fn fixed(id: TypeId, name: impl Into<String>, ir_type: IrType) -> Self {
        Self {
            id,
            name: name.into(),
            ir_type,
            variable_length: false,
        }
    }

    pub fn variable(id: TypeId, name: impl Into<String>, ir_type: IrType) -> Self {
        Self {
            id,
            name: name.into(),
            ir_type,
            variable_length: true,
        }
    }
}

/// Identifies an operator in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Negate,
    Not,
    /// Operators registered by name, e.g. by an extension type
    Named(&'static str),
}

impl OperatorId {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorId::Add => "+",
            OperatorId::Sub => "-",
            OperatorId::Mul => "*",
            OperatorId::Div => "/",
            OperatorId::Mod => "%",
            OperatorId::Negate => "-",
            OperatorId::Not => "NOT",
            OperatorId::Named(name) => name,
        }
    }
}

/// Registers produced by an operator implementation, plus the runtime
/// fault conditions it detected. The caller decides what a fault does.
#[derive(Debug, Clone, PartialEq)]
pub struct OpOutput {
    pub value: Reg,
    pub length: Option<Reg>,
    /// Boolean flag registers, each set when its fault occurred
    pub faults: Vec<(Reg, ArithFault)>,
}

impl OpOutput {
    pub fn new(value: Reg) -> Self {
        Self {
            value,
            length: None,
            faults: Vec::new(),
        }
    }

    pub fn with_length(mut self, length: Reg) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_fault(mut self, flag: Reg, fault: ArithFault) -> Self {
        self.faults.push((flag, fault));
        self
    }
}

/// Comparisons between two values of the same type.
///
/// Implementations see only non-null content; NULL handling is done by
/// [`TypedValue`].
pub trait Comparison: Send + Sync {
    /// Emit a boolean register holding `left <pred> right`
    fn compare(
        &self,
        cg: &mut CodeGen,
        pred: CmpPred,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg>;

    /// Emit an i32 register holding -1, 0 or 1, defining a total order
    fn compare_for_sort(
        &self,
        cg: &mut CodeGen,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg>;
}

/// Conversion of a value to another type
pub trait Cast: Send + Sync {
    fn emit(&self, cg: &mut CodeGen, value: &TypedValue, to: TypeId) -> CodegenResult<OpOutput>;
}

pub trait BinaryOp: Send + Sync {
    fn emit(
        &self,
        cg: &mut CodeGen,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<OpOutput>;
}

pub trait UnaryOp: Send + Sync {
    fn emit(&self, cg: &mut CodeGen, operand: &TypedValue) -> CodegenResult<OpOutput>;
}

/// Text rendering of any fixed-length value
pub(crate) struct TextCast;

impl Cast for TextCast {
    fn emit(&self, cg: &mut CodeGen, value: &TypedValue, _to: TypeId) -> CodegenResult<OpOutput> {
        let (text, len) = cg.format(value.value_reg()?);
        Ok(OpOutput::new(text).with_length(len))
    }
}
