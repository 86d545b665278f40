use crate::codegen::ir::{IrType, Scalar};
use crate::types::{SqlType, TypeId};
use anyhow::{bail, Result};
use std::fmt;

/// A SQL datum: literals, input rows and decoded results
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Decimal(f64),
    Varchar(String),
}

impl Value {
    /// Get the type of this value; `None` for an untyped NULL
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(TypeId::BOOLEAN),
            Value::SmallInt(_) => Some(TypeId::SMALLINT),
            Value::Integer(_) => Some(TypeId::INTEGER),
            Value::BigInt(_) => Some(TypeId::BIGINT),
            Value::Decimal(_) => Some(TypeId::DECIMAL),
            Value::Varchar(_) => Some(TypeId::VARCHAR),
        }
    }

    /// Check if this value can be stored in a column of the given type
    pub fn is_compatible_with(&self, ty: SqlType) -> bool {
        match self {
            Value::Null => ty.nullable,
            other => other.type_id() == Some(ty.id),
        }
    }

    /// Encode as the (value, length, null) register triple of generated
    /// code. A NULL gets zeroed value and length registers.
    pub fn to_scalars(&self, ty: SqlType, ir_type: IrType) -> Result<[Scalar; 3]> {
        if !self.is_compatible_with(ty) {
            bail!("Value {:?} is not compatible with type {}", self, ty);
        }
        let (value, length) = match self {
            Value::Null => (Scalar::zero(ir_type), 0),
            Value::Boolean(b) => (Scalar::Bool(*b), 0),
            Value::SmallInt(i) => (Scalar::I16(*i), 0),
            Value::Integer(i) => (Scalar::I32(*i), 0),
            Value::BigInt(i) => (Scalar::I64(*i), 0),
            Value::Decimal(d) => (Scalar::F64(*d), 0),
            Value::Varchar(s) => {
                let len = i32::try_from(s.len())?;
                (Scalar::Str(s.clone()), len)
            }
        };
        if value.ir_type() != ir_type {
            bail!("Type {} is not stored as {}", ty, ir_type);
        }
        Ok([value, Scalar::I32(length), Scalar::Bool(self.is_null())])
    }

    /// Decode a register triple produced by generated code
    pub fn from_scalars(ty: SqlType, value: &Scalar, length: &Scalar, null: &Scalar) -> Result<Value> {
        if ty.nullable {
            match null {
                Scalar::Bool(true) => return Ok(Value::Null),
                Scalar::Bool(false) => {}
                other => bail!("Invalid null indicator: {}", other),
            }
        }
        let decoded = match (ty.id, value) {
            (TypeId::BOOLEAN, Scalar::Bool(b)) => Value::Boolean(*b),
            (TypeId::SMALLINT, Scalar::I16(i)) => Value::SmallInt(*i),
            (TypeId::INTEGER, Scalar::I32(i)) => Value::Integer(*i),
            (TypeId::BIGINT, Scalar::I64(i)) => Value::BigInt(*i),
            (TypeId::DECIMAL, Scalar::F64(d)) => Value::Decimal(*d),
            (TypeId::VARCHAR, Scalar::Str(s)) => {
                let len = match length {
                    Scalar::I32(len) => usize::try_from(*len)?,
                    other => bail!("Invalid string length: {}", other),
                };
                match s.get(..len) {
                    Some(text) => Value::Varchar(text.to_string()),
                    None => bail!("Invalid string value: length {} exceeds {:?}", len, s),
                }
            }
            (_, other) => bail!("Cannot decode {} as {}", other, ty),
        };
        Ok(decoded)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::SmallInt(i) => write!(f, "{}", i),
            Value::Integer(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Varchar(s) => write!(f, "'{}'", s),
        }
    }
}
