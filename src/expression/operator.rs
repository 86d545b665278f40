//! Operator definitions for expressions.

use crate::codegen::ir::CmpPred;
use crate::types::OperatorId;

/// Binary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,

    // LEAST / GREATEST of two values
    Least,
    Greatest,
}

impl BinaryOperator {
    /// The registry operator behind an arithmetic operator
    pub fn arithmetic(&self) -> Option<OperatorId> {
        match self {
            BinaryOperator::Add => Some(OperatorId::Add),
            BinaryOperator::Sub => Some(OperatorId::Sub),
            BinaryOperator::Mul => Some(OperatorId::Mul),
            BinaryOperator::Div => Some(OperatorId::Div),
            BinaryOperator::Mod => Some(OperatorId::Mod),
            _ => None,
        }
    }

    /// The predicate behind a comparison operator
    pub fn comparison(&self) -> Option<CmpPred> {
        match self {
            BinaryOperator::Eq => Some(CmpPred::Eq),
            BinaryOperator::Ne => Some(CmpPred::Ne),
            BinaryOperator::Lt => Some(CmpPred::Lt),
            BinaryOperator::Le => Some(CmpPred::Le),
            BinaryOperator::Gt => Some(CmpPred::Gt),
            BinaryOperator::Ge => Some(CmpPred::Ge),
            _ => None,
        }
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Least => "LEAST",
            BinaryOperator::Greatest => "GREATEST",
        }
    }
}

/// Unary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    // Logical
    Not,

    // NULL checks
    IsNull,
    IsNotNull,

    // Arithmetic
    Minus,
}

impl UnaryOperator {
    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "NOT",
            UnaryOperator::IsNull => "IS NULL",
            UnaryOperator::IsNotNull => "IS NOT NULL",
            UnaryOperator::Minus => "-",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_classification() {
        assert_eq!(BinaryOperator::Mod.arithmetic(), Some(OperatorId::Mod));
        assert_eq!(BinaryOperator::Eq.arithmetic(), None);
        assert_eq!(BinaryOperator::Le.comparison(), Some(CmpPred::Le));
        assert_eq!(BinaryOperator::And.comparison(), None);
        assert_eq!(BinaryOperator::Least.comparison(), None);
    }

    #[test]
    fn test_operator_display() {
        // Binary operators
        assert_eq!(BinaryOperator::Add.as_str(), "+");
        assert_eq!(BinaryOperator::Eq.as_str(), "=");
        assert_eq!(BinaryOperator::Ne.as_str(), "!=");
        assert_eq!(BinaryOperator::And.as_str(), "AND");
        assert_eq!(BinaryOperator::Greatest.as_str(), "GREATEST");

        // Unary operators
        assert_eq!(UnaryOperator::Not.as_str(), "NOT");
        assert_eq!(UnaryOperator::IsNull.as_str(), "IS NULL");
        assert_eq!(UnaryOperator::IsNotNull.as_str(), "IS NOT NULL");
    }
}
