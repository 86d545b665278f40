//! Expression AST definitions.

use crate::expression::operator::{BinaryOperator, UnaryOperator};
use crate::types::TypeId;
use crate::value::Value;

/// Column reference in an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Column index in the input row (0-based)
    pub index: usize,
    /// Optional column name for debugging/display
    pub name: Option<String>,
}

impl ColumnRef {
    pub fn new(index: usize) -> Self {
        Self { index, name: None }
    }

    pub fn with_name(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: Some(name.into()),
        }
    }
}

/// Literal value in an expression. Typed NULLs are [`Expression::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn bool(val: bool) -> Self {
        Self::new(Value::Boolean(val))
    }

    pub fn int32(val: i32) -> Self {
        Self::new(Value::Integer(val))
    }

    pub fn int64(val: i64) -> Self {
        Self::new(Value::BigInt(val))
    }

    pub fn decimal(val: f64) -> Self {
        Self::new(Value::Decimal(val))
    }

    pub fn string(val: impl Into<String>) -> Self {
        Self::new(Value::Varchar(val.into()))
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal constant value
    Literal(Literal),

    /// NULL of a given type
    Null(TypeId),

    /// Column reference
    ColumnRef(ColumnRef),

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// CAST(expr AS to)
    Cast { expr: Box<Expression>, to: TypeId },

    /// CASE WHEN ... THEN ... ELSE ... END; a missing ELSE yields NULL
    Case {
        conditions: Vec<(Expression, Expression)>,
        else_result: Option<Box<Expression>>,
    },
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: Value) -> Self {
        Expression::Literal(Literal::new(value))
    }

    /// Create a typed NULL expression
    pub fn null(ty: TypeId) -> Self {
        Expression::Null(ty)
    }

    /// Create a column reference expression
    pub fn column(index: usize) -> Self {
        Expression::ColumnRef(ColumnRef::new(index))
    }

    /// Create a column reference with name
    pub fn column_with_name(index: usize, name: impl Into<String>) -> Self {
        Expression::ColumnRef(ColumnRef::with_name(index, name))
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn cast(expr: Expression, to: TypeId) -> Self {
        Expression::Cast {
            expr: Box::new(expr),
            to,
        }
    }

    pub fn case(conditions: Vec<(Expression, Expression)>, else_result: Option<Expression>) -> Self {
        Expression::Case {
            conditions,
            else_result: else_result.map(Box::new),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Or, left, right)
    }

    pub fn not_expr(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::Not, operand)
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Eq, left, right)
    }

    pub fn lt(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Lt, left, right)
    }

    pub fn gt(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Gt, left, right)
    }

    pub fn add_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Add, left, right)
    }

    pub fn sub_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Sub, left, right)
    }

    pub fn mul_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Mul, left, right)
    }

    pub fn div_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Div, left, right)
    }

    pub fn is_null(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::IsNull, operand)
    }

    pub fn is_not_null(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::IsNotNull, operand)
    }

    /// Check if this expression is a constant (contains no column references)
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) | Expression::Null(_) => true,
            Expression::ColumnRef(_) => false,
            Expression::BinaryOp { left, right, .. } => left.is_constant() && right.is_constant(),
            Expression::UnaryOp { operand, .. } => operand.is_constant(),
            Expression::Cast { expr, .. } => expr.is_constant(),
            Expression::Case {
                conditions,
                else_result,
            } => {
                conditions
                    .iter()
                    .all(|(cond, res)| cond.is_constant() && res.is_constant())
                    && else_result
                        .as_ref()
                        .map(|e| e.is_constant())
                        .unwrap_or(true)
            }
        }
    }
}
