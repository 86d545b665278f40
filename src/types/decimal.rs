//! DECIMAL, carried as a 64-bit float.

use crate::codegen::ir::{ArithOp, CmpPred, IrType, Reg};
use crate::codegen::{CodeGen, TypedValue};
use crate::error::{ArithFault, CodegenResult};
use crate::types::integer::{Narrow, ToBoolean};
use crate::types::{
    BinaryOp, Comparison, OpOutput, OperatorId, TextCast, TypeDescriptor, TypeId, TypeRegistry,
    UnaryOp,
};
use std::sync::Arc;

pub(crate) fn register(registry: &TypeRegistry) {
    let id = TypeId::DECIMAL;
    registry.install_type(TypeDescriptor::fixed(id, "Decimal", IrType::F64));
    registry.register_comparison(id, Arc::new(DecimalComparison));

    for (op, arith) in [
        (OperatorId::Add, ArithOp::Add),
        (OperatorId::Sub, ArithOp::Sub),
        (OperatorId::Mul, ArithOp::Mul),
    ] {
        registry.register_binary(op, id, id, id, Arc::new(Arithmetic(arith)));
    }
    registry.register_binary(OperatorId::Div, id, id, id, Arc::new(Division(ArithOp::Div)));
    registry.register_binary(OperatorId::Mod, id, id, id, Arc::new(Division(ArithOp::Rem)));
    registry.register_unary(OperatorId::Negate, id, id, Arc::new(Negate));

    registry.register_cast(id, TypeId::SMALLINT, false, Arc::new(Narrow(IrType::I16)));
    registry.register_cast(id, TypeId::INTEGER, false, Arc::new(Narrow(IrType::I32)));
    registry.register_cast(id, TypeId::BIGINT, false, Arc::new(Narrow(IrType::I64)));
    registry.register_cast(id, TypeId::BOOLEAN, false, Arc::new(ToBoolean));
    registry.register_cast(id, TypeId::VARCHAR, false, Arc::new(TextCast));
}

struct DecimalComparison;

impl Comparison for DecimalComparison {
    fn compare(
        &self,
        cg: &mut CodeGen,
        pred: CmpPred,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        Ok(cg.cmp(pred, left.value_reg()?, right.value_reg()?))
    }

    // -0 and +0 sort together. Every NaN sorts after all numbers and equal
    // to any other NaN, although `=` never holds for NaN.
    fn compare_for_sort(
        &self,
        cg: &mut CodeGen,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        let lhs = sort_key(cg, left.value_reg()?);
        let rhs = sort_key(cg, right.value_reg()?);
        Ok(cg.three_way(lhs, rhs))
    }
}

/// Fold signed zeros and NaN payloads into one representative each
fn sort_key(cg: &mut CodeGen, value: Reg) -> Reg {
    let zero = cg.const_f64(0.0);
    let nan = cg.const_f64(f64::NAN);
    let is_zero = cg.cmp(CmpPred::Eq, value, zero);
    let is_nan = cg.cmp(CmpPred::Ne, value, value);
    let value = cg.select(is_zero, zero, value);
    cg.select(is_nan, nan, value)
}

struct Arithmetic(ArithOp);

impl BinaryOp for Arithmetic {
    fn emit(&self, cg: &mut CodeGen, left: &TypedValue, right: &TypedValue) -> CodegenResult<OpOutput> {
        Ok(OpOutput::new(cg.arith(
            self.0,
            left.value_reg()?,
            right.value_reg()?,
        )))
    }
}

/// Floats would quietly produce inf or NaN; SQL wants a division error
struct Division(ArithOp);

impl BinaryOp for Division {
    fn emit(&self, cg: &mut CodeGen, left: &TypedValue, right: &TypedValue) -> CodegenResult<OpOutput> {
        let divisor = right.value_reg()?;
        let zero = cg.const_f64(0.0);
        let one = cg.const_f64(1.0);
        let is_zero = cg.cmp(CmpPred::Eq, divisor, zero);
        let safe_divisor = cg.select(is_zero, one, divisor);
        let value = cg.arith(self.0, left.value_reg()?, safe_divisor);
        Ok(OpOutput::new(value).with_fault(is_zero, ArithFault::DivideByZero))
    }
}

struct Negate;

impl UnaryOp for Negate {
    fn emit(&self, cg: &mut CodeGen, operand: &TypedValue) -> CodegenResult<OpOutput> {
        let zero = cg.const_f64(0.0);
        Ok(OpOutput::new(cg.arith(ArithOp::Sub, zero, operand.value_reg()?)))
    }
}
