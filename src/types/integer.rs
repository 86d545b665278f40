//! SMALLINT, INTEGER and BIGINT.
//!
//! Arithmetic reports overflow through the machine's overflow flag.
//! Division and modulo also report a zero divisor, and divide by a
//! substituted divisor of one so the instruction itself never traps.

use crate::codegen::ir::{ArithOp, CmpPred, IrType, Reg};
use crate::codegen::{CodeGen, TypedValue};
use crate::error::{ArithFault, CodegenResult};
use crate::types::{
    BinaryOp, Cast, Comparison, OpOutput, OperatorId, TextCast, TypeDescriptor, TypeId,
    TypeRegistry, UnaryOp,
};
use std::sync::Arc;

/// Integer types from narrowest to widest
const INTEGER_TYPES: [(TypeId, &str, IrType); 3] = [
    (TypeId::SMALLINT, "SmallInt", IrType::I16),
    (TypeId::INTEGER, "Integer", IrType::I32),
    (TypeId::BIGINT, "BigInt", IrType::I64),
];

pub(crate) fn register(registry: &TypeRegistry) {
    for (id, name, ir_type) in INTEGER_TYPES {
        registry.install_type(TypeDescriptor::fixed(id, name, ir_type));

        registry.register_comparison(id, Arc::new(IntegerComparison));

        for (op, arith) in [
            (OperatorId::Add, ArithOp::Add),
            (OperatorId::Sub, ArithOp::Sub),
            (OperatorId::Mul, ArithOp::Mul),
        ] {
            registry.register_binary(op, id, id, id, Arc::new(CheckedArithmetic(arith)));
        }
        registry.register_binary(OperatorId::Div, id, id, id, Arc::new(CheckedDivision(ArithOp::Div)));
        registry.register_binary(OperatorId::Mod, id, id, id, Arc::new(CheckedDivision(ArithOp::Rem)));
        registry.register_unary(OperatorId::Negate, id, id, Arc::new(Negate));

        registry.register_cast(id, TypeId::DECIMAL, true, Arc::new(Widen(IrType::F64)));
        registry.register_cast(id, TypeId::BOOLEAN, false, Arc::new(ToBoolean));
        registry.register_cast(id, TypeId::VARCHAR, false, Arc::new(TextCast));
    }

    for (i, (from, _, _)) in INTEGER_TYPES.iter().enumerate() {
        for (j, (to, _, to_ir)) in INTEGER_TYPES.iter().enumerate() {
            if i < j {
                registry.register_cast(*from, *to, true, Arc::new(Widen(*to_ir)));
            } else if i > j {
                registry.register_cast(*from, *to, false, Arc::new(Narrow(*to_ir)));
            }
        }
    }
}

/// Comparison shared by every integer width
pub(crate) struct IntegerComparison;

impl Comparison for IntegerComparison {
    fn compare(
        &self,
        cg: &mut CodeGen,
        pred: CmpPred,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        Ok(cg.cmp(pred, left.value_reg()?, right.value_reg()?))
    }

    fn compare_for_sort(
        &self,
        cg: &mut CodeGen,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        Ok(cg.three_way(left.value_reg()?, right.value_reg()?))
    }
}

/// Add, subtract or multiply with overflow detection
struct CheckedArithmetic(ArithOp);

impl BinaryOp for CheckedArithmetic {
    fn emit(&self, cg: &mut CodeGen, left: &TypedValue, right: &TypedValue) -> CodegenResult<OpOutput> {
        let (value, overflow) = cg.checked_arith(self.0, left.value_reg()?, right.value_reg()?);
        Ok(OpOutput::new(value).with_fault(overflow, ArithFault::Overflow))
    }
}

/// Divide or take the remainder, detecting a zero divisor and MIN / -1
struct CheckedDivision(ArithOp);

impl BinaryOp for CheckedDivision {
    fn emit(&self, cg: &mut CodeGen, left: &TypedValue, right: &TypedValue) -> CodegenResult<OpOutput> {
        let divisor = right.value_reg()?;
        let ty = cg.reg_type(divisor);
        let zero = cg.const_zero(ty);
        let one = cg.const_one(ty);
        let is_zero = cg.cmp(CmpPred::Eq, divisor, zero);
        let safe_divisor = cg.select(is_zero, one, divisor);
        let (value, overflow) = cg.checked_arith(self.0, left.value_reg()?, safe_divisor);
        Ok(OpOutput::new(value)
            .with_fault(is_zero, ArithFault::DivideByZero)
            .with_fault(overflow, ArithFault::Overflow))
    }
}

/// Arithmetic negation; negating MIN overflows
struct Negate;

impl UnaryOp for Negate {
    fn emit(&self, cg: &mut CodeGen, operand: &TypedValue) -> CodegenResult<OpOutput> {
        let value = operand.value_reg()?;
        let zero = cg.const_zero(cg.reg_type(value));
        let (negated, overflow) = cg.checked_arith(ArithOp::Sub, zero, value);
        Ok(OpOutput::new(negated).with_fault(overflow, ArithFault::Overflow))
    }
}

/// Lossless conversion, e.g. to a wider integer or to DECIMAL
pub(crate) struct Widen(pub(crate) IrType);

impl Cast for Widen {
    fn emit(&self, cg: &mut CodeGen, value: &TypedValue, _to: TypeId) -> CodegenResult<OpOutput> {
        Ok(OpOutput::new(cg.convert(value.value_reg()?, self.0)))
    }
}

/// Conversion to a narrower integer; values out of range overflow
pub(crate) struct Narrow(pub(crate) IrType);

impl Cast for Narrow {
    fn emit(&self, cg: &mut CodeGen, value: &TypedValue, _to: TypeId) -> CodegenResult<OpOutput> {
        let (narrowed, out_of_range) = cg.checked_convert(value.value_reg()?, self.0);
        Ok(OpOutput::new(narrowed).with_fault(out_of_range, ArithFault::Overflow))
    }
}

/// Non-zero is true
pub(crate) struct ToBoolean;

impl Cast for ToBoolean {
    fn emit(&self, cg: &mut CodeGen, value: &TypedValue, _to: TypeId) -> CodegenResult<OpOutput> {
        let value = value.value_reg()?;
        let zero = cg.const_zero(cg.reg_type(value));
        Ok(OpOutput::new(cg.cmp(CmpPred::Ne, value, zero)))
    }
}
