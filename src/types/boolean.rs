//! BOOLEAN.
//!
//! Three-valued AND/OR live on [`TypedValue`] itself since they must see
//! the null indicators; this module only supplies NOT, comparison
//! (false < true) and casts.

use crate::codegen::ir::{CmpPred, IrType, Reg};
use crate::codegen::{CodeGen, TypedValue};
use crate::error::CodegenResult;
use crate::types::integer::Widen;
use crate::types::{
    Comparison, OpOutput, OperatorId, TextCast, TypeDescriptor, TypeId, TypeRegistry, UnaryOp,
};
use std::sync::Arc;

pub(crate) fn register(registry: &TypeRegistry) {
    let id = TypeId::BOOLEAN;
    registry.install_type(TypeDescriptor::fixed(id, "Boolean", IrType::Bool));
    registry.register_comparison(id, Arc::new(BooleanComparison));
    registry.register_unary(OperatorId::Not, id, id, Arc::new(Not));

    registry.register_cast(id, TypeId::SMALLINT, false, Arc::new(Widen(IrType::I16)));
    registry.register_cast(id, TypeId::INTEGER, false, Arc::new(Widen(IrType::I32)));
    registry.register_cast(id, TypeId::BIGINT, false, Arc::new(Widen(IrType::I64)));
    registry.register_cast(id, TypeId::VARCHAR, false, Arc::new(TextCast));
}

struct BooleanComparison;

impl Comparison for BooleanComparison {
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

struct Not;

impl UnaryOp for Not {
    fn emit(&self, cg: &mut CodeGen, operand: &TypedValue) -> CodegenResult<OpOutput> {
        Ok(OpOutput::new(cg.not(operand.value_reg()?)))
    }
}
