//! VARCHAR: a string register plus a byte-length register.

use crate::codegen::ir::{CmpPred, IrType, Reg};
use crate::codegen::{CodeGen, TypedValue};
use crate::error::CodegenResult;
use crate::types::{Comparison, TypeDescriptor, TypeId, TypeRegistry};
use std::sync::Arc;

pub(crate) fn register(registry: &TypeRegistry) {
    let id = TypeId::VARCHAR;
    registry.install_type(TypeDescriptor::variable(id, "Varchar", IrType::Str));
    registry.register_comparison(id, Arc::new(VarcharComparison));
}

struct VarcharComparison;

impl VarcharComparison {
    /// Byte-wise compare of the first `length` bytes of each side
    fn compare_bytes(
        cg: &mut CodeGen,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        Ok(cg.str_cmp(
            left.value_reg()?,
            left.length_reg()?,
            right.value_reg()?,
            right.length_reg()?,
        ))
    }
}

impl Comparison for VarcharComparison {
    fn compare(
        &self,
        cg: &mut CodeGen,
        pred: CmpPred,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        let order = Self::compare_bytes(cg, left, right)?;
        let zero = cg.const_i32(0);
        Ok(cg.cmp(pred, order, zero))
    }

    fn compare_for_sort(
        &self,
        cg: &mut CodeGen,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<Reg> {
        Self::compare_bytes(cg, left, right)
    }
}
