//! SQL values inside generated code.
//!
//! A [`TypedValue`] pairs a SQL type with the registers that hold the value
//! at runtime: the primary register, a length register for variable-length
//! types, and a null indicator for nullable types. Values are immutable;
//! every operation emits instructions and returns a new value.
//!
//! Operator semantics come from the [`crate::types::TypeRegistry`]. This
//! module owns what is common to all types: NULL propagation, SQL
//! three-valued logic, the overflow policy, merging values at control-flow
//! joins, and the register triple used for materialization.

use crate::codegen::ir::{BlockId, CmpPred, IrType, Reg};
use crate::codegen::CodeGen;
use crate::config::{MinMaxNulls, NullOrder, OnError};
use crate::error::{ArithFault, CodegenError, CodegenResult};
use crate::types::{Comparison, OpOutput, OperatorId, SqlType, TypeId};
use crate::value::Value;
use log::debug;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    ty: SqlType,
    value: Option<Reg>,
    length: Option<Reg>,
    null: Option<Reg>,
}

/// The canonical (value, length, null) register triple of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materialized {
    pub value: Reg,
    /// Placeholder zero for fixed-length types
    pub length: Reg,
    /// Placeholder false for non-nullable types
    pub null: Reg,
}

impl Default for TypedValue {
    /// The empty value, standing for "not computed yet"
    fn default() -> Self {
        Self {
            ty: SqlType::not_null(TypeId::INVALID),
            value: None,
            length: None,
            null: None,
        }
    }
}

impl TypedValue {
    /// Build a value from registers, checking them against the type's layout
    pub fn new(
        cg: &CodeGen,
        ty: SqlType,
        value: Reg,
        length: Option<Reg>,
        null: Option<Reg>,
    ) -> CodegenResult<Self> {
        let descriptor = cg.registry().descriptor(ty.id)?;
        check_reg(cg, value, descriptor.ir_type, || {
            format!("value register of {}", descriptor.name)
        })?;
        if let Some(length) = length {
            check_reg(cg, length, IrType::I32, || {
                format!("length register of {}", descriptor.name)
            })?;
        }
        if let Some(null) = null {
            check_reg(cg, null, IrType::Bool, || format!("null indicator of {}", ty))?;
        }
        if descriptor.variable_length != length.is_some() {
            return Err(CodegenError::InvalidValue(format!(
                "{} {} a length register",
                descriptor.name,
                if descriptor.variable_length {
                    "requires"
                } else {
                    "cannot carry"
                }
            )));
        }
        if ty.nullable != null.is_some() {
            return Err(CodegenError::InvalidValue(format!(
                "{} {} a null indicator",
                ty,
                if ty.nullable { "requires" } else { "cannot carry" }
            )));
        }
        Ok(Self::from_parts(ty, value, length, null))
    }

    /// A NULL of the given type
    pub fn null(cg: &mut CodeGen, id: TypeId) -> CodegenResult<Self> {
        let descriptor = cg.registry().descriptor(id)?;
        let value = cg.const_zero(descriptor.ir_type);
        let length = descriptor.variable_length.then(|| cg.const_i32(0));
        let null = cg.const_bool(true);
        Ok(Self::from_parts(SqlType::nullable(id), value, length, Some(null)))
    }

    /// A non-null constant
    pub fn constant(cg: &mut CodeGen, value: &Value) -> CodegenResult<Self> {
        let (id, value, length) = match value {
            Value::Null => {
                return Err(CodegenError::InvalidValue(
                    "a NULL constant needs a type".to_string(),
                ))
            }
            Value::Boolean(v) => (TypeId::BOOLEAN, cg.const_bool(*v), None),
            Value::SmallInt(v) => (TypeId::SMALLINT, cg.const_i16(*v), None),
            Value::Integer(v) => (TypeId::INTEGER, cg.const_i32(*v), None),
            Value::BigInt(v) => (TypeId::BIGINT, cg.const_i64(*v), None),
            Value::Decimal(v) => (TypeId::DECIMAL, cg.const_f64(*v), None),
            Value::Varchar(s) => {
                let len = i32::try_from(s.len()).map_err(|_| {
                    CodegenError::InvalidValue("string constant too long".to_string())
                })?;
                let length = cg.const_i32(len);
                (TypeId::VARCHAR, cg.const_str(s.as_str()), Some(length))
            }
        };
        Ok(Self::from_parts(SqlType::not_null(id), value, length, None))
    }

    fn from_parts(ty: SqlType, value: Reg, length: Option<Reg>, null: Option<Reg>) -> Self {
        Self {
            ty,
            value: Some(value),
            length,
            null,
        }
    }

    //===--------------------------------------------------------------------===//
    // Accessors
    //===--------------------------------------------------------------------===//

    pub fn sql_type(&self) -> SqlType {
        self.ty
    }

    pub fn type_id(&self) -> TypeId {
        self.ty.id
    }

    pub fn is_nullable(&self) -> bool {
        self.ty.nullable
    }

    /// True for the default-constructed sentinel
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn value(&self) -> Option<Reg> {
        self.value
    }

    pub fn length(&self) -> Option<Reg> {
        self.length
    }

    pub(crate) fn value_reg(&self) -> CodegenResult<Reg> {
        self.value
            .ok_or_else(|| CodegenError::InvalidValue("use of an empty value".to_string()))
    }

    pub(crate) fn length_reg(&self) -> CodegenResult<Reg> {
        self.length.ok_or_else(|| {
            CodegenError::InvalidValue(format!("{} value has no length register", self.ty))
        })
    }

    /// Boolean register that is true when this value is NULL. Free for
    /// non-nullable types: the result is a constant false.
    pub fn is_null(&self, cg: &mut CodeGen) -> Reg {
        match self.null {
            Some(null) => null,
            None => cg.const_bool(false),
        }
    }

    pub fn is_not_null(&self, cg: &mut CodeGen) -> Reg {
        match self.null {
            Some(null) => cg.not(null),
            None => cg.const_bool(true),
        }
    }

    //===--------------------------------------------------------------------===//
    // Casting
    //===--------------------------------------------------------------------===//

    /// Convert to `to`. NULL stays NULL; the result is nullable when either
    /// this value or the target type is.
    pub fn cast_to(&self, cg: &mut CodeGen, to: SqlType) -> CodegenResult<TypedValue> {
        let value = self.value_reg()?;
        let nullable = to.nullable || self.is_nullable();
        let null = match self.null {
            Some(null) => Some(null),
            None if nullable => Some(cg.const_bool(false)),
            None => None,
        };
        let result_type = SqlType::new(to.id, nullable);

        if self.type_id() == to.id {
            return Ok(Self::from_parts(result_type, value, self.length, null));
        }

        let registry = Arc::clone(cg.registry());
        let cast = registry.resolve_cast(self.type_id(), to.id)?;
        let output = cast.emit(cg, self, to.id)?;
        // Casts have no per-call error policy: a lossy cast always raises
        for (flag, fault) in Self::mask_faults(cg, output.faults, self.null) {
            cg.trap_if(flag, fault)?;
        }
        Ok(Self::from_parts(
            result_type,
            output.value,
            output.length,
            null,
        ))
    }

    fn as_boolean(&self, cg: &mut CodeGen) -> CodegenResult<TypedValue> {
        if self.type_id() == TypeId::BOOLEAN {
            return Ok(self.clone());
        }
        self.cast_to(cg, SqlType::new(TypeId::BOOLEAN, self.is_nullable()))
    }

    //===--------------------------------------------------------------------===//
    // Comparisons
    //===--------------------------------------------------------------------===//

    pub fn compare_eq(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.compare(cg, CmpPred::Eq, other)
    }

    pub fn compare_ne(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.compare(cg, CmpPred::Ne, other)
    }

    pub fn compare_lt(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.compare(cg, CmpPred::Lt, other)
    }

    pub fn compare_lte(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.compare(cg, CmpPred::Le, other)
    }

    pub fn compare_gt(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.compare(cg, CmpPred::Gt, other)
    }

    pub fn compare_gte(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.compare(cg, CmpPred::Ge, other)
    }

    /// Boolean comparison; NULL if either side is NULL
    pub fn compare(
        &self,
        cg: &mut CodeGen,
        pred: CmpPred,
        other: &TypedValue,
    ) -> CodegenResult<TypedValue> {
        let (left, right, comparison) = self.reconcile_for_compare(cg, other)?;
        let value = comparison.compare(cg, pred, &left, &right)?;
        let null = Self::null_union(cg, &left, &right);
        Ok(Self::from_parts(
            SqlType::new(TypeId::BOOLEAN, null.is_some()),
            value,
            None,
            null,
        ))
    }

    /// Pairwise equality of two value lists, ANDed with three-valued logic.
    /// An empty pair of lists is equal.
    pub fn test_equality(
        cg: &mut CodeGen,
        lhs: &[TypedValue],
        rhs: &[TypedValue],
    ) -> CodegenResult<TypedValue> {
        if lhs.len() != rhs.len() {
            return Err(CodegenError::ArityMismatch {
                left: lhs.len(),
                right: rhs.len(),
            });
        }
        let mut result = Self::constant(cg, &Value::Boolean(true))?;
        for (l, r) in lhs.iter().zip(rhs) {
            let eq = l.compare_eq(cg, r)?;
            result = result.logical_and(cg, &eq)?;
        }
        Ok(result)
    }

    /// Three-way compare for sorting: negative, zero or positive as this
    /// value sorts before, with or after `other`. Never NULL; NULLs are
    /// placed according to the configured [`NullOrder`].
    pub fn compare_for_sort(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        let (left, right, comparison) = self.reconcile_for_compare(cg, other)?;
        let mut order = comparison.compare_for_sort(cg, &left, &right)?;

        if left.null.is_some() || right.null.is_some() {
            let (before, after) = match cg.config().null_order {
                NullOrder::First => (-1, 1),
                NullOrder::Last => (1, -1),
            };
            if let Some(right_null) = right.null {
                let after = cg.const_i32(after);
                order = cg.select(right_null, after, order);
            }
            if let Some(left_null) = left.null {
                let before = cg.const_i32(before);
                order = cg.select(left_null, before, order);
            }
            if let (Some(left_null), Some(right_null)) = (left.null, right.null) {
                let both = cg.and(left_null, right_null);
                let zero = cg.const_i32(0);
                order = cg.select(both, zero, order);
            }
        }

        Ok(Self::from_parts(
            SqlType::not_null(TypeId::INTEGER),
            order,
            None,
            None,
        ))
    }

    /// Cast both sides to the type their comparison is registered for
    fn reconcile_for_compare(
        &self,
        cg: &mut CodeGen,
        other: &TypedValue,
    ) -> CodegenResult<(TypedValue, TypedValue, Arc<dyn Comparison>)> {
        let registry = Arc::clone(cg.registry());
        let (common, comparison) = registry.resolve_comparison(self.type_id(), other.type_id())?;
        let left = self.cast_to(cg, SqlType::new(common, self.is_nullable()))?;
        let right = other.cast_to(cg, SqlType::new(common, other.is_nullable()))?;
        Ok((left, right, comparison))
    }

    //===--------------------------------------------------------------------===//
    // Arithmetic
    //===--------------------------------------------------------------------===//

    pub fn add(&self, cg: &mut CodeGen, other: &TypedValue, on_error: OnError) -> CodegenResult<TypedValue> {
        self.call_binary(cg, OperatorId::Add, other, on_error)
    }

    pub fn sub(&self, cg: &mut CodeGen, other: &TypedValue, on_error: OnError) -> CodegenResult<TypedValue> {
        self.call_binary(cg, OperatorId::Sub, other, on_error)
    }

    pub fn mul(&self, cg: &mut CodeGen, other: &TypedValue, on_error: OnError) -> CodegenResult<TypedValue> {
        self.call_binary(cg, OperatorId::Mul, other, on_error)
    }

    pub fn div(&self, cg: &mut CodeGen, other: &TypedValue, on_error: OnError) -> CodegenResult<TypedValue> {
        self.call_binary(cg, OperatorId::Div, other, on_error)
    }

    pub fn modulo(&self, cg: &mut CodeGen, other: &TypedValue, on_error: OnError) -> CodegenResult<TypedValue> {
        self.call_binary(cg, OperatorId::Mod, other, on_error)
    }

    pub fn negate(&self, cg: &mut CodeGen, on_error: OnError) -> CodegenResult<TypedValue> {
        self.call_unary(cg, OperatorId::Negate, on_error)
    }

    pub fn min(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.pick(cg, CmpPred::Lt, other)
    }

    pub fn max(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        self.pick(cg, CmpPred::Gt, other)
    }

    /// Keep this value where it sorts `pred` relative to `other`, else `other`.
    /// Ordering by the sort-compare makes NaN the largest decimal, whichever
    /// side it is on.
    fn pick(&self, cg: &mut CodeGen, pred: CmpPred, other: &TypedValue) -> CodegenResult<TypedValue> {
        let (left, right, comparison) = self.reconcile_for_compare(cg, other)?;
        let order = comparison.compare_for_sort(cg, &left, &right)?;
        let zero = cg.const_i32(0);
        let mut pick_left = cg.cmp(pred, order, zero);

        let policy = cg.config().min_max_nulls;
        let null = match policy {
            MinMaxNulls::Propagate => Self::null_union(cg, &left, &right),
            MinMaxNulls::IgnoreNull => {
                if let Some(right_null) = right.null {
                    let yes = cg.const_bool(true);
                    pick_left = cg.select(right_null, yes, pick_left);
                }
                if let Some(left_null) = left.null {
                    let no = cg.const_bool(false);
                    pick_left = cg.select(left_null, no, pick_left);
                }
                match (left.null, right.null) {
                    (Some(l), Some(r)) => Some(cg.and(l, r)),
                    _ => None,
                }
            }
        };

        let value = cg.select(pick_left, left.value_reg()?, right.value_reg()?);
        let length = match (left.length, right.length) {
            (Some(l), Some(r)) => Some(cg.select(pick_left, l, r)),
            _ => None,
        };
        Ok(Self::from_parts(
            SqlType::new(left.type_id(), null.is_some()),
            value,
            length,
            null,
        ))
    }

    //===--------------------------------------------------------------------===//
    // Generic dispatch
    //===--------------------------------------------------------------------===//

    /// Apply any registered binary operator. Operands are promoted to the
    /// operator's signature, NULL propagates, and numeric faults follow
    /// `on_error`.
    pub fn call_binary(
        &self,
        cg: &mut CodeGen,
        op: OperatorId,
        other: &TypedValue,
        on_error: OnError,
    ) -> CodegenResult<TypedValue> {
        let registry = Arc::clone(cg.registry());
        let entry = registry.resolve_binary(op, self.type_id(), other.type_id())?;
        let left = self.cast_to(cg, SqlType::new(entry.left, self.is_nullable()))?;
        let right = other.cast_to(cg, SqlType::new(entry.right, other.is_nullable()))?;
        let output = entry.imp.emit(cg, &left, &right)?;
        let operand_null = Self::null_union(cg, &left, &right);
        Self::apply_fault_policy(cg, entry.result, output, operand_null, on_error)
    }

    /// Apply any registered unary operator
    pub fn call_unary(&self, cg: &mut CodeGen, op: OperatorId, on_error: OnError) -> CodegenResult<TypedValue> {
        let registry = Arc::clone(cg.registry());
        let entry = registry.resolve_unary(op, self.type_id())?;
        let operand = self.cast_to(cg, SqlType::new(entry.operand, self.is_nullable()))?;
        let output = entry.imp.emit(cg, &operand)?;
        Self::apply_fault_policy(cg, entry.result, output, operand.null, on_error)
    }

    fn apply_fault_policy(
        cg: &mut CodeGen,
        result: TypeId,
        output: OpOutput,
        operand_null: Option<Reg>,
        on_error: OnError,
    ) -> CodegenResult<TypedValue> {
        let faults = Self::mask_faults(cg, output.faults, operand_null);
        let null = match on_error {
            OnError::Exception => {
                for (flag, fault) in faults {
                    cg.trap_if(flag, fault)?;
                }
                operand_null
            }
            OnError::ReturnNull => {
                let flags = operand_null.into_iter().chain(faults.into_iter().map(|(flag, _)| flag));
                match cg.or_all(flags) {
                    Some(null) => Some(null),
                    None => Some(cg.const_bool(false)),
                }
            }
        };
        Ok(Self::from_parts(
            SqlType::new(result, null.is_some()),
            output.value,
            output.length,
            null,
        ))
    }

    /// A NULL operand's registers hold garbage; its faults do not count
    fn mask_faults(
        cg: &mut CodeGen,
        faults: Vec<(Reg, ArithFault)>,
        operand_null: Option<Reg>,
    ) -> Vec<(Reg, ArithFault)> {
        match operand_null {
            None => faults,
            Some(null) => {
                let not_null = cg.not(null);
                faults
                    .into_iter()
                    .map(|(flag, fault)| (cg.and(flag, not_null), fault))
                    .collect()
            }
        }
    }

    fn null_union(cg: &mut CodeGen, left: &TypedValue, right: &TypedValue) -> Option<Reg> {
        cg.or_all(left.null.into_iter().chain(right.null))
    }

    //===--------------------------------------------------------------------===//
    // Logical operators
    //===--------------------------------------------------------------------===//

    /// SQL AND: false if either side is false, else NULL if either is NULL
    pub fn logical_and(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        let left = self.as_boolean(cg)?;
        let right = other.as_boolean(cg)?;
        let (l, r) = (left.value_reg()?, right.value_reg()?);

        let Some(any_null) = Self::null_union(cg, &left, &right) else {
            let value = cg.and(l, r);
            return Ok(Self::from_parts(SqlType::not_null(TypeId::BOOLEAN), value, None, None));
        };

        let left_false = Self::known(cg, &left, false);
        let right_false = Self::known(cg, &right, false);
        let any_false = cg.or(left_false, right_false);
        let value = cg.not(any_false);
        let null = cg.and(any_null, value);
        Ok(Self::from_parts(SqlType::nullable(TypeId::BOOLEAN), value, None, Some(null)))
    }

    /// SQL OR: true if either side is true, else NULL if either is NULL
    pub fn logical_or(&self, cg: &mut CodeGen, other: &TypedValue) -> CodegenResult<TypedValue> {
        let left = self.as_boolean(cg)?;
        let right = other.as_boolean(cg)?;
        let (l, r) = (left.value_reg()?, right.value_reg()?);

        let Some(any_null) = Self::null_union(cg, &left, &right) else {
            let value = cg.or(l, r);
            return Ok(Self::from_parts(SqlType::not_null(TypeId::BOOLEAN), value, None, None));
        };

        let left_true = Self::known(cg, &left, true);
        let right_true = Self::known(cg, &right, true);
        let value = cg.or(left_true, right_true);
        let not_true = cg.not(value);
        let null = cg.and(any_null, not_true);
        Ok(Self::from_parts(SqlType::nullable(TypeId::BOOLEAN), value, None, Some(null)))
    }

    /// SQL NOT; NOT NULL is NULL
    pub fn logical_not(&self, cg: &mut CodeGen) -> CodegenResult<TypedValue> {
        self.as_boolean(cg)?
            .call_unary(cg, OperatorId::Not, OnError::Exception)
    }

    /// True when a boolean value is non-null and equal to `truth`
    fn known(cg: &mut CodeGen, value: &TypedValue, truth: bool) -> Reg {
        let Some(reg) = value.value else {
            return cg.const_bool(false);
        };
        let matches = if truth { reg } else { cg.not(reg) };
        match value.null {
            Some(null) => {
                let not_null = cg.not(null);
                cg.and(matches, not_null)
            }
            None => matches,
        }
    }

    //===--------------------------------------------------------------------===//
    // Control-flow merge
    //===--------------------------------------------------------------------===//

    /// Merge the values arriving from each predecessor of the current
    /// block. Each register of the triple gets its own PHI. The builder
    /// must already be positioned at the merge block.
    pub fn build_phi(cg: &mut CodeGen, incoming: &[(TypedValue, BlockId)]) -> CodegenResult<TypedValue> {
        let Some(((first, _), rest)) = incoming.split_first() else {
            return Err(CodegenError::EmptyPhi);
        };
        if rest.is_empty() {
            return Ok(first.clone());
        }

        let mut values = Vec::with_capacity(incoming.len());
        for (value, block) in incoming {
            if value.type_id() != first.type_id() {
                return Err(CodegenError::PhiTypeMismatch(
                    first.type_id().to_string(),
                    value.type_id().to_string(),
                ));
            }
            values.push((*block, value.value_reg()?));
        }
        let nullable = incoming.iter().any(|(v, _)| v.is_nullable());
        debug!(
            "building phi of {} over {} predecessors",
            first.type_id(),
            incoming.len()
        );

        let ir_type = cg.reg_type(values[0].1);
        let value = cg.phi(ir_type, values);

        let length = match first.length {
            Some(_) => {
                let mut lengths = Vec::with_capacity(incoming.len());
                for (v, block) in incoming {
                    lengths.push((*block, v.length_reg()?));
                }
                Some(cg.phi(IrType::I32, lengths))
            }
            None => None,
        };

        let null = if nullable {
            let nulls = incoming
                .iter()
                .map(|(v, block)| (*block, v.is_null(cg)))
                .collect();
            Some(cg.phi(IrType::Bool, nulls))
        } else {
            None
        };

        Ok(Self::from_parts(
            SqlType::new(first.type_id(), nullable),
            value,
            length,
            null,
        ))
    }

    //===--------------------------------------------------------------------===//
    // Materialization
    //===--------------------------------------------------------------------===//

    /// Export the register triple for storage; unused parts are filled with
    /// placeholder constants so every type has the same shape
    pub fn values_for_materialization(&self, cg: &mut CodeGen) -> CodegenResult<Materialized> {
        let value = self.value_reg()?;
        let length = match self.length {
            Some(length) => length,
            None => cg.const_i32(0),
        };
        let null = self.is_null(cg);
        Ok(Materialized {
            value,
            length,
            null,
        })
    }

    /// Inverse of [`Self::values_for_materialization`]
    pub fn value_from_materialization(
        cg: &CodeGen,
        ty: SqlType,
        materialized: Materialized,
    ) -> CodegenResult<TypedValue> {
        let descriptor = cg.registry().descriptor(ty.id)?;
        let length = descriptor.variable_length.then_some(materialized.length);
        let null = ty.nullable.then_some(materialized.null);
        Self::new(cg, ty, materialized.value, length, null)
    }

    /// The (value, length) pair a hash is computed over. The null indicator
    /// is left out; callers decide how NULL hashes.
    pub(in crate::codegen) fn values_for_hash(&self) -> CodegenResult<(Reg, Option<Reg>)> {
        Ok((self.value_reg()?, self.length))
    }
}

fn check_reg(
    cg: &CodeGen,
    reg: Reg,
    expected: IrType,
    context: impl FnOnce() -> String,
) -> CodegenResult<()> {
    match cg.try_reg_type(reg) {
        Some(actual) if actual == expected => Ok(()),
        actual => Err(CodegenError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.map_or_else(|| format!("undefined register {}", reg), |t| t.to_string()),
            context: context(),
        }),
    }
}
