//! Compilation of expressions into generated functions.
//!
//! Every compiled function takes its input row as one (value, length,
//! null) parameter triple per column and returns the result the same way.

use crate::codegen::ir::{ArithOp, CmpPred, Function, IrType};
use crate::codegen::{CodeGen, Hash, Interpreter, Materialized, TypedValue};
use crate::config::CodegenConfig;
use crate::error::{CodegenError, CodegenResult};
use crate::expression::{BinaryOperator, Expression, UnaryOperator};
use crate::types::{SqlType, TypeId, TypeRegistry};
use crate::value::Value;
use anyhow::{bail, Context, Result};
use log::debug;
use std::sync::Arc;

/// One ORDER BY key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column_index: usize,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column_index: usize) -> Self {
        Self {
            column_index,
            descending: false,
        }
    }

    pub fn desc(column_index: usize) -> Self {
        Self {
            column_index,
            descending: true,
        }
    }
}

pub struct ExpressionCompiler {
    registry: Arc<TypeRegistry>,
    config: CodegenConfig,
    schema: Vec<SqlType>,
}

impl ExpressionCompiler {
    /// Create a compiler for rows of the given schema
    pub fn new(registry: Arc<TypeRegistry>, schema: Vec<SqlType>) -> Self {
        Self::with_config(registry, schema, CodegenConfig::default())
    }

    pub fn with_config(registry: Arc<TypeRegistry>, schema: Vec<SqlType>, config: CodegenConfig) -> Self {
        Self {
            registry,
            config,
            schema,
        }
    }

    pub fn schema(&self) -> &[SqlType] {
        &self.schema
    }

    /// Compile an expression over one input row
    pub fn compile(&self, expr: &Expression) -> CodegenResult<CompiledExpression> {
        let mut cg = self.begin("expr");
        let row = self.load_row(&mut cg)?;
        let result = self.emit(&mut cg, &row, expr)?;
        self.finish(cg, 1, result)
    }

    /// Compile an ORDER BY comparator over two rows: negative, zero or
    /// positive as the left row sorts before, with or after the right row
    pub fn compile_sort_comparator(&self, keys: &[SortKey]) -> CodegenResult<CompiledExpression> {
        let mut cg = self.begin("sort_cmp");
        let left = self.load_row(&mut cg)?;
        let right = self.load_row(&mut cg)?;

        let zero = cg.const_i32(0);
        let mut order = zero;
        // Later keys only break ties of earlier ones
        for key in keys.iter().rev() {
            let l = self.column(&left, key.column_index)?;
            let r = self.column(&right, key.column_index)?;
            let mut key_order = l.compare_for_sort(&mut cg, r)?.value_reg()?;
            if key.descending {
                key_order = cg.arith(ArithOp::Sub, zero, key_order);
            }
            let tied = cg.cmp(CmpPred::Eq, key_order, zero);
            order = cg.select(tied, order, key_order);
        }

        let result = TypedValue::new(&cg, SqlType::not_null(TypeId::INTEGER), order, None, None)?;
        self.finish(cg, 2, result)
    }

    /// Compile equality of the key columns of two rows
    pub fn compile_key_equality(&self, keys: &[usize]) -> CodegenResult<CompiledExpression> {
        let mut cg = self.begin("key_eq");
        let left = self.load_row(&mut cg)?;
        let right = self.load_row(&mut cg)?;
        let lhs = self.columns(&left, keys)?;
        let rhs = self.columns(&right, keys)?;
        let result = TypedValue::test_equality(&mut cg, &lhs, &rhs)?;
        self.finish(cg, 2, result)
    }

    /// Compile a hash of the key columns of one row
    pub fn compile_key_hash(&self, keys: &[usize]) -> CodegenResult<CompiledExpression> {
        let mut cg = self.begin("key_hash");
        let row = self.load_row(&mut cg)?;
        let values = self.columns(&row, keys)?;
        let hash = Hash::hash_values(&mut cg, &values)?;
        let result = TypedValue::new(&cg, SqlType::not_null(TypeId::BIGINT), hash, None, None)?;
        self.finish(cg, 1, result)
    }

    fn begin(&self, name: &str) -> CodeGen {
        CodeGen::with_config(name, Arc::clone(&self.registry), self.config)
    }

    /// Declare parameters for one input row and wrap them as values
    fn load_row(&self, cg: &mut CodeGen) -> CodegenResult<Vec<TypedValue>> {
        let mut row = Vec::with_capacity(self.schema.len());
        for ty in &self.schema {
            let descriptor = self.registry.descriptor(ty.id)?;
            let materialized = Materialized {
                value: cg.add_param(descriptor.ir_type),
                length: cg.add_param(IrType::I32),
                null: cg.add_param(IrType::Bool),
            };
            row.push(TypedValue::value_from_materialization(cg, *ty, materialized)?);
        }
        Ok(row)
    }

    fn column<'r>(&self, row: &'r [TypedValue], index: usize) -> CodegenResult<&'r TypedValue> {
        row.get(index).ok_or(CodegenError::ColumnIndexOutOfBounds {
            index,
            row_size: row.len(),
        })
    }

    fn columns(&self, row: &[TypedValue], indexes: &[usize]) -> CodegenResult<Vec<TypedValue>> {
        indexes
            .iter()
            .map(|&i| self.column(row, i).cloned())
            .collect()
    }

    fn finish(&self, mut cg: CodeGen, rows: usize, result: TypedValue) -> CodegenResult<CompiledExpression> {
        let out = result.values_for_materialization(&mut cg)?;
        cg.ret(vec![out.value, out.length, out.null])?;
        let function = cg.finish()?;
        debug!(
            "compiled {} into {} blocks, {} instructions",
            function.name(),
            function.blocks().len(),
            function.instruction_count()
        );

        let mut input_types = Vec::with_capacity(self.schema.len() * rows);
        for _ in 0..rows {
            for ty in &self.schema {
                input_types.push((*ty, self.registry.descriptor(ty.id)?.ir_type));
            }
        }
        Ok(CompiledExpression {
            function,
            input_types,
            result_type: result.sql_type(),
        })
    }

    fn emit(&self, cg: &mut CodeGen, row: &[TypedValue], expr: &Expression) -> CodegenResult<TypedValue> {
        match expr {
            Expression::Literal(lit) => TypedValue::constant(cg, &lit.value),

            Expression::Null(ty) => TypedValue::null(cg, *ty),

            Expression::ColumnRef(col) => self.column(row, col.index).cloned(),

            Expression::BinaryOp { op, left, right } => {
                let left = self.emit(cg, row, left)?;
                let right = self.emit(cg, row, right)?;
                self.emit_binary(cg, *op, &left, &right)
            }

            Expression::UnaryOp { op, operand } => {
                let operand = self.emit(cg, row, operand)?;
                match op {
                    UnaryOperator::Not => operand.logical_not(cg),
                    UnaryOperator::Minus => operand.negate(cg, self.config.on_error),
                    UnaryOperator::IsNull => {
                        let null = operand.is_null(cg);
                        TypedValue::new(cg, SqlType::not_null(TypeId::BOOLEAN), null, None, None)
                    }
                    UnaryOperator::IsNotNull => {
                        let not_null = operand.is_not_null(cg);
                        TypedValue::new(cg, SqlType::not_null(TypeId::BOOLEAN), not_null, None, None)
                    }
                }
            }

            Expression::Cast { expr, to } => {
                let value = self.emit(cg, row, expr)?;
                value.cast_to(cg, SqlType::new(*to, value.is_nullable()))
            }

            Expression::Case {
                conditions,
                else_result,
            } => self.emit_case(cg, row, conditions, else_result.as_deref()),
        }
    }

    fn emit_binary(
        &self,
        cg: &mut CodeGen,
        op: BinaryOperator,
        left: &TypedValue,
        right: &TypedValue,
    ) -> CodegenResult<TypedValue> {
        if let Some(operator) = op.arithmetic() {
            return left.call_binary(cg, operator, right, self.config.on_error);
        }
        if let Some(pred) = op.comparison() {
            return left.compare(cg, pred, right);
        }
        match op {
            BinaryOperator::And => left.logical_and(cg, right),
            BinaryOperator::Or => left.logical_or(cg, right),
            BinaryOperator::Least => left.min(cg, right),
            BinaryOperator::Greatest => left.max(cg, right),
            _ => Err(CodegenError::InvalidValue(format!(
                "unhandled operator {}",
                op.as_str()
            ))),
        }
    }

    /// Each WHEN branches to its own block; all results are cast to their
    /// common type and merged in a join block
    fn emit_case(
        &self,
        cg: &mut CodeGen,
        row: &[TypedValue],
        conditions: &[(Expression, Expression)],
        else_result: Option<&Expression>,
    ) -> CodegenResult<TypedValue> {
        let mut arms = Vec::with_capacity(conditions.len() + 1);
        for (condition, result) in conditions {
            let condition = self.emit(cg, row, condition)?;
            let condition = condition.cast_to(cg, SqlType::new(TypeId::BOOLEAN, condition.is_nullable()))?;
            // A NULL condition does not match
            let not_null = condition.is_not_null(cg);
            let matched = cg.and(condition.value_reg()?, not_null);

            let then_block = cg.create_block("case_then");
            let next_block = cg.create_block("case_next");
            cg.cond_br(matched, then_block, next_block)?;

            cg.position_at_end(then_block);
            let value = self.emit(cg, row, result)?;
            arms.push((value, cg.current_block()));
            cg.position_at_end(next_block);
        }

        let common = self.common_type(arms.iter().map(|(v, _)| v.type_id()))?;
        let else_value = match (else_result, common) {
            (Some(expr), _) => self.emit(cg, row, expr)?,
            (None, Some(ty)) => TypedValue::null(cg, ty)?,
            (None, None) => {
                return Err(CodegenError::InvalidValue(
                    "CASE needs at least one result".to_string(),
                ))
            }
        };
        arms.push((else_value, cg.current_block()));

        let common = self
            .common_type(arms.iter().map(|(v, _)| v.type_id()))?
            .ok_or_else(|| CodegenError::InvalidValue("CASE without results".to_string()))?;
        let result_type = SqlType::new(common, arms.iter().any(|(v, _)| v.is_nullable()));

        let merge = cg.create_block("case_end");
        let mut incoming = Vec::with_capacity(arms.len());
        for (value, block) in arms {
            cg.position_at_end(block);
            let value = value.cast_to(cg, result_type)?;
            incoming.push((value, cg.current_block()));
            cg.br(merge)?;
        }
        cg.position_at_end(merge);
        TypedValue::build_phi(cg, &incoming)
    }

    fn common_type(&self, types: impl IntoIterator<Item = TypeId>) -> CodegenResult<Option<TypeId>> {
        let mut common: Option<TypeId> = None;
        for ty in types {
            common = match common {
                None => Some(ty),
                Some(current) => match self.registry.common_type(current, ty) {
                    Some(promoted) => Some(promoted),
                    None => {
                        return Err(CodegenError::TypeMismatch {
                            expected: self.registry.type_name(current),
                            actual: self.registry.type_name(ty),
                            context: "CASE result".to_string(),
                        })
                    }
                },
            };
        }
        Ok(common)
    }
}

/// A finished function together with its input and output layout
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    function: Function,
    input_types: Vec<(SqlType, IrType)>,
    result_type: SqlType,
}

impl CompiledExpression {
    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn result_type(&self) -> SqlType {
        self.result_type
    }

    /// Run the function on an input row
    pub fn evaluate(&self, row: &[Value]) -> Result<Value> {
        if row.len() != self.input_types.len() {
            bail!(
                "Value count {} doesn't match input width {}",
                row.len(),
                self.input_types.len()
            );
        }
        let mut args = Vec::with_capacity(row.len() * 3);
        for (value, (ty, ir_type)) in row.iter().zip(&self.input_types) {
            args.extend(value.to_scalars(*ty, *ir_type)?);
        }

        let out = Interpreter::new(&self.function).run(&args)?;
        match out.as_slice() {
            [value, length, null] => Value::from_scalars(self.result_type, value, length, null)
                .with_context(|| format!("decoding result of {}", self.function.name())),
            _ => bail!("Expected a value triple, got {} results", out.len()),
        }
    }

    /// Run a two-row function (comparator or key equality)
    pub fn evaluate_pair(&self, left: &[Value], right: &[Value]) -> Result<Value> {
        let row: Vec<Value> = left.iter().chain(right).cloned().collect();
        self.evaluate(&row)
    }
}
