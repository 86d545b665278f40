//! The type registry.
//!
//! Maps (operator, type signature) to an implementation. Lookups happen
//! while code is generated, once per call site; nothing is resolved inside
//! generated code. Tables are concurrent maps so independent compilations
//! can share one registry.

use crate::error::{CodegenError, CodegenResult};
use crate::types::{
    boolean, decimal, integer, varchar, BinaryOp, Cast, Comparison, OperatorId, TypeDescriptor,
    TypeId, UnaryOp,
};
use dashmap::DashMap;
use log::debug;
use std::sync::Arc;

/// A resolved binary operator: operands must be cast to `left`/`right`
#[derive(Clone)]
pub struct BinaryOpEntry {
    pub left: TypeId,
    pub right: TypeId,
    pub result: TypeId,
    pub imp: Arc<dyn BinaryOp>,
}

/// A resolved unary operator: the operand must be cast to `operand`
#[derive(Clone)]
pub struct UnaryOpEntry {
    pub operand: TypeId,
    pub result: TypeId,
    pub imp: Arc<dyn UnaryOp>,
}

#[derive(Default)]
pub struct TypeRegistry {
    types: DashMap<TypeId, Arc<TypeDescriptor>>,
    casts: DashMap<(TypeId, TypeId), Arc<dyn Cast>>,
    /// Targets each type converts to implicitly when operands are promoted
    implicit_casts: DashMap<TypeId, Vec<TypeId>>,
    comparisons: DashMap<TypeId, Arc<dyn Comparison>>,
    binary_ops: DashMap<(OperatorId, TypeId, TypeId), BinaryOpEntry>,
    unary_ops: DashMap<(OperatorId, TypeId), UnaryOpEntry>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in SQL types
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        boolean::register(&registry);
        integer::register(&registry);
        decimal::register(&registry);
        varchar::register(&registry);
        registry
    }

    //===--------------------------------------------------------------------===//
    // Registration
    //===--------------------------------------------------------------------===//

    pub fn register_type(&self, descriptor: TypeDescriptor) -> CodegenResult<()> {
        if descriptor.id == TypeId::INVALID || self.types.contains_key(&descriptor.id) {
            return Err(CodegenError::DuplicateType(descriptor.name));
        }
        debug!("registering type {} as {:?}", descriptor.name, descriptor.id);
        self.types.insert(descriptor.id, Arc::new(descriptor));
        Ok(())
    }

    /// Insert a built-in type without the duplicate check
    pub(crate) fn install_type(&self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.id, Arc::new(descriptor));
    }

    /// Register a conversion; `implicit` casts take part in operand promotion
    pub fn register_cast(&self, from: TypeId, to: TypeId, implicit: bool, imp: Arc<dyn Cast>) {
        self.casts.insert((from, to), imp);
        if implicit {
            let mut targets = self.implicit_casts.entry(from).or_default();
            if !targets.contains(&to) {
                targets.push(to);
            }
        }
    }

    pub fn register_comparison(&self, id: TypeId, imp: Arc<dyn Comparison>) {
        self.comparisons.insert(id, imp);
    }

    pub fn register_binary(
        &self,
        op: OperatorId,
        left: TypeId,
        right: TypeId,
        result: TypeId,
        imp: Arc<dyn BinaryOp>,
    ) {
        self.binary_ops.insert(
            (op, left, right),
            BinaryOpEntry {
                left,
                right,
                result,
                imp,
            },
        );
    }

    pub fn register_unary(&self, op: OperatorId, operand: TypeId, result: TypeId, imp: Arc<dyn UnaryOp>) {
        self.unary_ops.insert(
            (op, operand),
            UnaryOpEntry {
                operand,
                result,
                imp,
            },
        );
    }

    //===--------------------------------------------------------------------===//
    // Lookup
    //===--------------------------------------------------------------------===//

    pub fn descriptor(&self, id: TypeId) -> CodegenResult<Arc<TypeDescriptor>> {
        self.types
            .get(&id)
            .map(|d| Arc::clone(d.value()))
            .ok_or(CodegenError::UnknownType(id))
    }

    pub fn type_name(&self, id: TypeId) -> String {
        match self.types.get(&id) {
            Some(d) => d.name.clone(),
            None => id.to_string(),
        }
    }

    pub fn can_implicitly_cast(&self, from: TypeId, to: TypeId) -> bool {
        from == to
            || self
                .implicit_casts
                .get(&from)
                .map(|targets| targets.contains(&to))
                .unwrap_or(false)
    }

    /// The narrowest type both operands promote to, if any
    pub fn common_type(&self, left: TypeId, right: TypeId) -> Option<TypeId> {
        if left == right {
            return Some(left);
        }
        let mut candidates = vec![left, right];
        for id in [left, right] {
            if let Some(targets) = self.implicit_casts.get(&id) {
                candidates.extend(targets.iter().copied());
            }
        }
        candidates.sort();
        candidates.dedup();
        candidates.retain(|c| self.can_implicitly_cast(left, *c) && self.can_implicitly_cast(right, *c));
        // The narrowest candidate is the one that promotes to all the others
        candidates
            .iter()
            .copied()
            .find(|c| candidates.iter().all(|other| self.can_implicitly_cast(*c, *other)))
    }

    pub fn resolve_cast(&self, from: TypeId, to: TypeId) -> CodegenResult<Arc<dyn Cast>> {
        match self.casts.get(&(from, to)) {
            Some(imp) => {
                debug!("resolved cast {} -> {}", self.type_name(from), self.type_name(to));
                Ok(Arc::clone(imp.value()))
            }
            None => Err(CodegenError::NoCastPath {
                from: self.type_name(from),
                to: self.type_name(to),
            }),
        }
    }

    /// Find the comparison for two operand types, promoting them to a
    /// common type when they differ
    pub fn resolve_comparison(
        &self,
        left: TypeId,
        right: TypeId,
    ) -> CodegenResult<(TypeId, Arc<dyn Comparison>)> {
        let found = self.common_type(left, right).and_then(|common| {
            self.comparisons
                .get(&common)
                .map(|imp| (common, Arc::clone(imp.value())))
        });
        match found {
            Some((common, imp)) => {
                debug!(
                    "resolved comparison {} vs {} as {}",
                    self.type_name(left),
                    self.type_name(right),
                    self.type_name(common)
                );
                Ok((common, imp))
            }
            None => Err(self.no_such_operator("compare", left, Some(right))),
        }
    }

    /// Exact signature first, then both operands promoted to a common type
    pub fn resolve_binary(
        &self,
        op: OperatorId,
        left: TypeId,
        right: TypeId,
    ) -> CodegenResult<BinaryOpEntry> {
        if let Some(entry) = self.binary_ops.get(&(op, left, right)) {
            return Ok(entry.value().clone());
        }
        let promoted = self
            .common_type(left, right)
            .and_then(|common| self.binary_ops.get(&(op, common, common)))
            .map(|entry| entry.value().clone());
        match promoted {
            Some(entry) => {
                debug!(
                    "promoted {} {} {} to {}",
                    self.type_name(left),
                    op.as_str(),
                    self.type_name(right),
                    self.type_name(entry.left)
                );
                Ok(entry)
            }
            None => Err(self.no_such_operator(op.as_str(), left, Some(right))),
        }
    }

    /// Exact operand type first, then the narrowest implicit promotion
    pub fn resolve_unary(&self, op: OperatorId, operand: TypeId) -> CodegenResult<UnaryOpEntry> {
        if let Some(entry) = self.unary_ops.get(&(op, operand)) {
            return Ok(entry.value().clone());
        }
        let mut targets: Vec<TypeId> = self
            .implicit_casts
            .get(&operand)
            .map(|t| t.value().clone())
            .unwrap_or_default();
        targets.retain(|t| self.unary_ops.contains_key(&(op, *t)));
        let narrowest = targets
            .iter()
            .copied()
            .find(|t| targets.iter().all(|other| self.can_implicitly_cast(*t, *other)));
        match narrowest.and_then(|t| self.unary_ops.get(&(op, t)).map(|e| e.value().clone())) {
            Some(entry) => Ok(entry),
            None => Err(self.no_such_operator(op.as_str(), operand, None)),
        }
    }

    fn no_such_operator(&self, operator: &str, left: TypeId, right: Option<TypeId>) -> CodegenError {
        CodegenError::NoSuchOperator {
            operator: operator.to_string(),
            left: self.type_name(left),
            right: right.map(|r| self.type_name(r)),
        }
    }
}
