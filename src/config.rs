//! Code generation settings.

/// What an arithmetic operation does when it overflows or divides by zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Produce NULL and keep going
    ReturnNull,
    /// Abort the query with an arithmetic error
    #[default]
    Exception,
}

/// Where NULLs land in a sort-compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrder {
    #[default]
    First,
    Last,
}

/// How Min/Max treat a NULL operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinMaxNulls {
    /// Any NULL operand makes the result NULL (LEAST/GREATEST)
    #[default]
    Propagate,
    /// The non-NULL operand wins; NULL only if both are NULL (MIN/MAX aggregates)
    IgnoreNull,
}

/// Settings consulted by every operation emitted into a [`crate::codegen::CodeGen`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodegenConfig {
    pub null_order: NullOrder,
    pub min_max_nulls: MinMaxNulls,
    /// Error policy for callers that do not pick one per call site
    pub on_error: OnError,
}

impl CodegenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_null_order(mut self, null_order: NullOrder) -> Self {
        self.null_order = null_order;
        self
    }

    pub fn with_min_max_nulls(mut self, min_max_nulls: MinMaxNulls) -> Self {
        self.min_max_nulls = min_max_nulls;
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }
}
