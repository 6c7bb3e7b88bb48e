//! Error types for the SQL emission core.

use thiserror::Error;

/// The main error type for plan compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A filter operator has no equivalent primitive in the chosen dialect.
    #[error("operator '{op}' is not supported on {dialect}")]
    UnsupportedOperator {
        op: &'static str,
        dialect: &'static str,
    },

    /// A whole feature (spatial ops, full-text search, ...) is missing from the dialect.
    #[error("feature '{feature}' is not supported on {dialect}")]
    UnsupportedFeature {
        feature: &'static str,
        dialect: &'static str,
    },

    /// Malformed plan: missing primary column, cyclic dependencies, unknown relationship.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal invariant was violated. Always aborts the compile.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Create an invalid-input error.
    pub fn input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal-invariant error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::UnsupportedOperator {
            op: "similar_to",
            dialect: "mysql",
        };
        assert_eq!(
            err.to_string(),
            "operator 'similar_to' is not supported on mysql"
        );
    }

    #[test]
    fn test_input_error_display() {
        let err = CompileError::input("mutation 3 depends on unknown mutation 9");
        assert_eq!(
            err.to_string(),
            "invalid input: mutation 3 depends on unknown mutation 9"
        );
    }
}
