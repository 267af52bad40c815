//! Centralized error types for Callscope.

use thiserror::Error;

/// Main error type for core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Dangling reference: {kind} '{id}' references missing {missing}")]
    DanglingReference {
        kind: &'static str,
        id: String,
        missing: String,
    },

    #[error("Graph validation failed with {0} issue(s)")]
    InvalidGraph(usize),

    #[error("Query '{query}' timed out after {attempts} attempt(s)")]
    QueryTimeout { query: String, attempts: u32 },

    #[error("Query backend unavailable: {0}")]
    Backend(String),

    #[error("Analysis deadline of {0}s exceeded")]
    DeadlineExceeded(u64),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a dangling reference error.
    pub fn dangling(kind: &'static str, id: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::DanglingReference {
            kind,
            id: id.into(),
            missing: missing.into(),
        }
    }

    /// Whether a retry could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::QueryTimeout { .. } | Self::Backend(_))
    }
}
