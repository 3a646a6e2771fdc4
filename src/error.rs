//! Error types for u-xmeans.

use thiserror::Error;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// All errors produced by u-xmeans operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// A numeric column cannot be rescaled to z-scores.
    #[error("cannot standardize column '{column}': {reason}")]
    Standardization { column: String, reason: String },
    /// A feature vector or table column has the wrong length.
    #[error("expected {expected} elements, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A configuration parameter is out of range.
    #[error("invalid configuration '{name}': {message}")]
    InvalidConfiguration { name: String, message: String },
    /// Results were requested from an engine that has not finished running.
    #[error("{operation} requested before the engine finished running")]
    NotRun { operation: String },
    /// An engine phase was invoked before centroids existed.
    #[error("{operation} called before the engine was initialized")]
    Uninitialized { operation: String },
    /// The input cannot be clustered at all.
    #[error("degenerate data: {reason}")]
    DegenerateData { reason: String },
    /// A numeric feature column contains null cells.
    #[error("column '{column}' has {count} missing values")]
    MissingValues { column: String, count: usize },
    /// Two rows share the same key.
    #[error("duplicate row key '{key}'")]
    DuplicateKey { key: String },
    /// A feature vector contains NaN or infinity.
    #[error("row '{key}' contains a non-finite value")]
    NonFinite { key: String },
    /// The execution monitor asked the engine to stop.
    #[error("execution cancelled during {stage}")]
    Cancelled { stage: String },
}

impl ClusterError {
    pub(crate) fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_run(operation: &str) -> Self {
        Self::NotRun {
            operation: operation.to_string(),
        }
    }
}
