//! Error types for runner invocations and configuration.

/// Errors that can end a runner invocation.
///
/// `E` is the error type produced by the caller's operations. The runner
/// never wraps or inspects it beyond recording which input index raised it.
#[derive(Debug, thiserror::Error)]
pub enum RunError<E> {
    /// The concurrency limit was below 1. Raised before any claim.
    #[error("max concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    /// An operation returned an error.
    #[error("operation {index} failed: {source}")]
    Operation {
        /// Input position of the failing operation
        index: usize,
        /// Error returned by the operation
        #[source]
        source: E,
    },

    /// The run was cancelled before every operation was claimed.
    ///
    /// For an input of unknown length, telling this apart from a finished
    /// run pulls one more item from the caller's iterator; that operation
    /// is dropped without being invoked.
    #[error("run cancelled after {claimed} operations were claimed")]
    Cancelled {
        /// Number of operations claimed before the cancellation was seen
        claimed: usize,
    },
}

impl<E> RunError<E> {
    /// Input index of the failing operation, if this is an operation failure.
    pub fn index(&self) -> Option<usize> {
        match self {
            RunError::Operation { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Consume the error and return the operation's own error, if any.
    pub fn into_source(self) -> Option<E> {
        match self {
            RunError::Operation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors that can occur while building or loading a [`RunnerConfig`].
///
/// [`RunnerConfig`]: crate::RunnerConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Concurrency limit below 1
    #[error("max concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),
}
