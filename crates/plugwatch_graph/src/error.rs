//! Request graph error types.

use plugwatch_core::DevDepError;
use thiserror::Error;

/// Errors that can occur in the request graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted graph could not be read back.
    #[error("Corrupted graph: {0}")]
    Corrupted(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No request with this id exists.
    #[error("Unknown request: {0}")]
    UnknownRequest(String),
}

impl GraphError {
    /// Creates a corrupted graph error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}

impl From<GraphError> for DevDepError {
    fn from(err: GraphError) -> Self {
        DevDepError::graph(err.to_string())
    }
}
