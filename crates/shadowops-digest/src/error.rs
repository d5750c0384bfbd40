//! Error types for the digest pipeline.

use shadowops_vectors::VectorError;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by [`Digester::produce_digest`](crate::Digester::produce_digest).
///
/// Transient remote failures never appear here: they are absorbed by the
/// local fallbacks.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Precondition violation at the core boundary.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A pipeline invariant was broken. Indicates a bug.
    #[error("Structural failure: {0}")]
    Structural(String),

    /// The whole pipeline exceeded its ceiling.
    #[error("Digest timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Vector index error: {0}")]
    Vector(#[from] VectorError),
}

impl DigestError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        DigestError::InvalidInput(msg.into())
    }

    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        DigestError::Structural(msg.into())
    }
}

/// Result type for digest operations.
pub type Result<T, E = DigestError> = std::result::Result<T, E>;
