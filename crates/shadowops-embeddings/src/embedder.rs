//! Core embedder trait and types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedding error types.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::ConnectionFailed(_)
                | EmbeddingError::RateLimited(_)
                | EmbeddingError::Timeout(_)
        )
    }
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Which strategy produced the vectors of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStrategy {
    /// Remote semantic embedding service.
    Remote,
    /// Local lexical vectorization.
    Local,
}

impl EmbeddingStrategy {
    /// True when the batch was produced by the fallback strategy.
    pub fn is_degraded(&self) -> bool {
        matches!(self, EmbeddingStrategy::Local)
    }
}

impl std::fmt::Display for EmbeddingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingStrategy::Remote => write!(f, "remote"),
            EmbeddingStrategy::Local => write!(f, "local"),
        }
    }
}

/// Core trait for embedding providers.
///
/// Implementors convert a whole batch of texts to dense vectors. A batch is
/// either embedded completely or the call fails; partial results are never
/// returned.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text in the batch, preserving order.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Get the model name/identifier.
    fn model_name(&self) -> &str;

    /// Strategy this embedder implements.
    fn strategy(&self) -> EmbeddingStrategy;

    /// Embed a single text string.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding returned".to_string()))
    }
}

/// Check that a batch of vectors is usable as one consistent embedding set.
///
/// Returns the shared dimension.
pub fn check_batch(vectors: &[Vec<f32>], expected_len: usize) -> EmbeddingResult<usize> {
    if vectors.len() != expected_len {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} vectors, got {}",
            expected_len,
            vectors.len()
        )));
    }

    let dimension = match vectors.first() {
        Some(v) if !v.is_empty() => v.len(),
        Some(_) => return Err(EmbeddingError::InvalidResponse("empty vector".to_string())),
        None => return Ok(0),
    };

    for v in vectors {
        if v.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                got: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::InvalidResponse(
                "non-finite value in vector".to_string(),
            ));
        }
    }

    Ok(dimension)
}
