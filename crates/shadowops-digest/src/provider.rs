//! Remote-first embedding with whole-batch local fallback.

use crate::deadline::Deadline;
use crate::error::{DigestError, Result};
use crate::retry::RetryPolicy;
use shadowops_embeddings::{check_batch, Embedder, EmbeddingError, EmbeddingStrategy, TfIdfEmbedder};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vectors for a whole batch, all from one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedBatch {
    pub vectors: Vec<Vec<f32>>,
    pub dimension: usize,
    pub strategy: EmbeddingStrategy,
}

impl EmbeddedBatch {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Chooses the embedding strategy for each batch at call time.
///
/// The remote embedder is tried first (with retries). Any failure, for any
/// ticket, sends the entire batch to the local TF-IDF embedder, so a batch
/// never mixes strategies.
pub struct EmbeddingProvider {
    remote: Option<Arc<dyn Embedder>>,
    local: TfIdfEmbedder,
    retry: RetryPolicy,
}

impl EmbeddingProvider {
    /// A provider with no remote service configured.
    pub fn local_only(local: TfIdfEmbedder) -> Self {
        Self {
            remote: None,
            local,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn Embedder>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Embed every text with one strategy.
    ///
    /// The remote attempt, retries included, stops at `budget`; the local
    /// fallback always runs to completion.
    pub async fn embed(&self, texts: &[&str], budget: &Deadline) -> Result<EmbeddedBatch> {
        if texts.is_empty() {
            return Err(DigestError::invalid("nothing to embed"));
        }

        if let Some(remote) = &self.remote {
            match self.embed_remote(remote.as_ref(), texts, budget).await {
                Ok(batch) => {
                    info!(
                        model = remote.model_name(),
                        tickets = texts.len(),
                        dimension = batch.dimension,
                        "embedded batch remotely"
                    );
                    return Ok(batch);
                }
                Err(e) => {
                    warn!(error = %e, "remote embedding failed, using local vectors for the whole batch");
                }
            }
        } else {
            debug!("no remote embedder configured");
        }

        self.embed_local(texts)
    }

    async fn embed_remote(
        &self,
        remote: &dyn Embedder,
        texts: &[&str],
        budget: &Deadline,
    ) -> Result<EmbeddedBatch, EmbeddingError> {
        let vectors = self
            .retry
            .run("embedding", budget, || remote.embed_batch(texts))
            .await?;
        let dimension = check_batch(&vectors, texts.len())?;
        Ok(EmbeddedBatch {
            vectors,
            dimension,
            strategy: EmbeddingStrategy::Remote,
        })
    }

    fn embed_local(&self, texts: &[&str]) -> Result<EmbeddedBatch> {
        let vectors = self.local.fit_transform(texts);
        let dimension = check_batch(&vectors, texts.len())
            .map_err(|e| DigestError::structural(format!("local embedding: {e}")))?;
        info!(tickets = texts.len(), dimension, "embedded batch locally");
        Ok(EmbeddedBatch {
            vectors,
            dimension,
            strategy: EmbeddingStrategy::Local,
        })
    }
}
