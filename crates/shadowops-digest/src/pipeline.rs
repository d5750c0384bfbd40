//! The end-to-end digest pipeline.

use crate::cluster::{self, Clusterer};
use crate::config::DigestConfig;
use crate::cost;
use crate::deadline::Deadline;
use crate::error::{DigestError, Result};
use crate::label::ClusterLabeler;
use crate::provider::EmbeddingProvider;
use crate::suggest::SuggestionGenerator;
use crate::summary;
use crate::types::{Cluster, ClusterSet, DigestParams, DigestResult, SimilarTicket, TicketBatch};
use shadowops_embeddings::TfIdfEmbedder;
use shadowops_vectors::VectorStore;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default ceiling for one digest.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum similarity for [`Digester::find_similar`] hits.
pub const MIN_SIMILARITY: f32 = 0.5;

/// Share of the remaining time the remote embedding stage may spend,
/// retries included, before falling back to TF-IDF.
const EMBEDDING_SHARE: f64 = 0.4;

/// Share of the time left after clustering that remote suggestion text may
/// spend before the template takes over.
const SUGGESTION_SHARE: f64 = 0.5;

/// Runs the clustering digest over one ticket batch.
///
/// Holds no per-request state; one instance can serve concurrent requests.
///
/// # Example
///
/// ```rust
/// use shadowops_digest::{DigestParams, Digester, TicketBatch};
///
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
/// let digester = Digester::local();
/// let batch = TicketBatch::new(vec![
///     "VPN not connecting".to_string(),
///     "VPN drops constantly".to_string(),
///     "Password reset needed".to_string(),
///     "Printer offline".to_string(),
/// ])?;
/// let params = DigestParams::new(30.0, 40.0)?;
///
/// let digest = digester.produce_digest(&batch, &params).await?;
/// assert_eq!(digest.savings.wasted_hours, 2.0);
/// assert_eq!(digest.savings.saved_dollars, 40.0);
/// # Ok::<(), shadowops_digest::DigestError>(())
/// # }).unwrap();
/// ```
pub struct Digester {
    embeddings: EmbeddingProvider,
    clusterer: Clusterer,
    labeler: ClusterLabeler,
    suggestions: SuggestionGenerator,
    timeout: Duration,
}

impl Digester {
    pub fn new(embeddings: EmbeddingProvider, suggestions: SuggestionGenerator) -> Self {
        Self {
            embeddings,
            clusterer: Clusterer::default(),
            labeler: ClusterLabeler::default(),
            suggestions,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Local-only digester: TF-IDF vectors and template suggestions.
    pub fn local() -> Self {
        Self::new(
            EmbeddingProvider::local_only(TfIdfEmbedder::new()),
            SuggestionGenerator::template_only(),
        )
    }

    /// Build from configuration.
    ///
    /// Remote providers are attached only when the `api` feature is enabled
    /// and a usable key is configured; otherwise the digester runs locally.
    pub fn from_config(config: &DigestConfig) -> Self {
        let retry = config.retry.policy();
        let local = TfIdfEmbedder::new().with_max_features(config.embedding.max_features);

        #[allow(unused_mut)]
        let mut embeddings = EmbeddingProvider::local_only(local).with_retry(retry);
        #[allow(unused_mut)]
        let mut suggestions = SuggestionGenerator::template_only().with_retry(retry);

        #[cfg(feature = "api")]
        {
            embeddings = remote::attach_embedder(embeddings, &config.embedding, retry);
            suggestions = remote::attach_backend(suggestions, &config.generation, retry);
        }

        info!(
            remote_embeddings = embeddings.has_remote(),
            remote_suggestions = suggestions.has_remote(),
            "digester configured"
        );

        Self::new(embeddings, suggestions)
            .with_clusterer(Clusterer::from_config(&config.clustering))
            .with_timeout(config.pipeline.timeout())
    }

    pub fn with_clusterer(mut self, clusterer: Clusterer) -> Self {
        self.clusterer = clusterer;
        self
    }

    pub fn with_labeler(mut self, labeler: ClusterLabeler) -> Self {
        self.labeler = labeler;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cluster the batch, suggest an improvement for the largest cluster,
    /// estimate savings and summarise.
    ///
    /// Either a complete result or an error; never a partial digest.
    ///
    /// Remote stages each get a slice of the remaining time, so a slow
    /// provider degrades to the local variant instead of exhausting the
    /// ceiling. Clustering polls the deadline between iterations.
    pub async fn produce_digest(&self, batch: &TicketBatch, params: &DigestParams) -> Result<DigestResult> {
        let deadline = Deadline::after(self.timeout);
        tokio::time::timeout(self.timeout, self.run(batch, params, &deadline))
            .await
            .map_err(|_| DigestError::Timeout(self.timeout))?
    }

    async fn run(&self, batch: &TicketBatch, params: &DigestParams, deadline: &Deadline) -> Result<DigestResult> {
        let started = Instant::now();
        let texts = batch.as_strs();

        let embedded = self.embeddings.embed(&texts, &deadline.share(EMBEDDING_SHARE)).await?;
        deadline.check()?;
        let groups = self.clusterer.partition(&embedded, batch.len(), deadline).await?;
        let labels = self.labeler.label_all(batch, &groups);
        let clusters = ClusterSet::from_ranked(
            labels
                .into_iter()
                .zip(groups)
                .map(|(label, indices)| Cluster { label, indices })
                .collect(),
        );
        debug!(labels = ?clusters.labels().collect::<Vec<_>>(), "labelled clusters");

        let largest = clusters
            .largest()
            .map(Cluster::size)
            .ok_or_else(|| DigestError::structural("clustering produced no clusters"))?;
        let savings = cost::estimate(batch.len(), largest, params);
        deadline.check()?;
        let suggestion = self
            .suggestions
            .suggest(batch, &clusters, &deadline.share(SUGGESTION_SHARE))
            .await?;
        let summary = summary::compose(&clusters, &suggestion.text, &savings)?;
        let insights = cluster::insights(&clusters, &embedded.vectors, deadline)?;

        info!(
            tickets = batch.len(),
            clusters = clusters.len(),
            embedding = %embedded.strategy,
            suggestion = %suggestion.source,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "digest complete"
        );

        Ok(DigestResult {
            clusters,
            suggestion: suggestion.text,
            savings,
            summary,
            embedding_strategy: embedded.strategy,
            suggestion_source: suggestion.source,
            insights,
        })
    }

    /// Tickets most similar to `query`, best first, scoring at least 0.5.
    ///
    /// The query is embedded together with the batch so both use one strategy.
    pub async fn find_similar(&self, batch: &TicketBatch, query: &str, k: usize) -> Result<Vec<SimilarTicket>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DigestError::invalid("query is blank"));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let deadline = Deadline::after(self.timeout);
        tokio::time::timeout(self.timeout, self.search(batch, query, k, &deadline))
            .await
            .map_err(|_| DigestError::Timeout(self.timeout))?
    }

    async fn search(
        &self,
        batch: &TicketBatch,
        query: &str,
        k: usize,
        deadline: &Deadline,
    ) -> Result<Vec<SimilarTicket>> {
        let mut texts = batch.as_strs();
        texts.push(query);

        let mut embedded = self.embeddings.embed(&texts, &deadline.share(EMBEDDING_SHARE)).await?;
        deadline.check()?;
        let query_vector = embedded
            .vectors
            .pop()
            .ok_or_else(|| DigestError::structural("query vector missing"))?;

        let store = cluster::build_index(&embedded.vectors, embedded.dimension).await?;
        let hits = store.search_above(&query_vector, k, MIN_SIMILARITY).await?;

        Ok(hits
            .iter()
            .filter_map(|hit| {
                let index = cluster::ticket_index(hit)?;
                Some(SimilarTicket {
                    index,
                    ticket: batch.get(index)?.to_string(),
                    score: hit.score,
                })
            })
            .collect())
    }
}

#[cfg(feature = "api")]
mod remote {
    use crate::config::{EmbeddingConfig, GenerationConfig};
    use crate::provider::EmbeddingProvider;
    use crate::retry::RetryPolicy;
    use crate::suggest::SuggestionGenerator;
    use shadowops_embeddings::{ApiConfig, ApiEmbedder};
    use shadowops_llm::{LlmConfig, OpenAiBackend};
    use std::sync::Arc;
    use tracing::warn;

    pub(super) fn attach_embedder(
        provider: EmbeddingProvider,
        config: &EmbeddingConfig,
        retry: RetryPolicy,
    ) -> EmbeddingProvider {
        let Some(key) = config.api_key() else {
            return provider;
        };

        let mut api = ApiConfig::openai(key)
            .with_model(&config.model)
            .with_timeout(retry.attempt_timeout.as_secs().max(1));
        api.endpoint = config.endpoint.clone();
        api.dimensions = config.dimensions;

        match ApiEmbedder::new(api) {
            Ok(embedder) => provider.with_remote(Arc::new(embedder)),
            Err(e) => {
                warn!(error = %e, "remote embedder unavailable");
                provider
            }
        }
    }

    pub(super) fn attach_backend(
        generator: SuggestionGenerator,
        config: &GenerationConfig,
        retry: RetryPolicy,
    ) -> SuggestionGenerator {
        let Some(key) = config.api_key() else {
            return generator;
        };

        let llm = LlmConfig::openai()
            .with_model(config.model.as_str())
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
            .with_timeout(retry.attempt_timeout.as_secs().clamp(1, u32::MAX as u64) as u32);

        match OpenAiBackend::with_config(key, llm) {
            Ok(backend) => {
                let backend = match &config.endpoint {
                    Some(endpoint) => backend.with_endpoint(endpoint),
                    None => backend,
                };
                generator.with_remote(Arc::new(backend))
            }
            Err(e) => {
                warn!(error = %e, "remote text generation unavailable");
                generator
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(items: &[&str]) -> TicketBatch {
        TicketBatch::new(items.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[tokio::test]
    async fn test_local_digest_is_complete() {
        let digester = Digester::local();
        let batch = batch(&["VPN not connecting", "VPN drops constantly", "Printer offline"]);
        let params = DigestParams::new(20.0, 50.0).unwrap();

        let digest = digester.produce_digest(&batch, &params).await.unwrap();
        assert_eq!(digest.clusters.total_tickets(), 3);
        assert_eq!(digest.insights.len(), digest.clusters.len());
        assert!(!digest.suggestion.is_empty());
        assert!(digest.summary.contains("3 tickets"));
        assert!(digest.is_degraded());
    }

    #[tokio::test]
    async fn test_find_similar() {
        let digester = Digester::local();
        let batch = batch(&[
            "VPN not connecting",
            "Printer offline",
            "VPN drops constantly",
            "Password reset needed",
        ]);

        let hits = digester.find_similar(&batch, "VPN connecting slowly", 5).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].index, 0);
        assert!(hits.iter().all(|h| h.score >= MIN_SIMILARITY));
        assert!(hits.iter().all(|h| h.index != 1 && h.index != 3));

        assert!(digester.find_similar(&batch, "  ", 5).await.is_err());
        assert!(digester.find_similar(&batch, "vpn", 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_from_default_config_is_local() {
        let digester = Digester::from_config(&DigestConfig::default());
        assert_eq!(digester.timeout(), DEFAULT_TIMEOUT);
    }
}
