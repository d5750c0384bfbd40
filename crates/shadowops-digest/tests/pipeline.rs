//! End-to-end digest behaviour with fake remote services.

use async_trait::async_trait;
use shadowops_digest::{
    ClusterSet, DigestConfig, DigestError, DigestParams, Digester, EmbeddingProvider,
    EmbeddingStrategy, RetryPolicy, SuggestionGenerator, SuggestionSource, TicketBatch,
    DEFAULT_TIMEOUT,
};
use shadowops_embeddings::{Embedder, EmbeddingResult, MockEmbedder, TfIdfEmbedder};
use shadowops_llm::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend};
use std::sync::Arc;
use std::time::Duration;

const REFERENCE: [&str; 4] = [
    "VPN not connecting",
    "VPN drops constantly",
    "Password reset needed",
    "Printer offline",
];

fn batch(items: &[&str]) -> TicketBatch {
    TicketBatch::new(items.iter().map(|s| s.to_string()).collect()).unwrap()
}

fn params() -> DigestParams {
    DigestParams::new(30.0, 40.0).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::default().with_base_delay(Duration::from_millis(1))
}

fn digester(embedder: Option<MockEmbedder>, backend: Option<Arc<dyn LlmBackend>>) -> Digester {
    let mut embeddings = EmbeddingProvider::local_only(TfIdfEmbedder::new()).with_retry(fast_retry());
    if let Some(embedder) = embedder {
        embeddings = embeddings.with_remote(Arc::new(embedder));
    }
    let mut suggestions = SuggestionGenerator::template_only().with_retry(fast_retry());
    if let Some(backend) = backend {
        suggestions = suggestions.with_remote(backend);
    }
    Digester::new(embeddings, suggestions)
}

fn assert_partition(clusters: &ClusterSet, n: usize) {
    let mut seen: Vec<usize> = clusters.iter().flat_map(|c| c.indices.iter().copied()).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..n).collect::<Vec<_>>(), "clusters must partition 0..{n}");
    assert!(clusters.iter().all(|c| c.size() > 0));

    let sizes: Vec<usize> = clusters.iter().map(|c| c.size()).collect();
    assert!(sizes.windows(2).all(|w| w[0] >= w[1]), "clusters must be ranked by size");

    let mut labels: Vec<&str> = clusters.labels().collect();
    labels.sort_unstable();
    labels.dedup();
    assert_eq!(labels.len(), clusters.len(), "labels must be unique");
}

/// Synthetic tickets drawn from a few themes.
fn themed_tickets(n: usize) -> Vec<String> {
    const THEMES: [&str; 5] = [
        "VPN disconnects while working from home",
        "Password reset link expired again",
        "Printer on floor {} shows offline",
        "Outlook email stuck in outbox",
        "Shared drive permission denied for folder {}",
    ];
    (0..n)
        .map(|i| THEMES[i % THEMES.len()].replace("{}", &(i / THEMES.len()).to_string()))
        .collect()
}

/// Never answers within any reasonable attempt timeout.
struct HangingEmbedder;

#[async_trait]
impl Embedder for HangingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    fn model_name(&self) -> &str {
        "hanging"
    }

    fn strategy(&self) -> EmbeddingStrategy {
        EmbeddingStrategy::Remote
    }
}

struct SlowBackend {
    config: LlmConfig,
}

#[async_trait]
impl LlmBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn complete(&self, _prompt: &str, _system: Option<&str>) -> LlmResult<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("Create a VPN troubleshooting page".to_string())
    }
}

#[tokio::test]
async fn reference_example_local() {
    let digest = digester(None, None)
        .produce_digest(&batch(&REFERENCE), &params())
        .await
        .unwrap();

    assert!((2..=3).contains(&digest.clusters.len()));
    let largest = digest.clusters.largest().unwrap();
    assert_eq!(largest.indices, vec![0, 1]);
    assert!(largest.label.contains("VPN"));

    assert_eq!(digest.savings.wasted_hours, 2.0);
    assert_eq!(digest.savings.saved_dollars, 40.0);

    assert_eq!(digest.embedding_strategy, EmbeddingStrategy::Local);
    assert_eq!(digest.suggestion_source, SuggestionSource::Template);
    assert!(digest.suggestion.contains(&largest.label));
    assert!(digest.suggestion.contains("2 tickets"));
    assert!(digest.summary.contains(&largest.label));
    assert!(digest.summary.contains("$40.00"));
    assert_partition(&digest.clusters, 4);
}

#[tokio::test]
async fn reference_example_remote() {
    let embedder = MockEmbedder::new(3)
        .with_vector("VPN not connecting", vec![1.0, 0.0, 0.0])
        .with_vector("VPN drops constantly", vec![0.9, 0.1, 0.0])
        .with_vector("Password reset needed", vec![0.0, 0.0, 1.0])
        .with_vector("Printer offline", vec![0.0, 1.0, 0.0]);
    let backend: Arc<dyn LlmBackend> =
        Arc::new(MockBackend::new().with_default_response("Create a VPN auto-reconnect profile."));

    let digest = digester(Some(embedder), Some(backend))
        .produce_digest(&batch(&REFERENCE), &params())
        .await
        .unwrap();

    assert_eq!(digest.embedding_strategy, EmbeddingStrategy::Remote);
    assert_eq!(digest.clusters.len(), 3);
    assert_eq!(digest.clusters.largest().unwrap().indices, vec![0, 1]);
    assert_eq!(digest.suggestion_source, SuggestionSource::Remote);
    assert_eq!(digest.suggestion, "Create a VPN auto-reconnect profile");
    assert_eq!(digest.savings.saved_dollars, 40.0);
    assert!(!digest.is_degraded());
}

#[tokio::test]
async fn every_batch_is_partitioned() {
    for n in [1, 2, 3, 7, 24, 61, 150] {
        let tickets = themed_tickets(n);
        let batch = TicketBatch::new(tickets).unwrap();

        let local = digester(None, None).produce_digest(&batch, &params()).await.unwrap();
        assert_partition(&local.clusters, n);
        assert_eq!(local.insights.len(), local.clusters.len());

        let remote = digester(Some(MockEmbedder::new(64)), None)
            .produce_digest(&batch, &params())
            .await
            .unwrap();
        assert_eq!(remote.embedding_strategy, EmbeddingStrategy::Remote);
        assert_partition(&remote.clusters, n);
    }
}

#[tokio::test]
async fn local_path_is_deterministic() {
    let batch = TicketBatch::new(themed_tickets(40)).unwrap();
    let first = digester(None, None).produce_digest(&batch, &params()).await.unwrap();
    let second = digester(None, None).produce_digest(&batch, &params()).await.unwrap();

    assert_eq!(first.clusters, second.clusters);
    assert_eq!(first.summary, second.summary);
    assert_eq!(first.insights, second.insights);
}

#[tokio::test]
async fn single_ticket_batch() {
    for embedder in [None, Some(MockEmbedder::new(16))] {
        let digest = digester(embedder, None)
            .produce_digest(&batch(&["Printer offline"]), &params())
            .await
            .unwrap();

        assert_eq!(digest.clusters.len(), 1);
        assert_eq!(digest.clusters.largest().unwrap().indices, vec![0]);
        assert_eq!(digest.savings.wasted_hours, 0.5);
        assert_eq!(digest.savings.saved_dollars, 20.0);
    }
}

#[tokio::test]
async fn identical_tickets_form_one_cluster() {
    let tickets = ["VPN not connecting"; 5];
    for embedder in [None, Some(MockEmbedder::new(32))] {
        let digest = digester(embedder, None)
            .produce_digest(&batch(&tickets), &params())
            .await
            .unwrap();

        assert_eq!(digest.clusters.len(), 1);
        assert_eq!(digest.clusters.largest().unwrap().indices, vec![0, 1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn embedding_failure_on_any_ticket_falls_back_whole_batch() {
    for embedder in [
        MockEmbedder::new(32).failing_on("Printer"),
        MockEmbedder::new(32).unavailable(),
        MockEmbedder::new(32).dropping_last(),
    ] {
        let digest = digester(Some(embedder), None)
            .produce_digest(&batch(&REFERENCE), &params())
            .await
            .unwrap();

        assert_eq!(digest.embedding_strategy, EmbeddingStrategy::Local);
        assert_partition(&digest.clusters, 4);
        assert_eq!(digest.clusters.largest().unwrap().indices, vec![0, 1]);
    }
}

#[tokio::test]
async fn suggestion_failure_uses_template() {
    let failing: Arc<dyn LlmBackend> =
        Arc::new(MockBackend::new().failing_with(|| LlmError::RateLimited(1)));
    let digest = digester(None, Some(failing))
        .produce_digest(&batch(&REFERENCE), &params())
        .await
        .unwrap();

    let largest = digest.clusters.largest().unwrap();
    assert_eq!(digest.suggestion_source, SuggestionSource::Template);
    assert!(!digest.suggestion.is_empty());
    assert!(digest.suggestion.contains(&largest.label));
    assert!(digest.suggestion.contains(&largest.size().to_string()));
}

#[tokio::test]
async fn savings_never_exceed_total_cost() {
    let batch = TicketBatch::new(themed_tickets(23)).unwrap();
    for (avg, hourly) in [(0.5, 1.0), (15.0, 85.25), (480.0, 500.0)] {
        let params = DigestParams::new(avg, hourly).unwrap();
        let digest = digester(None, None).produce_digest(&batch, &params).await.unwrap();
        let s = digest.savings;
        assert!(s.wasted_hours >= 0.0 && s.saved_dollars >= 0.0);
        assert!(s.saved_dollars <= s.wasted_hours * params.hourly_cost_usd + 1e-9);
    }
}

#[tokio::test]
async fn pipeline_ceiling_fails_without_partial_result() {
    // Local clustering of a full batch cannot finish in a millisecond.
    let batch = TicketBatch::new(themed_tickets(1000)).unwrap();
    let digester = digester(None, None).with_timeout(Duration::from_millis(1));

    let result = digester.produce_digest(&batch, &params()).await;
    assert!(matches!(result, Err(DigestError::Timeout(d)) if d == Duration::from_millis(1)));
}

#[tokio::test(start_paused = true)]
async fn slow_suggestion_backend_falls_back_within_ceiling() {
    let slow: Arc<dyn LlmBackend> = Arc::new(SlowBackend {
        config: LlmConfig::default(),
    });
    let digester = digester(None, Some(slow)).with_timeout(Duration::from_millis(500));

    let digest = digester.produce_digest(&batch(&REFERENCE), &params()).await.unwrap();
    assert_eq!(digest.suggestion_source, SuggestionSource::Template);
    assert_partition(&digest.clusters, 4);
}

#[tokio::test(start_paused = true)]
async fn hanging_embedder_with_default_retry_falls_back_to_local() {
    let config = DigestConfig::default();
    let embeddings = EmbeddingProvider::local_only(TfIdfEmbedder::new())
        .with_retry(config.retry.policy())
        .with_remote(Arc::new(HangingEmbedder));
    let digester = Digester::new(embeddings, SuggestionGenerator::template_only())
        .with_timeout(config.pipeline.timeout());
    assert_eq!(digester.timeout(), DEFAULT_TIMEOUT);

    let started = tokio::time::Instant::now();
    let digest = digester.produce_digest(&batch(&REFERENCE), &params()).await.unwrap();

    assert_eq!(digest.embedding_strategy, EmbeddingStrategy::Local);
    assert_eq!(digest.clusters.largest().unwrap().indices, vec![0, 1]);
    // The embedding stage gives up after its share of the ceiling.
    assert!(started.elapsed() <= DEFAULT_TIMEOUT.mul_f64(0.4) + Duration::from_millis(100));
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    assert!(matches!(TicketBatch::new(Vec::new()), Err(DigestError::InvalidInput(_))));
    assert!(matches!(
        TicketBatch::new(vec!["  ".to_string()]),
        Err(DigestError::InvalidInput(_))
    ));
    assert!(matches!(DigestParams::new(0.0, 40.0), Err(DigestError::InvalidInput(_))));
    assert!(matches!(DigestParams::new(30.0, 501.0), Err(DigestError::InvalidInput(_))));
}

#[tokio::test]
async fn digest_serializes_clusters_in_rank_order() {
    let digest = digester(None, None)
        .produce_digest(&batch(&REFERENCE), &params())
        .await
        .unwrap();

    let json = serde_json::to_value(&digest).unwrap();
    let clusters = json["clusters"].as_object().unwrap();
    assert_eq!(clusters.len(), digest.clusters.len());
    assert_eq!(json["embedding_strategy"], "local");
    assert_eq!(json["suggestion_source"], "template");
    assert_eq!(json["savings"]["saved_dollars"], 40.0);

    let text = serde_json::to_string(&digest.clusters).unwrap();
    let first = text.find("\"VPN Issues\"").unwrap();
    let second = text.find("\"Issue Group 2\"").unwrap();
    assert!(first < second);
}
