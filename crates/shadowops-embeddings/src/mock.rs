//! Deterministic stand-in for a remote embedding service.
//!
//! Hashes words into a fixed-dimension space, so texts sharing words land
//! close together. Failure injection lets tests exercise the fallback paths
//! without a network.

use crate::normalize::normalize_l2;
use crate::text::tokenize;
use crate::{Embedder, EmbeddingError, EmbeddingResult, EmbeddingStrategy};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock remote embedder.
///
/// # Example
///
/// ```rust
/// use shadowops_embeddings::{Embedder, MockEmbedder};
///
/// # tokio_test_block_on(async {
/// let embedder = MockEmbedder::new(64).failing_on("printer");
/// assert!(embedder.embed_batch(&["vpn down", "printer jam"]).await.is_err());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct MockEmbedder {
    dimension: usize,
    num_hashes: usize,
    overrides: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
    transient_failures: AtomicUsize,
    unavailable: bool,
    drop_last: bool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    /// Create a mock producing `dimension`-length vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            num_hashes: 4,
            overrides: HashMap::new(),
            fail_on: None,
            transient_failures: AtomicUsize::new(0),
            unavailable: false,
            drop_last: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Return a fixed vector for an exact text.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.to_string(), vector);
        self
    }

    /// Fail the whole batch (non-retriable) when any text contains `pattern`.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on = Some(pattern.to_string());
        self
    }

    /// Rate-limit the first `n` calls.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Every call fails with a connection error.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Return one vector fewer than requested.
    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Number of `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hash_with_seed(&self, word: &str, seed: u64) -> usize {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        word.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn sign_hash(&self, word: &str, seed: u64) -> f32 {
        let mut hasher = DefaultHasher::new();
        (seed + 1000).hash(&mut hasher);
        word.hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.get(text) {
            return v.clone();
        }

        let mut vector = vec![0.0f32; self.dimension];
        let mut terms = tokenize(text);
        if terms.is_empty() {
            terms.push(text.to_lowercase());
        }
        for term in &terms {
            for seed in 0..self.num_hashes as u64 {
                let idx = self.hash_with_seed(term, seed);
                vector[idx] += self.sign_hash(term, seed);
            }
        }
        normalize_l2(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable {
            return Err(EmbeddingError::ConnectionFailed(
                "mock service unavailable".to_string(),
            ));
        }

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(EmbeddingError::RateLimited(1));
        }

        if let Some(pattern) = &self.fail_on {
            if let Some(bad) = texts.iter().find(|t| t.contains(pattern.as_str())) {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "mock rejected ticket: {}",
                    bad
                )));
            }
        }

        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.hash_embed(t)).collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn strategy(&self) -> EmbeddingStrategy {
        EmbeddingStrategy::Remote
    }
}
