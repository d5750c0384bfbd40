//! Local TF-IDF embedder (no network, no model files).
//!
//! The vocabulary is fitted on the batch being embedded, so vectors are only
//! comparable within one batch. Output is deterministic for a given batch.

use crate::normalize::normalize_l2;
use crate::text::tokenize;
use crate::{Embedder, EmbeddingResult, EmbeddingStrategy};
use async_trait::async_trait;
use std::collections::HashMap;

/// Default cap on vocabulary size.
pub const DEFAULT_MAX_FEATURES: usize = 1000;

/// TF-IDF vectorizer over unigrams and adjacent-token bigrams.
///
/// # Example
///
/// ```rust
/// use shadowops_embeddings::TfIdfEmbedder;
///
/// let embedder = TfIdfEmbedder::new();
/// let vectors = embedder.fit_transform(&["VPN not connecting", "VPN drops"]);
/// assert_eq!(vectors.len(), 2);
/// assert_eq!(vectors[0].len(), vectors[1].len());
/// ```
#[derive(Debug, Clone)]
pub struct TfIdfEmbedder {
    max_features: usize,
    bigrams: bool,
}

impl TfIdfEmbedder {
    /// Create an embedder with the default feature cap and bigrams enabled.
    pub fn new() -> Self {
        Self {
            max_features: DEFAULT_MAX_FEATURES,
            bigrams: true,
        }
    }

    /// Set the vocabulary cap.
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features.max(1);
        self
    }

    /// Only use single terms.
    pub fn without_bigrams(mut self) -> Self {
        self.bigrams = false;
        self
    }

    fn features(&self, text: &str) -> Vec<String> {
        let terms = tokenize(text);
        let mut features = terms.clone();
        if self.bigrams {
            features.extend(terms.windows(2).map(|w| format!("{} {}", w[0], w[1])));
        }
        features
    }

    /// Fit the vocabulary on `texts` and return one L2-normalized vector per text.
    ///
    /// Texts without any meaningful token map to the zero vector. When the
    /// whole batch has no vocabulary, vectors have a single zero component.
    pub fn fit_transform(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        let docs: Vec<Vec<String>> = texts.iter().map(|t| self.features(t)).collect();

        // term -> (first appearance, document frequency, total count)
        let mut stats: HashMap<&str, (usize, usize, usize)> = HashMap::new();
        for doc in &docs {
            let mut seen_here: Vec<&str> = Vec::new();
            for feature in doc {
                let next_order = stats.len();
                let entry = stats.entry(feature.as_str()).or_insert((next_order, 0, 0));
                entry.2 += 1;
                if !seen_here.contains(&feature.as_str()) {
                    entry.1 += 1;
                    seen_here.push(feature.as_str());
                }
            }
        }

        let mut ranked: Vec<(&str, (usize, usize, usize))> =
            stats.iter().map(|(k, v)| (*k, *v)).collect();
        ranked.sort_by(|a, b| b.1 .2.cmp(&a.1 .2).then(a.1 .0.cmp(&b.1 .0)));
        ranked.truncate(self.max_features);
        ranked.sort_by_key(|(_, (order, _, _))| *order);

        let n_docs = docs.len() as f32;
        let vocab: HashMap<&str, (usize, f32)> = ranked
            .iter()
            .enumerate()
            .map(|(column, (term, (_, df, _)))| {
                let idf = ((1.0 + n_docs) / (1.0 + *df as f32)).ln() + 1.0;
                (*term, (column, idf))
            })
            .collect();

        let dimension = vocab.len().max(1);

        docs.iter()
            .map(|doc| {
                let mut vector = vec![0.0f32; dimension];
                for feature in doc {
                    if let Some((column, idf)) = vocab.get(feature.as_str()) {
                        vector[*column] += idf;
                    }
                }
                normalize_l2(&mut vector);
                vector
            })
            .collect()
    }
}

impl Default for TfIdfEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for TfIdfEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.fit_transform(texts))
    }

    fn model_name(&self) -> &str {
        "tfidf"
    }

    fn strategy(&self) -> EmbeddingStrategy {
        EmbeddingStrategy::Local
    }
}
