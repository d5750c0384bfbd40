//! # ShadowOps Vectors
//!
//! Similarity index used by the semantic clusterer.
//!
//! The [`VectorStore`] trait keeps the clusterer independent of the index
//! implementation; [`InMemoryStore`] is a brute-force index that is plenty
//! for one bounded batch of tickets.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shadowops_vectors::{InMemoryStore, VectorRecord, VectorStore};
//!
//! let store = InMemoryStore::new(3);
//! store.upsert(vec![VectorRecord::new("0", vec![1.0, 0.0, 0.0])]).await?;
//! let neighbours = store.search_above(&[1.0, 0.0, 0.0], 10, 0.8).await?;
//! ```

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Index lock poisoned")]
    Poisoned,
}

pub type VectorResult<T> = Result<T, VectorError>;

/// One indexed vector with its caller-defined payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A scored hit; higher scores are closer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Cosine similarity of two equal-length vectors; 0 when either side is
/// the zero vector.
pub fn cosine_score(a: &[f32], b: &[f32]) -> f32 {
    let norms = norm(a) * norm(b);
    if norms == 0.0 {
        0.0
    } else {
        a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / norms
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// A cosine-similarity index over fixed-dimension vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn dimension(&self) -> usize;

    /// Insert records; an existing id is replaced in place.
    async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()>;

    /// Top `k` records by descending score. Equal scores keep insertion order.
    async fn search(&self, vector: &[f32], k: usize) -> VectorResult<Vec<SearchResult>>;

    /// Like [`search`](Self::search), keeping only hits scoring at least `min_score`.
    async fn search_above(
        &self,
        vector: &[f32],
        k: usize,
        min_score: f32,
    ) -> VectorResult<Vec<SearchResult>> {
        let mut results = self.search(vector, k).await?;
        results.retain(|r| r.score >= min_score);
        Ok(results)
    }
}

pub use memory::InMemoryStore;
