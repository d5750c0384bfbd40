//! In-memory vector store implementation.
//!
//! Brute-force search over every stored record. Records are kept in insertion
//! order so that equal scores always come back in the same order.

use crate::{cosine_score, SearchResult, VectorError, VectorRecord, VectorResult, VectorStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Records {
    items: Vec<VectorRecord>,
    by_id: HashMap<String, usize>,
}

/// In-memory vector store using brute-force search.
///
/// # Example
///
/// ```rust
/// use shadowops_vectors::{InMemoryStore, VectorStore, VectorRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new(3);
///
///     store.upsert(vec![
///         VectorRecord::new("a", vec![1.0, 0.0, 0.0]),
///         VectorRecord::new("b", vec![0.0, 1.0, 0.0]),
///         VectorRecord::new("c", vec![0.7, 0.7, 0.0]),
///     ]).await?;
///
///     let results = store.search(&[1.0, 0.0, 0.0], 2).await?;
///     assert_eq!(results[0].id, "a");
///
///     Ok(())
/// }
/// ```
pub struct InMemoryStore {
    records: RwLock<Records>,
    dimension: usize,
}

impl InMemoryStore {
    /// Create an empty store for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            dimension,
        }
    }

    fn check_vector(&self, vector: &[f32]) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(VectorError::InvalidVector(
                "vector contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> VectorResult<()> {
        for record in &records {
            self.check_vector(&record.vector)?;
        }

        let mut store = self
            .records
            .write()
            .map_err(|_| VectorError::Poisoned)?;

        for record in records {
            match store.by_id.get(&record.id).copied() {
                Some(pos) => store.items[pos] = record,
                None => {
                    let pos = store.items.len();
                    store.by_id.insert(record.id.clone(), pos);
                    store.items.push(record);
                }
            }
        }

        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> VectorResult<Vec<SearchResult>> {
        self.check_vector(vector)?;

        let store = self
            .records
            .read()
            .map_err(|_| VectorError::Poisoned)?;

        let mut scored: Vec<(usize, f32)> = store
            .items
            .iter()
            .enumerate()
            .map(|(pos, record)| (pos, cosine_score(vector, &record.vector)))
            .collect();

        // Stable sort keeps insertion order for ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(pos, score)| {
                let record = &store.items[pos];
                SearchResult {
                    id: record.id.clone(),
                    score,
                    metadata: record.metadata.clone(),
                }
            })
            .collect())
    }
}
