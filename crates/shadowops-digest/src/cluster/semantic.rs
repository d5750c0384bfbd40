//! Threshold-graph clustering over a similarity index.

use super::union_find::UnionFind;
use crate::deadline::Deadline;
use crate::error::Result;
use shadowops_vectors::{InMemoryStore, VectorRecord, VectorStore};

const TICKET_INDEX: &str = "ticket_index";

/// Index every vector under its ticket position.
pub(crate) async fn build_index(vectors: &[Vec<f32>], dimension: usize) -> Result<InMemoryStore> {
    let store = InMemoryStore::new(dimension);
    let records = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| VectorRecord::new(i.to_string(), v.clone()).with_metadata(TICKET_INDEX, i))
        .collect();
    store.upsert(records).await?;
    Ok(store)
}

/// Ticket position stored with a search hit.
pub(crate) fn ticket_index(hit: &shadowops_vectors::SearchResult) -> Option<usize> {
    hit.metadata
        .get(TICKET_INDEX)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
}

/// Connected components of the graph linking tickets with similarity >= `threshold`.
///
/// Every ticket is searched against the whole index, so the components do
/// not depend on search order. The deadline is polled once per ticket.
pub(crate) async fn threshold_groups(
    vectors: &[Vec<f32>],
    dimension: usize,
    threshold: f32,
    deadline: &Deadline,
) -> Result<Vec<Vec<usize>>> {
    let n = vectors.len();
    let store = build_index(vectors, dimension).await?;
    let mut forest = UnionFind::new(n);

    for (i, vector) in vectors.iter().enumerate() {
        deadline.check()?;
        for hit in store.search_above(vector, n, threshold).await? {
            if let Some(j) = ticket_index(&hit).filter(|&j| j < n && j != i) {
                forest.union(i, j);
            }
        }
    }

    Ok(forest.groups())
}
