//! Grouping ticket vectors into ranked clusters.
//!
//! Remote (semantic) vectors are grouped by linking every pair whose cosine
//! similarity reaches the threshold and taking connected components, so the
//! number of clusters is not fixed in advance. Local vectors go through
//! seeded k-means with a size-derived group count.

mod kmeans;
mod semantic;
mod union_find;

pub use kmeans::{cluster_count, KMeansConfig};
pub use union_find::UnionFind;

pub(crate) use semantic::{build_index, ticket_index};

use crate::config::ClusteringConfig;
use crate::deadline::Deadline;
use crate::error::{DigestError, Result};
use crate::provider::EmbeddedBatch;
use crate::types::{ClusterInsight, ClusterSet};
use shadowops_embeddings::{cosine_similarity, EmbeddingStrategy};
use std::time::Instant;
use tracing::info;

/// Partitions an embedded batch.
#[derive(Debug, Clone)]
pub struct Clusterer {
    similarity_threshold: f32,
    kmeans: KMeansConfig,
}

impl Default for Clusterer {
    fn default() -> Self {
        Self::from_config(&ClusteringConfig::default())
    }
}

impl Clusterer {
    pub fn new(similarity_threshold: f32, kmeans: KMeansConfig) -> Self {
        Self {
            similarity_threshold,
            kmeans,
        }
    }

    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self::new(
            config.similarity_threshold,
            KMeansConfig {
                max_clusters: config.max_clusters.max(1),
                seed: config.seed,
                restarts: config.restarts,
                max_iterations: config.max_iterations,
            },
        )
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Group `ticket_count` tickets; returns groups in rank order.
    ///
    /// Fails with [`DigestError::Structural`] when the vectors do not match
    /// the batch, or if the grouping is not a partition of `0..ticket_count`,
    /// and with [`DigestError::Timeout`] once `deadline` passes.
    pub async fn partition(
        &self,
        batch: &EmbeddedBatch,
        ticket_count: usize,
        deadline: &Deadline,
    ) -> Result<Vec<Vec<usize>>> {
        check_vectors(batch, ticket_count)?;
        let started = Instant::now();

        let groups = match batch.strategy {
            EmbeddingStrategy::Remote => {
                semantic::threshold_groups(&batch.vectors, batch.dimension, self.similarity_threshold, deadline)
                    .await?
            }
            EmbeddingStrategy::Local => kmeans::partition(&batch.vectors, &self.kmeans, deadline)?,
        };

        let ranked = rank_groups(groups);
        validate_partition(&ranked, ticket_count)?;

        info!(
            strategy = %batch.strategy,
            tickets = ticket_count,
            clusters = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "clustered tickets"
        );
        Ok(ranked)
    }
}

fn check_vectors(batch: &EmbeddedBatch, ticket_count: usize) -> Result<()> {
    if batch.vectors.len() != ticket_count {
        return Err(DigestError::structural(format!(
            "{} vectors for {} tickets",
            batch.vectors.len(),
            ticket_count
        )));
    }
    if batch.dimension == 0 {
        return Err(DigestError::structural("zero-dimensional vectors"));
    }
    if let Some(i) = batch.vectors.iter().position(|v| v.len() != batch.dimension) {
        return Err(DigestError::structural(format!(
            "vector {i} has dimension {}, expected {}",
            batch.vectors[i].len(),
            batch.dimension
        )));
    }
    if let Some(i) = batch.vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(DigestError::structural(format!("vector {i} has non-finite values")));
    }
    Ok(())
}

/// Sort members ascending, then groups by size descending, ties by smallest member.
pub fn rank_groups(mut groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    groups.retain(|g| !g.is_empty());
    for group in &mut groups {
        group.sort_unstable();
    }
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    groups
}

/// Every index in `0..n` appears in exactly one group.
pub fn validate_partition(groups: &[Vec<usize>], n: usize) -> Result<()> {
    let mut seen = vec![false; n];
    for &i in groups.iter().flatten() {
        if i >= n {
            return Err(DigestError::structural(format!("ticket index {i} out of range 0..{n}")));
        }
        if seen[i] {
            return Err(DigestError::structural(format!("ticket {i} assigned to two clusters")));
        }
        seen[i] = true;
    }
    if let Some(missing) = seen.iter().position(|&s| !s) {
        return Err(DigestError::structural(format!("ticket {missing} left unassigned")));
    }
    Ok(())
}

/// Cohesion and representative member for each cluster.
///
/// Quadratic in cluster size; the deadline is polled once per cluster.
pub fn insights(clusters: &ClusterSet, vectors: &[Vec<f32>], deadline: &Deadline) -> Result<Vec<ClusterInsight>> {
    clusters
        .iter()
        .map(|cluster| -> Result<ClusterInsight> {
            deadline.check()?;
            let members = &cluster.indices;
            let (cohesion, representative) = if members.len() < 2 {
                (1.0, members.first().copied().unwrap_or(0))
            } else {
                let m = members.len();
                let mut totals = vec![0.0f32; m];
                for a in 0..m {
                    for b in (a + 1)..m {
                        let s = cosine_similarity(&vectors[members[a]], &vectors[members[b]]);
                        totals[a] += s;
                        totals[b] += s;
                    }
                }
                let pairs = (m * (m - 1) / 2) as f32;
                let cohesion = totals.iter().sum::<f32>() / 2.0 / pairs;

                // First maximum wins, members are ascending.
                let mut best = 0;
                for (pos, &t) in totals.iter().enumerate() {
                    if t > totals[best] {
                        best = pos;
                    }
                }
                (cohesion, members[best])
            };

            Ok(ClusterInsight {
                label: cluster.label.clone(),
                size: cluster.size(),
                cohesion,
                representative,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cluster;

    fn batch(vectors: Vec<Vec<f32>>, strategy: EmbeddingStrategy) -> EmbeddedBatch {
        let dimension = vectors.first().map_or(0, Vec::len);
        EmbeddedBatch {
            vectors,
            dimension,
            strategy,
        }
    }

    #[test]
    fn test_rank_groups() {
        let ranked = rank_groups(vec![vec![3], vec![4, 1], vec![2], vec![], vec![0, 5]]);
        assert_eq!(ranked, vec![vec![0, 5], vec![1, 4], vec![2], vec![3]]);
    }

    #[test]
    fn test_validate_partition() {
        assert!(validate_partition(&[vec![0, 2], vec![1]], 3).is_ok());
        assert!(matches!(
            validate_partition(&[vec![0, 1], vec![1, 2]], 3),
            Err(DigestError::Structural(_))
        ));
        assert!(validate_partition(&[vec![0]], 2).is_err());
        assert!(validate_partition(&[vec![0, 1, 2]], 2).is_err());
    }

    #[tokio::test]
    async fn test_mismatched_vectors_are_structural() {
        let clusterer = Clusterer::default();
        let short = batch(vec![vec![1.0, 0.0]], EmbeddingStrategy::Local);
        assert!(matches!(
            clusterer.partition(&short, 2, &Deadline::none()).await,
            Err(DigestError::Structural(_))
        ));

        let ragged = EmbeddedBatch {
            vectors: vec![vec![1.0, 0.0], vec![1.0]],
            dimension: 2,
            strategy: EmbeddingStrategy::Remote,
        };
        assert!(clusterer.partition(&ragged, 2, &Deadline::none()).await.is_err());

        let empty = batch(vec![vec![], vec![]], EmbeddingStrategy::Local);
        assert!(clusterer.partition(&empty, 2, &Deadline::none()).await.is_err());
    }

    #[tokio::test]
    async fn test_semantic_path_for_remote_vectors() {
        let clusterer = Clusterer::default();
        let remote = batch(
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.99, 0.14, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            EmbeddingStrategy::Remote,
        );
        let groups = clusterer.partition(&remote, 4, &Deadline::none()).await.unwrap();
        assert_eq!(groups, vec![vec![0, 2], vec![1], vec![3]]);
    }

    #[tokio::test]
    async fn test_single_ticket() {
        let clusterer = Clusterer::default();
        for strategy in [EmbeddingStrategy::Remote, EmbeddingStrategy::Local] {
            let one = batch(vec![vec![0.5, 0.5]], strategy);
            assert_eq!(clusterer.partition(&one, 1, &Deadline::none()).await.unwrap(), vec![vec![0]]);
        }
    }

    #[test]
    fn test_insights() {
        let clusters = ClusterSet::from_ranked(vec![
            Cluster {
                label: "A".into(),
                indices: vec![0, 1, 2],
            },
            Cluster {
                label: "B".into(),
                indices: vec![3],
            },
        ]);
        let vectors = vec![
            vec![1.0, 0.0],
            vec![0.8, 0.6],
            vec![0.6, 0.8],
            vec![0.0, 1.0],
        ];
        let found = insights(&clusters, &vectors, &Deadline::none()).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].representative, 1);
        assert!((found[0].cohesion - 0.7867).abs() < 1e-3);
        assert_eq!(found[1].cohesion, 1.0);
        assert_eq!(found[1].representative, 3);
    }

    #[tokio::test]
    async fn test_local_clustering_honours_the_deadline() {
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|i| vec![(i % 7) as f32, (i % 11) as f32, (i % 13) as f32])
            .collect();
        let local = batch(vectors, EmbeddingStrategy::Local);
        let expired = Deadline::after(std::time::Duration::ZERO);
        assert!(matches!(
            Clusterer::default().partition(&local, 200, &expired).await,
            Err(DigestError::Timeout(_))
        ));
    }
}
