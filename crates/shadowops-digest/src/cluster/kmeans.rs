//! Seeded k-means over local vectors.
//!
//! k-means++ seeding, Lloyd iterations, then single-point (Hartigan) moves
//! until no move lowers the within-cluster sum of squares. Each restart uses
//! its own `ChaCha8Rng` stream, so results are reproducible across runs and
//! platforms. Every iteration polls the deadline, so a long batch stops
//! with a timeout instead of overrunning the pipeline ceiling.

use crate::deadline::Deadline;
use crate::error::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shadowops_embeddings::squared_euclidean;

const MOVE_EPSILON: f64 = 1e-9;

/// Points handled between deadline polls inside one refinement pass.
const POLL_EVERY: usize = 32;

/// Parameters of the k-means fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansConfig {
    pub max_clusters: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iterations: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_clusters: 10,
            seed: 42,
            restarts: 10,
            max_iterations: 100,
        }
    }
}

/// Group count for a batch of `n` tickets with `distinct` distinct vectors.
pub fn cluster_count(n: usize, distinct: usize, max_clusters: usize) -> usize {
    let by_size = match n {
        0..=2 => 1,
        3..=5 => 2,
        6..=10 => 3,
        11..=20 => (n / 3).min(4),
        21..=50 => (n / 5).min(6),
        _ => (n / 8).min(10),
    };
    by_size
        .min(ceil_sqrt(n))
        .min(max_clusters)
        .min(distinct)
        .max(1)
}

fn ceil_sqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r * r < n {
        r += 1;
    }
    while r > 0 && (r - 1) * (r - 1) >= n {
        r -= 1;
    }
    r
}

/// Number of pairwise-distinct vectors.
pub fn distinct_count(vectors: &[Vec<f32>]) -> usize {
    let mut keys: Vec<Vec<u32>> = vectors
        .iter()
        .map(|v| v.iter().map(|x| x.to_bits()).collect())
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

/// Partition `vectors` into non-empty groups, members ascending.
pub fn partition(vectors: &[Vec<f32>], config: &KMeansConfig, deadline: &Deadline) -> Result<Vec<Vec<usize>>> {
    let n = vectors.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let k = cluster_count(n, distinct_count(vectors), config.max_clusters);
    let assignment = if k <= 1 {
        vec![0; n]
    } else {
        let data: Vec<Vec<f64>> = vectors
            .iter()
            .map(|v| v.iter().map(|&x| x as f64).collect())
            .collect();
        best_of_restarts(&data, k, config, deadline)?
    };

    let mut groups = vec![Vec::new(); k];
    for (i, &c) in assignment.iter().enumerate() {
        groups[c].push(i);
    }
    groups.retain(|g| !g.is_empty());
    Ok(groups)
}

fn best_of_restarts(
    data: &[Vec<f64>],
    k: usize,
    config: &KMeansConfig,
    deadline: &Deadline,
) -> Result<Vec<usize>> {
    let mut best: Option<(f64, Vec<usize>)> = None;

    for restart in 0..config.restarts.max(1) {
        deadline.check()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(restart as u64));
        let mut run = Run::seeded(data, k, &mut rng);
        run.lloyd(config.max_iterations, deadline)?;
        run.refine(config.max_iterations, deadline)?;
        let inertia = run.inertia();

        let better = match &best {
            Some((best_inertia, _)) => inertia < best_inertia - MOVE_EPSILON,
            None => true,
        };
        if better {
            best = Some((inertia, run.assignment));
        }
    }

    Ok(best
        .map(|(_, assignment)| assignment)
        .unwrap_or_else(|| vec![0; data.len()]))
}

/// State of one k-means restart.
struct Run<'a> {
    data: &'a [Vec<f64>],
    centroids: Vec<Vec<f64>>,
    assignment: Vec<usize>,
    sizes: Vec<usize>,
}

impl<'a> Run<'a> {
    /// k-means++ seeding.
    fn seeded(data: &'a [Vec<f64>], k: usize, rng: &mut ChaCha8Rng) -> Self {
        let n = data.len();
        let mut chosen = vec![rng.gen_range(0..n)];
        let mut nearest: Vec<f64> = data
            .iter()
            .map(|x| squared_euclidean(x, &data[chosen[0]]))
            .collect();

        while chosen.len() < k {
            let total: f64 = nearest.iter().sum();
            let next = if total > 0.0 {
                let target = rng.gen::<f64>() * total;
                let mut acc = 0.0;
                let mut pick = None;
                for (i, &d) in nearest.iter().enumerate() {
                    acc += d;
                    if d > 0.0 && acc >= target {
                        pick = Some(i);
                        break;
                    }
                }
                // Rounding can leave the target just past the last sum.
                pick.or_else(|| nearest.iter().rposition(|&d| d > 0.0))
            } else {
                None
            };

            let Some(next) = next else { break };
            chosen.push(next);
            for (i, x) in data.iter().enumerate() {
                nearest[i] = nearest[i].min(squared_euclidean(x, &data[next]));
            }
        }

        let centroids: Vec<Vec<f64>> = chosen.iter().map(|&i| data[i].clone()).collect();
        let k = centroids.len();
        Self {
            data,
            centroids,
            assignment: vec![usize::MAX; n],
            sizes: vec![0; k],
        }
    }

    fn nearest_centroid(&self, x: &[f64]) -> usize {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (c, centroid) in self.centroids.iter().enumerate() {
            let d = squared_euclidean(x, centroid);
            if d < best_d {
                best = c;
                best_d = d;
            }
        }
        best
    }

    fn lloyd(&mut self, max_iterations: usize, deadline: &Deadline) -> Result<()> {
        for _ in 0..max_iterations.max(1) {
            deadline.check()?;
            let mut changed = false;
            for i in 0..self.data.len() {
                let c = self.nearest_centroid(&self.data[i]);
                if self.assignment[i] != c {
                    self.assignment[i] = c;
                    changed = true;
                }
            }
            self.recount();
            self.fill_empty();
            self.recompute_centroids();
            if !changed {
                break;
            }
        }
        Ok(())
    }

    fn recount(&mut self) {
        self.sizes.iter_mut().for_each(|s| *s = 0);
        for &c in &self.assignment {
            self.sizes[c] += 1;
        }
    }

    /// Give each empty cluster the point farthest from its own centroid.
    fn fill_empty(&mut self) {
        while let Some(empty) = self.sizes.iter().position(|&s| s == 0) {
            let donor = (0..self.data.len())
                .filter(|&i| self.sizes[self.assignment[i]] > 1)
                .map(|i| {
                    let d = squared_euclidean(&self.data[i], &self.centroids[self.assignment[i]]);
                    (i, d)
                })
                .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                    Some((_, bd)) if bd >= d => best,
                    _ => Some((i, d)),
                });

            let Some((i, _)) = donor else { return };
            self.sizes[self.assignment[i]] -= 1;
            self.assignment[i] = empty;
            self.sizes[empty] += 1;
            self.centroids[empty] = self.data[i].clone();
        }
    }

    fn recompute_centroids(&mut self) {
        let dim = self.data.first().map_or(0, Vec::len);
        let mut sums = vec![vec![0.0; dim]; self.centroids.len()];
        for (x, &c) in self.data.iter().zip(&self.assignment) {
            for (s, v) in sums[c].iter_mut().zip(x) {
                *s += v;
            }
        }
        for (c, sum) in sums.into_iter().enumerate() {
            if self.sizes[c] > 0 {
                let size = self.sizes[c] as f64;
                self.centroids[c] = sum.into_iter().map(|s| s / size).collect();
            }
        }
    }

    /// Move single points while doing so lowers the total within-cluster
    /// sum of squares. Never empties a cluster.
    fn refine(&mut self, max_passes: usize, deadline: &Deadline) -> Result<()> {
        for _ in 0..max_passes.max(1) {
            let mut moved = false;
            for i in 0..self.data.len() {
                if i % POLL_EVERY == 0 {
                    deadline.check()?;
                }
                let from = self.assignment[i];
                let n_from = self.sizes[from];
                if n_from <= 1 {
                    continue;
                }

                let x = &self.data[i];
                let leave_gain = n_from as f64 / (n_from as f64 - 1.0)
                    * squared_euclidean(x, &self.centroids[from]);

                let mut target = None;
                let mut best_cost = leave_gain - MOVE_EPSILON;
                for (to, centroid) in self.centroids.iter().enumerate() {
                    if to == from {
                        continue;
                    }
                    let n_to = self.sizes[to] as f64;
                    let cost = n_to / (n_to + 1.0) * squared_euclidean(x, centroid);
                    if cost < best_cost {
                        best_cost = cost;
                        target = Some(to);
                    }
                }

                if let Some(to) = target {
                    self.move_point(i, from, to);
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }
        Ok(())
    }

    fn move_point(&mut self, i: usize, from: usize, to: usize) {
        let x = &self.data[i];
        let n_from = self.sizes[from] as f64;
        let n_to = self.sizes[to] as f64;

        for (c, v) in self.centroids[from].iter_mut().zip(x) {
            *c = (*c * n_from - v) / (n_from - 1.0);
        }
        for (c, v) in self.centroids[to].iter_mut().zip(x) {
            *c = (*c * n_to + v) / (n_to + 1.0);
        }
        self.sizes[from] -= 1;
        self.sizes[to] += 1;
        self.assignment[i] = to;
    }

    fn inertia(&self) -> f64 {
        self.data
            .iter()
            .zip(&self.assignment)
            .map(|(x, &c)| squared_euclidean(x, &self.centroids[c]))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DigestError;
    use std::time::Duration;

    fn run(vectors: &[Vec<f32>], config: &KMeansConfig) -> Vec<Vec<usize>> {
        partition(vectors, config, &Deadline::none()).unwrap()
    }

    fn blobs() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0],
            vec![0.9, 0.1],
            vec![0.0, 1.0],
            vec![0.1, 0.9],
            vec![0.95, 0.05],
        ]
    }

    #[test]
    fn test_cluster_count_heuristic() {
        assert_eq!(cluster_count(1, 1, 10), 1);
        assert_eq!(cluster_count(2, 2, 10), 1);
        assert_eq!(cluster_count(4, 4, 10), 2);
        assert_eq!(cluster_count(9, 9, 10), 3);
        assert_eq!(cluster_count(20, 20, 10), 4);
        assert_eq!(cluster_count(50, 50, 10), 6);
        assert_eq!(cluster_count(1000, 1000, 10), 10);
        assert_eq!(cluster_count(1000, 1000, 4), 4);
        assert_eq!(cluster_count(5, 1, 10), 1);
    }

    #[test]
    fn test_ceil_sqrt() {
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(4), 2);
        assert_eq!(ceil_sqrt(5), 3);
        assert_eq!(ceil_sqrt(100), 10);
    }

    #[test]
    fn test_separates_blobs() {
        let groups = run(&blobs(), &KMeansConfig::default());
        let mut groups = groups;
        groups.sort();
        assert_eq!(groups, vec![vec![0, 1, 4], vec![2, 3]]);
    }

    #[test]
    fn test_reproducible() {
        let config = KMeansConfig::default();
        let vectors: Vec<Vec<f32>> = (0..40)
            .map(|i| {
                let t = i as f32 * 0.37;
                vec![t.sin(), t.cos(), (t * 0.5).sin()]
            })
            .collect();
        assert_eq!(run(&vectors, &config), run(&vectors, &config));
    }

    #[test]
    fn test_partition_covers_every_index() {
        let vectors: Vec<Vec<f32>> = (0..30).map(|i| vec![(i % 7) as f32, (i % 3) as f32]).collect();
        let groups = run(&vectors, &KMeansConfig::default());
        let mut seen: Vec<usize> = groups.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..30).collect::<Vec<_>>());
        assert!(groups.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_identical_vectors_one_group() {
        let vectors = vec![vec![0.3, 0.4]; 5];
        assert_eq!(run(&vectors, &KMeansConfig::default()), vec![vec![0, 1, 2, 3, 4]]);
    }

    #[test]
    fn test_orthogonal_pair_stays_together() {
        // Two tickets sharing a term, two unrelated ones.
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let vectors = vec![
            vec![s, s, 0.0, 0.0, 0.0],
            vec![s, 0.0, s, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0, 1.0],
        ];
        let mut groups = run(&vectors, &KMeansConfig::default());
        groups.sort();
        assert_eq!(groups, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_expired_deadline_stops_clustering() {
        let result = partition(&blobs(), &KMeansConfig::default(), &Deadline::after(Duration::ZERO));
        assert!(matches!(result, Err(DigestError::Timeout(_))));
    }

    #[test]
    fn test_single_group_needs_no_iterations() {
        // k = 1 never enters the iteration loop, so even an expired deadline succeeds.
        let vectors = vec![vec![0.3, 0.4]; 3];
        let groups = partition(&vectors, &KMeansConfig::default(), &Deadline::after(Duration::ZERO)).unwrap();
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }
}
