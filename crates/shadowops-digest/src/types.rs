//! Data model shared by the pipeline stages.

use crate::error::{DigestError, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use shadowops_embeddings::EmbeddingStrategy;

/// Maximum number of tickets in one batch.
pub const MAX_TICKETS: usize = 1000;

/// Maximum minutes a single ticket may be estimated at.
pub const MAX_AVG_MINUTES: f64 = 480.0;

/// Accepted hourly cost range in USD.
pub const HOURLY_COST_RANGE: (f64, f64) = (1.0, 500.0);

/// An accepted, trimmed batch of ticket descriptions.
///
/// A ticket's position is its identity everywhere downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketBatch {
    tickets: Vec<String>,
}

impl TicketBatch {
    /// Validate and accept a batch: 1..=1000 entries, none blank.
    pub fn new(tickets: Vec<String>) -> Result<Self> {
        if tickets.is_empty() {
            return Err(DigestError::invalid("ticket batch is empty"));
        }
        if tickets.len() > MAX_TICKETS {
            return Err(DigestError::invalid(format!(
                "ticket batch has {} entries, maximum is {MAX_TICKETS}",
                tickets.len()
            )));
        }

        let tickets = tickets
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let trimmed = t.trim();
                if trimmed.is_empty() {
                    Err(DigestError::invalid(format!("ticket {i} is blank")))
                } else {
                    Ok(trimmed.to_string())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { tickets })
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Always false for an accepted batch.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.tickets.get(index).map(String::as_str)
    }

    pub fn tickets(&self) -> &[String] {
        &self.tickets
    }

    /// Borrowed views, as embedders expect them.
    pub fn as_strs(&self) -> Vec<&str> {
        self.tickets.iter().map(String::as_str).collect()
    }
}

/// Cost parameters for one digest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DigestParams {
    /// Average handling time per ticket, in (0, 480].
    pub avg_minutes_per_ticket: f64,
    /// Fully loaded hourly cost in USD, in [1, 500], rounded to cents.
    pub hourly_cost_usd: f64,
}

impl DigestParams {
    pub fn new(avg_minutes_per_ticket: f64, hourly_cost_usd: f64) -> Result<Self> {
        if !avg_minutes_per_ticket.is_finite()
            || avg_minutes_per_ticket <= 0.0
            || avg_minutes_per_ticket > MAX_AVG_MINUTES
        {
            return Err(DigestError::invalid(format!(
                "average minutes per ticket must be in (0, {MAX_AVG_MINUTES}], got {avg_minutes_per_ticket}"
            )));
        }

        let (min, max) = HOURLY_COST_RANGE;
        if !hourly_cost_usd.is_finite() || hourly_cost_usd < min || hourly_cost_usd > max {
            return Err(DigestError::invalid(format!(
                "hourly cost must be in [{min:.2}, {max:.2}], got {hourly_cost_usd}"
            )));
        }

        Ok(Self {
            avg_minutes_per_ticket,
            hourly_cost_usd: (hourly_cost_usd * 100.0).round() / 100.0,
        })
    }
}

/// A labelled group of ticket indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub label: String,
    /// Member indices, ascending.
    pub indices: Vec<usize>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.indices.len()
    }
}

/// Clusters in rank order: size descending, ties by smallest member index.
///
/// Labels are unique, so the set serializes as an ordered label → indices map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
}

impl ClusterSet {
    pub(crate) fn from_ranked(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    /// The top-ranked cluster.
    pub fn largest(&self) -> Option<&Cluster> {
        self.clusters.first()
    }

    pub fn get(&self, label: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.clusters.iter().map(|c| c.label.as_str())
    }

    /// Sum of cluster sizes.
    pub fn total_tickets(&self) -> usize {
        self.clusters.iter().map(Cluster::size).sum()
    }

    /// The cluster holding `index`, if any.
    pub fn cluster_of(&self, index: usize) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.indices.binary_search(&index).is_ok())
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

impl Serialize for ClusterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.clusters.len()))?;
        for cluster in &self.clusters {
            map.serialize_entry(&cluster.label, &cluster.indices)?;
        }
        map.end()
    }
}

/// Time wasted on the batch and money the suggestion could save.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavingsEstimate {
    /// Hours, one decimal place.
    pub wasted_hours: f64,
    /// USD, two decimal places.
    pub saved_dollars: f64,
}

/// Where the suggestion text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Remote,
    Template,
}

impl SuggestionSource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SuggestionSource::Template)
    }
}

impl std::fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestionSource::Remote => write!(f, "remote"),
            SuggestionSource::Template => write!(f, "template"),
        }
    }
}

/// Per-cluster quality figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterInsight {
    pub label: String,
    pub size: usize,
    /// Mean pairwise cosine similarity of the members; 1.0 for singletons.
    pub cohesion: f32,
    /// Member most similar to the rest of its cluster.
    pub representative: usize,
}

/// The complete output of one digest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestResult {
    pub clusters: ClusterSet,
    pub suggestion: String,
    pub savings: SavingsEstimate,
    pub summary: String,
    pub embedding_strategy: EmbeddingStrategy,
    pub suggestion_source: SuggestionSource,
    pub insights: Vec<ClusterInsight>,
}

impl DigestResult {
    /// True when either remote stage fell back to its local variant.
    pub fn is_degraded(&self) -> bool {
        self.embedding_strategy.is_degraded() || self.suggestion_source.is_degraded()
    }
}

/// One hit from a similarity lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarTicket {
    pub index: usize,
    pub ticket: String,
    pub score: f32,
}
