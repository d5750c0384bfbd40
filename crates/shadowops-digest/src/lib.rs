//! # ShadowOps Digest
//!
//! Groups a batch of support-ticket descriptions by likely root cause,
//! proposes one improvement for the largest group and estimates what it
//! would save.
//!
//! Pipeline: tickets → [`EmbeddingProvider`] → [`Clusterer`] →
//! [`ClusterLabeler`] → [`SuggestionGenerator`] and [`cost::estimate`] →
//! [`summary::compose`] → [`DigestResult`].
//!
//! Both remote stages (embeddings, suggestion text) fall back to local
//! variants on failure, so a digest only fails on invalid input, a broken
//! invariant, or the overall timeout.
//!
//! ## Features
//!
//! - `api`: OpenAI-compatible remote embedding and text-generation providers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shadowops_digest::{DigestConfig, DigestParams, Digester, TicketBatch};
//!
//! let digester = Digester::from_config(&DigestConfig::default());
//! let batch = TicketBatch::new(tickets)?;
//! let digest = digester.produce_digest(&batch, &DigestParams::new(30.0, 40.0)?).await?;
//! println!("{}", digest.summary);
//! ```

pub mod cluster;
pub mod config;
pub mod cost;
mod deadline;
mod error;
pub mod label;
mod pipeline;
pub mod provider;
pub mod retry;
pub mod suggest;
pub mod summary;
mod types;

pub use cluster::{Clusterer, KMeansConfig};
pub use config::DigestConfig;
pub use deadline::Deadline;
pub use error::{DigestError, Result};
pub use label::ClusterLabeler;
pub use pipeline::{Digester, DEFAULT_TIMEOUT, MIN_SIMILARITY};
pub use provider::{EmbeddedBatch, EmbeddingProvider};
pub use retry::{Retriable, RetryPolicy};
pub use suggest::{Suggestion, SuggestionGenerator};
pub use types::{
    Cluster, ClusterInsight, ClusterSet, DigestParams, DigestResult, SavingsEstimate,
    SimilarTicket, SuggestionSource, TicketBatch, MAX_TICKETS,
};

pub use shadowops_embeddings::EmbeddingStrategy;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{DigestConfig, DigestError, DigestParams, DigestResult, Digester, TicketBatch};
    pub use crate::{EmbeddingProvider, SuggestionGenerator};
}
