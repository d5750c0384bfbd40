//! # ShadowOps Embeddings
//!
//! Embedding backends for support-ticket clustering.
//!
//! Two interchangeable strategies sit behind the [`Embedder`] trait:
//! - [`TfIdfEmbedder`]: local lexical vectors fitted per batch, always available
//! - `ApiEmbedder`: remote semantic embeddings (OpenAI-compatible)
//!
//! ## Features
//!
//! - `api`: API-based embeddings via `reqwest`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shadowops_embeddings::{Embedder, TfIdfEmbedder};
//!
//! let embedder = TfIdfEmbedder::new();
//! let vectors = embedder.embed_batch(&["VPN not connecting", "VPN drops"]).await?;
//! ```

mod embedder;
mod mock;
mod normalize;
mod tfidf;
pub mod text;

pub use embedder::{check_batch, Embedder, EmbeddingError, EmbeddingResult, EmbeddingStrategy};
pub use mock::MockEmbedder;
pub use normalize::{cosine_similarity, l2_norm, normalize_l2, squared_euclidean};
pub use tfidf::{TfIdfEmbedder, DEFAULT_MAX_FEATURES};

#[cfg(feature = "api")]
mod api;
#[cfg(feature = "api")]
pub use api::{ApiConfig, ApiEmbedder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{cosine_similarity, normalize_l2};
    pub use crate::{Embedder, EmbeddingError, EmbeddingResult, EmbeddingStrategy};
    pub use crate::{MockEmbedder, TfIdfEmbedder};

    #[cfg(feature = "api")]
    pub use crate::{ApiConfig, ApiEmbedder};
}
