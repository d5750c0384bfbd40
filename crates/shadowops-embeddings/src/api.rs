//! API-based embeddings (OpenAI and OpenAI-compatible endpoints).
//!
//! Requires the `api` feature.

use crate::{Embedder, EmbeddingError, EmbeddingResult, EmbeddingStrategy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Configuration for API-based embeddings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API key.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// API endpoint (optional, defaults to OpenAI).
    pub endpoint: Option<String>,
    /// Requested embedding dimension (for models that support it).
    pub dimensions: Option<usize>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Create config for OpenAI embeddings.
    pub fn openai(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: "text-embedding-3-small".to_string(),
            endpoint: None,
            dimensions: None,
            timeout_secs: 10,
        }
    }

    /// Create config for an OpenAI-compatible endpoint.
    pub fn custom(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: Some(endpoint.to_string()),
            dimensions: None,
            timeout_secs: 10,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set dimensions (for models that support dimension reduction).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Seconds to wait when a 429 carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER: u32 = 60;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Embeds a whole batch in one request.
///
/// ```rust,ignore
/// use shadowops_embeddings::{ApiEmbedder, ApiConfig, Embedder};
///
/// let embedder = ApiEmbedder::new(ApiConfig::openai("sk-..."))?;
/// let vectors = embedder.embed_batch(&["VPN not connecting"]).await?;
/// ```
pub struct ApiEmbedder {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiEmbedder {
    pub fn new(config: ApiConfig) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ApiError(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(OPENAI_EMBEDDINGS_URL)
    }

    fn transport_error(&self, e: reqwest::Error) -> EmbeddingError {
        if e.is_timeout() {
            EmbeddingError::Timeout(self.config.timeout_secs)
        } else if e.is_connect() || e.is_request() {
            EmbeddingError::ConnectionFailed(e.to_string())
        } else {
            EmbeddingError::ApiError(e.to_string())
        }
    }
}

fn status_error(status: u16, retry_after: Option<u32>, body: &str) -> EmbeddingError {
    match status {
        401 | 403 => EmbeddingError::AuthenticationFailed,
        429 => EmbeddingError::RateLimited(retry_after.unwrap_or(DEFAULT_RETRY_AFTER)),
        500..=599 => EmbeddingError::ConnectionFailed(format!("server returned {status}")),
        _ => EmbeddingError::ApiError(format!("{status}: {body}")),
    }
}

/// Vectors in input order. Services may return entries out of order, so
/// indexed entries are placed by index; any gap or duplicate is malformed.
fn into_vectors(response: EmbeddingResponse, expected: usize) -> EmbeddingResult<Vec<Vec<f32>>> {
    if response.data.iter().any(|d| d.index.is_none()) {
        return Ok(response.data.into_iter().map(|d| d.embedding).collect());
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in response.data {
        let slot = item
            .index
            .and_then(|i| slots.get_mut(i))
            .ok_or_else(|| EmbeddingError::InvalidResponse("embedding index out of range".into()))?;
        if slot.replace(item.embedding).is_some() {
            return Err(EmbeddingError::InvalidResponse("duplicate embedding index".into()));
        }
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| EmbeddingError::InvalidResponse("missing embeddings in response".into()))
}

#[async_trait]
impl Embedder for ApiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), retry_after, &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
        into_vectors(parsed, texts.len())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn strategy(&self) -> EmbeddingStrategy {
        EmbeddingStrategy::Remote
    }
}
