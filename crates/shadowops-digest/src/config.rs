//! Digest configuration.
//!
//! Every field has a default, so a partial TOML file (or none) is valid.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Key value shipped in sample environment files; treated as absent.
pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Remote embedding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Vocabulary cap for the local TF-IDF fallback.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

/// Remote text generation for suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Cosine similarity at or above which two tickets are linked.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Upper bound on k-means groups.
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ceiling for one whole digest.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_max_features() -> usize { shadowops_embeddings::DEFAULT_MAX_FEATURES }
fn default_generation_model() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 100 }
fn default_temperature() -> f32 { 0.3 }
fn default_similarity_threshold() -> f32 { 0.80 }
fn default_max_clusters() -> usize { 10 }
fn default_seed() -> u64 { 42 }
fn default_restarts() -> usize { 10 }
fn default_max_iterations() -> usize { 100 }
fn default_max_retries() -> u32 { 2 }
fn default_base_delay_ms() -> u64 { 250 }
fn default_max_delay_ms() -> u64 { 2000 }
fn default_backoff_multiplier() -> f64 { 2.0 }
fn default_attempt_timeout_secs() -> u64 { 4 }
fn default_timeout_secs() -> u64 { 30 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_embedding_model(),
            endpoint: None,
            dimensions: None,
            max_features: default_max_features(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_generation_model(),
            endpoint: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_clusters: default_max_clusters(),
            seed: default_seed(),
            restarts: default_restarts(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// The API key, unless missing, blank, or the placeholder.
    pub fn api_key(&self) -> Option<&str> {
        usable_key(self.api_key.as_deref())
    }
}

impl GenerationConfig {
    /// The API key, unless missing, blank, or the placeholder.
    pub fn api_key(&self) -> Option<&str> {
        usable_key(self.api_key.as_deref())
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DigestConfig {
    /// Fill both API keys from `key` where the config has none.
    pub fn with_fallback_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| usable_key(Some(k.as_str())).is_some()) {
            if self.embedding.api_key().is_none() {
                self.embedding.api_key = Some(key.clone());
            }
            if self.generation.api_key().is_none() {
                self.generation.api_key = Some(key);
            }
        }
        self
    }
}

fn usable_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty() && *k != PLACEHOLDER_API_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DigestConfig::default();
        assert_eq!(config.clustering.similarity_threshold, 0.80);
        assert_eq!(config.clustering.seed, 42);
        assert_eq!(config.pipeline.timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert!(config.embedding.api_key().is_none());
    }

    #[test]
    fn test_placeholder_and_blank_keys_are_absent() {
        let mut config = DigestConfig::default();
        config.embedding.api_key = Some(PLACEHOLDER_API_KEY.to_string());
        config.generation.api_key = Some("   ".to_string());
        assert!(config.embedding.api_key().is_none());
        assert!(config.generation.api_key().is_none());

        config.generation.api_key = Some(" sk-test ".to_string());
        assert_eq!(config.generation.api_key(), Some("sk-test"));
    }

    #[test]
    fn test_fallback_key_fills_only_missing() {
        let mut config = DigestConfig::default();
        config.generation.api_key = Some("sk-gen".to_string());

        let config = config.with_fallback_api_key(Some("sk-env".to_string()));
        assert_eq!(config.embedding.api_key(), Some("sk-env"));
        assert_eq!(config.generation.api_key(), Some("sk-gen"));

        let untouched = DigestConfig::default()
            .with_fallback_api_key(Some(PLACEHOLDER_API_KEY.to_string()));
        assert!(untouched.embedding.api_key.is_none());
    }

    #[test]
    fn test_default_retry_budget_leaves_room_for_fallback() {
        let config = DigestConfig::default();
        let policy = config.retry.policy();
        assert_eq!(policy, RetryPolicy::default());
        // Embedding and suggestion may both exhaust their retries.
        assert!(policy.worst_case() * 2 < config.pipeline.timeout());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DigestConfig =
            serde_json::from_str(r#"{"clustering": {"similarity_threshold": 0.7}}"#).unwrap();
        assert_eq!(config.clustering.similarity_threshold, 0.7);
        assert_eq!(config.clustering.max_clusters, 10);
        assert_eq!(config.retry.max_retries, 2);
    }
}
