//! Core LLM backend trait.

use crate::prompt::PromptTemplate;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// LLM-related errors.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Context too long")]
    ContextTooLong,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Timeout after {0} seconds")]
    Timeout(u32),
}

impl LlmError {
    /// Whether retrying the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            LlmError::ConnectionFailed(_) | LlmError::RateLimited(_) | LlmError::Timeout(_)
        )
    }
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Configuration for LLM requests.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/identifier.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_tokens: 100,
            temperature: 0.3,
            timeout_secs: 10,
        }
    }
}

impl LlmConfig {
    /// Create config for OpenAI.
    pub fn openai() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            ..Self::default()
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Core trait for text-generation backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend name.
    fn name(&self) -> &str;

    /// Get the current configuration.
    fn config(&self) -> &LlmConfig;

    /// Generate a completion for a prompt with an optional system message.
    async fn complete(&self, prompt: &str, system: Option<&str>) -> LlmResult<String>;

    /// Render a template and complete it.
    async fn generate(&self, template: &(dyn PromptTemplate + Sync)) -> LlmResult<String> {
        let system = template.system_prompt();
        self.complete(&template.generate(), system.as_deref()).await
    }

    /// Check if the backend is available.
    async fn health_check(&self) -> LlmResult<bool> {
        match self.complete("ping", None).await {
            Ok(_) => Ok(true),
            Err(LlmError::ConnectionFailed(_)) | Err(LlmError::AuthenticationFailed) => Ok(false),
            Err(_) => Ok(true),
        }
    }
}

/// A mock backend for testing.
pub struct MockBackend {
    config: LlmConfig,
    responses: Vec<(String, String)>,
    default_response: String,
    transient_failures: AtomicUsize,
    failure: Option<fn() -> LlmError>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self {
            config: LlmConfig::default(),
            responses: Vec::new(),
            default_response: "Mock response".to_string(),
            transient_failures: AtomicUsize::new(0),
            failure: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Add a canned response for prompts containing `pattern`.
    pub fn with_response(mut self, pattern: &str, response: &str) -> Self {
        self.responses.push((pattern.to_string(), response.to_string()));
        self
    }

    /// Response used when no pattern matches.
    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Rate-limit the first `n` calls.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every call with the error produced by `make`.
    pub fn failing_with(mut self, make: fn() -> LlmError) -> Self {
        self.failure = Some(make);
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent prompt received.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn complete(&self, prompt: &str, _system: Option<&str>) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        if let Some(make) = self.failure {
            return Err(make());
        }

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(LlmError::RateLimited(1));
        }

        for (pattern, response) in &self.responses {
            if prompt.contains(pattern.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.clone())
    }
}
