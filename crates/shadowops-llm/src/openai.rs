//! OpenAI chat-completions backend.
//!
//! Requires the `api` feature. Any endpoint speaking the same protocol works
//! via [`OpenAiBackend::with_endpoint`].

use crate::backend::{LlmBackend, LlmConfig, LlmError, LlmResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Seconds to wait when a 429 carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER: u32 = 60;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Chat-completions client.
///
/// ```rust,ignore
/// use shadowops_llm::{LlmBackend, OpenAiBackend};
///
/// let backend = OpenAiBackend::new("sk-...")?;
/// let text = backend.complete("Suggest one fix for VPN drops", None).await?;
/// ```
pub struct OpenAiBackend {
    api_key: String,
    config: LlmConfig,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str) -> LlmResult<Self> {
        Self::with_config(api_key, LlmConfig::openai())
    }

    /// The HTTP client enforces `config.timeout_secs` on every request.
    pub fn with_config(api_key: &str, config: LlmConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .build()
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            config,
            client,
            endpoint: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else if e.is_connect() {
            LlmError::ConnectionFailed(e.to_string())
        } else {
            LlmError::ApiError(e.to_string())
        }
    }
}

fn messages<'a>(prompt: &'a str, system: Option<&'a str>) -> Vec<ChatMessage<'a>> {
    system
        .map(|content| ChatMessage { role: "system", content })
        .into_iter()
        .chain(std::iter::once(ChatMessage { role: "user", content: prompt }))
        .collect()
}

/// Classify a non-success response so the caller knows whether to retry.
fn status_error(status: u16, retry_after: Option<u32>, body: &str, model: &str) -> LlmError {
    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        404 => LlmError::ModelNotFound(model.to_string()),
        429 => LlmError::RateLimited(retry_after.unwrap_or(DEFAULT_RETRY_AFTER)),
        400 if error_message(body).is_some_and(|m| m.contains("maximum context length")) => {
            LlmError::ContextTooLong
        }
        500.. => LlmError::ConnectionFailed(format!("server returned {status}")),
        _ => LlmError::ApiError(match error_message(body) {
            Some(message) => format!("{status}: {message}"),
            None => format!("{status}: {body}"),
        }),
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
}

fn first_content(response: ChatResponse) -> LlmResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("no content in response".to_string()))
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn complete(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: messages(prompt, system),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
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
            return Err(status_error(status.as_u16(), retry_after, &body, &self.config.model));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        first_content(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let backend = OpenAiBackend::new("test-key")
            .unwrap()
            .with_model("gpt-4o")
            .with_endpoint("http://localhost:8080/v1/chat/completions");
        assert_eq!(backend.config().model, "gpt-4o");
        assert_eq!(backend.name(), "openai");
        assert!(backend.endpoint.starts_with("http://localhost"));
    }

    #[test]
    fn test_system_message_comes_first() {
        let msgs = messages("fix it", Some("be brief"));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].content, "fix it");

        assert_eq!(messages("fix it", None).len(), 1);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(status_error(401, None, "", "m"), LlmError::AuthenticationFailed));
        assert!(matches!(status_error(429, Some(7), "", "m"), LlmError::RateLimited(7)));
        assert!(matches!(status_error(429, None, "", "m"), LlmError::RateLimited(60)));
        assert!(matches!(status_error(503, None, "", "m"), LlmError::ConnectionFailed(_)));
        assert!(matches!(status_error(404, None, "", "gpt-x"), LlmError::ModelNotFound(m) if m == "gpt-x"));

        let context = r#"{"error":{"message":"This model's maximum context length is 8192 tokens"}}"#;
        assert!(matches!(status_error(400, None, context, "m"), LlmError::ContextTooLong));

        let other = r#"{"error":{"message":"bad field"}}"#;
        match status_error(400, None, other, "m") {
            LlmError::ApiError(msg) => assert_eq!(msg, "400: bad field"),
            e => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn test_retriable_statuses() {
        assert!(status_error(429, None, "", "m").is_retriable());
        assert!(status_error(502, None, "", "m").is_retriable());
        assert!(!status_error(401, None, "", "m").is_retriable());
    }

    #[test]
    fn test_first_content_trims_and_rejects_empty() {
        let ok: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  Create a VPN guide \n"}}]}"#).unwrap();
        assert_eq!(first_content(ok).unwrap(), "Create a VPN guide");

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap();
        assert!(matches!(first_content(blank), Err(LlmError::InvalidResponse(_))));

        let none: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_content(none).is_err());
    }
}
