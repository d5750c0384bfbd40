//! # ShadowOps LLM
//!
//! Text-generation backends used to phrase improvement suggestions.
//!
//! ## Features
//!
//! - `api`: OpenAI chat-completions backend
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shadowops_llm::{LlmBackend, OpenAiBackend, SuggestionPrompt};
//!
//! let backend = OpenAiBackend::new("sk-...")?;
//! let prompt = SuggestionPrompt::new(4, "VPN Connection Issues", 2);
//! let suggestion = backend.generate(&prompt).await?;
//! ```

mod backend;
mod prompt;

pub use backend::{LlmBackend, LlmConfig, LlmError, LlmResult, MockBackend};
pub use prompt::{PromptTemplate, SuggestionPrompt, MAX_EXAMPLES};

#[cfg(feature = "api")]
mod openai;
#[cfg(feature = "api")]
pub use openai::OpenAiBackend;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{LlmBackend, LlmConfig, LlmError, LlmResult};
    pub use crate::{PromptTemplate, SuggestionPrompt};

    #[cfg(feature = "api")]
    pub use crate::OpenAiBackend;
}
