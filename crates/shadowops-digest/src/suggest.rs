//! Improvement suggestion for the top-ranked cluster.

use crate::deadline::Deadline;
use crate::error::{DigestError, Result};
use crate::retry::RetryPolicy;
use crate::types::{Cluster, ClusterSet, SuggestionSource, TicketBatch};
use shadowops_embeddings::text::tokenize;
use shadowops_llm::{LlmBackend, LlmError, SuggestionPrompt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accepted suggestion length, in characters.
pub const MIN_SUGGESTION_LEN: usize = 10;
pub const MAX_SUGGESTION_LEN: usize = 200;

const DEFAULT_ACTION: &str = "Create a self-service guide";

/// Keyword groups and the action proposed when a cluster matches them.
const ACTIONS: &[(&[&str], &str)] = &[
    (
        &["network", "vpn", "connection", "internet", "wifi"],
        "Create a network troubleshooting self-service guide",
    ),
    (
        &["password", "login", "access", "account", "authentication"],
        "Implement automated password reset with multi-factor setup",
    ),
    (
        &["email", "outlook", "mail", "exchange"],
        "Develop an email configuration wizard",
    ),
    (
        &["printer", "monitor", "keyboard", "mouse", "hardware"],
        "Establish a hardware replacement workflow",
    ),
    (
        &["software", "application", "program", "install"],
        "Automate software deployment and troubleshooting",
    ),
    (
        &["phone", "voip", "call", "telephone"],
        "Create a VoIP troubleshooting guide",
    ),
    (
        &["security", "virus", "malware", "firewall"],
        "Develop security awareness training",
    ),
    (
        &["file", "folder", "share", "drive", "permission"],
        "Create a self-service file access request workflow",
    ),
];

const ACTION_WORDS: &[&str] = &[
    "create", "implement", "develop", "establish", "build", "design", "improve", "enhance",
    "optimize", "streamline", "automate", "provide", "offer", "add", "include", "integrate",
    "train", "educate", "document", "standardize",
];

/// A suggestion and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub source: SuggestionSource,
}

/// Produces one suggestion per digest, remote first, template otherwise.
pub struct SuggestionGenerator {
    remote: Option<Arc<dyn LlmBackend>>,
    retry: RetryPolicy,
}

impl Default for SuggestionGenerator {
    fn default() -> Self {
        Self::template_only()
    }
}

impl SuggestionGenerator {
    pub fn template_only() -> Self {
        Self {
            remote: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn LlmBackend>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Suggest an improvement targeting the largest cluster.
    ///
    /// Remote failures of any kind, including running past `budget`, fall
    /// back to the template silently.
    pub async fn suggest(&self, batch: &TicketBatch, clusters: &ClusterSet, budget: &Deadline) -> Result<Suggestion> {
        let primary = clusters
            .largest()
            .ok_or_else(|| DigestError::structural("no clusters to suggest for"))?;

        if let Some(remote) = &self.remote {
            match self.suggest_remote(remote.as_ref(), batch, clusters, primary, budget).await {
                Ok(text) => {
                    info!(backend = remote.name(), cluster = %primary.label, "generated remote suggestion");
                    return Ok(Suggestion {
                        text,
                        source: SuggestionSource::Remote,
                    });
                }
                Err(e) => warn!(error = %e, "remote suggestion failed, using template"),
            }
        } else {
            debug!("no text-generation backend configured");
        }

        Ok(Suggestion {
            text: template_suggestion(batch, primary),
            source: SuggestionSource::Template,
        })
    }

    async fn suggest_remote(
        &self,
        remote: &dyn LlmBackend,
        batch: &TicketBatch,
        clusters: &ClusterSet,
        primary: &Cluster,
        budget: &Deadline,
    ) -> Result<String, LlmError> {
        let prompt = SuggestionPrompt::new(batch.len(), primary.label.clone(), primary.size())
            .with_examples(primary.indices.iter().filter_map(|&i| batch.get(i)))
            .with_categories(clusters.iter().map(|c| (c.label.clone(), c.size())).collect());

        let raw = self
            .retry
            .run("suggestion", budget, || remote.generate(&prompt))
            .await?;

        clean_suggestion(&raw)
            .ok_or_else(|| LlmError::InvalidResponse(format!("unusable suggestion: {raw:?}")))
    }
}

/// `<action> for <label>; affects <N> tickets`, with the action picked by keyword.
pub fn template_suggestion(batch: &TicketBatch, cluster: &Cluster) -> String {
    let mut terms: HashSet<String> = tokenize(&cluster.label).into_iter().collect();
    for &i in &cluster.indices {
        if let Some(text) = batch.get(i) {
            terms.extend(tokenize(text));
        }
    }

    let mut action = DEFAULT_ACTION;
    let mut best = 0;
    for (keywords, candidate) in ACTIONS {
        let score = keywords.iter().filter(|k| terms.contains(**k)).count();
        if score > best {
            best = score;
            action = *candidate;
        }
    }

    let size = cluster.size();
    let noun = if size == 1 { "ticket" } else { "tickets" };
    format!("{action} for {}; affects {size} {noun}", cluster.label)
}

/// Normalise a generated suggestion. `None` when it is too short to use.
pub fn clean_suggestion(raw: &str) -> Option<String> {
    const QUOTES: &[char] = &['"', '\'', '\u{201c}', '\u{201d}'];

    let mut text = raw.trim();
    text = text.strip_prefix(QUOTES).unwrap_or(text);
    text = text.strip_suffix(QUOTES).unwrap_or(text);
    text = text.trim();
    if let Some(head) = text.get(..11) {
        if head.eq_ignore_ascii_case("suggestion:") {
            text = text[11..].trim_start();
        }
    }
    let text = text.trim_end_matches('.').trim_end();

    if text.chars().count() < MIN_SUGGESTION_LEN {
        return None;
    }

    let text = if is_actionable(text) {
        capitalize(text)
    } else {
        format!("Implement {}", lowercase_first(text))
    };

    if text.chars().count() > MAX_SUGGESTION_LEN {
        let cut: String = text.chars().take(MAX_SUGGESTION_LEN - 3).collect();
        Some(format!("{}...", cut.trim_end()))
    } else {
        Some(text)
    }
}

fn is_actionable(text: &str) -> bool {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    words.iter().any(|w| ACTION_WORDS.contains(&w.as_str()))
        || words.windows(2).any(|p| p[0] == "set" && p[1] == "up")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first word unless it looks like an acronym.
fn lowercase_first(text: &str) -> String {
    let first_word = text.split_whitespace().next().unwrap_or("");
    let acronym = first_word.chars().filter(|c| c.is_alphabetic()).count() >= 2
        && first_word
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase);
    if acronym {
        return text.to_string();
    }

    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
