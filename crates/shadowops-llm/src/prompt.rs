//! Prompt templates for suggestion generation.

/// A prompt template for LLM requests.
pub trait PromptTemplate {
    /// Generate the prompt text.
    fn generate(&self) -> String;

    /// Get the system prompt (if any).
    fn system_prompt(&self) -> Option<String> {
        None
    }
}

/// Number of primary-cluster tickets quoted in the prompt.
pub const MAX_EXAMPLES: usize = 5;

/// Prompt asking for one improvement suggestion for the top-ranked cluster.
#[derive(Debug, Clone)]
pub struct SuggestionPrompt {
    /// Total tickets in the batch.
    pub total_tickets: usize,
    /// Label of the top-ranked cluster.
    pub primary_label: String,
    /// Tickets in the top-ranked cluster.
    pub primary_size: usize,
    /// Example ticket texts from the top-ranked cluster.
    pub examples: Vec<String>,
    /// Every cluster as (label, size), in rank order.
    pub categories: Vec<(String, usize)>,
}

impl SuggestionPrompt {
    /// Create a prompt for the given primary cluster.
    pub fn new(total_tickets: usize, primary_label: impl Into<String>, primary_size: usize) -> Self {
        Self {
            total_tickets,
            primary_label: primary_label.into(),
            primary_size,
            examples: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Quote example tickets; at most [`MAX_EXAMPLES`] are kept.
    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples
            .into_iter()
            .take(MAX_EXAMPLES)
            .map(Into::into)
            .collect();
        self
    }

    /// List all categories.
    pub fn with_categories(mut self, categories: Vec<(String, usize)>) -> Self {
        self.categories = categories;
        self
    }

    fn share(&self) -> f64 {
        if self.total_tickets == 0 {
            0.0
        } else {
            self.primary_size as f64 / self.total_tickets as f64 * 100.0
        }
    }
}

impl PromptTemplate for SuggestionPrompt {
    fn system_prompt(&self) -> Option<String> {
        Some(
            "You are an IT operations expert analyzing support ticket patterns. \
             Respond with a single sentence and nothing else."
                .to_string(),
        )
    }

    fn generate(&self) -> String {
        let examples = self
            .examples
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n");

        let categories = self
            .categories
            .iter()
            .map(|(label, size)| format!("- {label}: {size} tickets"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Based on the ticket analysis below, provide ONE specific, actionable improvement suggestion that would reduce similar tickets in the future.

TICKET ANALYSIS:
- Total tickets analyzed: {total}
- Number of issue categories: {count}
- Primary issue category: {label} ({size} tickets, {share:.1}%)

PRIMARY ISSUE EXAMPLES:
{examples}

ALL CATEGORIES:
{categories}

REQUIREMENTS:
- Provide exactly ONE suggestion (not a list)
- Make it specific and actionable
- Focus on preventing the primary issue category
- Keep it between 10-200 characters
- Start with an action word like "Create", "Implement", "Develop", "Establish"

Suggestion:"#,
            total = self.total_tickets,
            count = self.categories.len(),
            label = self.primary_label,
            size = self.primary_size,
            share = self.share(),
        )
    }
}
