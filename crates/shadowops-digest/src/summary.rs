//! Narrative summary of a digest.

use crate::error::{DigestError, Result};
use crate::types::{ClusterSet, SavingsEstimate};

/// Characters of the suggestion quoted in the summary.
pub const SUGGESTION_PREVIEW_LEN: usize = 60;

/// Summaries are kept between these character counts.
pub const MIN_SUMMARY_LEN: usize = 50;
pub const MAX_SUMMARY_LEN: usize = 300;

/// Summary template, chosen by batch shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStyle {
    Concise,
    Standard,
    Detailed,
}

impl SummaryStyle {
    pub fn for_shape(ticket_count: usize, cluster_count: usize) -> Self {
        if ticket_count > 20 && cluster_count > 5 {
            SummaryStyle::Detailed
        } else if ticket_count <= 5 || cluster_count <= 2 {
            SummaryStyle::Concise
        } else {
            SummaryStyle::Standard
        }
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// End `text` with a period unless it already ends a sentence.
fn end_sentence(text: &str) -> String {
    if text.ends_with(['.', '!', '?']) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

/// Compose the digest narrative, between [`MIN_SUMMARY_LEN`] and
/// [`MAX_SUMMARY_LEN`] characters.
///
/// Fails only on an empty cluster set, which the pipeline never produces.
pub fn compose(clusters: &ClusterSet, suggestion: &str, savings: &SavingsEstimate) -> Result<String> {
    let primary = clusters
        .largest()
        .ok_or_else(|| DigestError::structural("cannot summarise an empty cluster set"))?;

    let tickets = clusters.total_tickets();
    let count = clusters.len();
    let category = plural(count, "category", "categories");
    let ticket_word = plural(tickets, "ticket", "tickets");
    let label = &primary.label;
    let size = primary.size();
    let pct = share(size, tickets);
    let short = end_sentence(&shorten(suggestion, SUGGESTION_PREVIEW_LEN));
    let hours = savings.wasted_hours;
    let dollars = savings.saved_dollars;

    let text = match SummaryStyle::for_shape(tickets, count) {
        SummaryStyle::Concise => format!(
            "{tickets} {ticket_word} → {count} {category}. \
             Top issue: {label} ({size}, {pct:.1}%). \
             Suggested improvement: {short} \
             Saves: {hours:.1}h, ${dollars:.2}."
        ),
        SummaryStyle::Standard => format!(
            "{tickets} {ticket_word} clustered into {count} {category}. \
             Primary issue: {label} ({size} {}, {pct:.1}%). \
             Recommendation: {short} \
             Potential savings: {hours:.1} hours, ${dollars:.2}.",
            plural(size, "ticket", "tickets")
        ),
        SummaryStyle::Detailed => format!(
            "{tickets} support {ticket_word} analyzed and grouped into {count} distinct {category}. \
             The largest category '{label}' contains {size} {} ({pct:.1}%). \
             Suggested improvement: {short} \
             Expected time savings: {hours:.1}h, cost impact: ${dollars:.2}.",
            plural(size, "ticket", "tickets")
        ),
    };
    Ok(fit_length(text, tickets))
}

/// Pad a too-short summary or cut a too-long one at a sentence boundary.
fn fit_length(summary: String, tickets: usize) -> String {
    let len = summary.chars().count();
    if len < MIN_SUMMARY_LEN {
        let padded = format!(
            "{summary} Based on {tickets} analyzed {}.",
            plural(tickets, "ticket", "tickets")
        );
        if padded.chars().count() >= MIN_SUMMARY_LEN {
            return padded;
        }
        return format!("{padded} Review the top category first.");
    }
    if len > MAX_SUMMARY_LEN {
        return truncate_sentences(&summary, MAX_SUMMARY_LEN);
    }
    summary
}

/// Sentences of `text`, each with its terminator. A terminator only ends a
/// sentence when followed by whitespace, so "41.7%" and "$40.00" stay whole.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let at_break = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_break {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

/// Keep whole sentences up to `max_len` characters; with none fitting, cut
/// on a word boundary.
fn truncate_sentences(text: &str, max_len: usize) -> String {
    let mut out = String::new();
    for sentence in sentences(text) {
        let extra = if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + extra + sentence.chars().count() > max_len {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(sentence);
    }
    if out.is_empty() {
        return shorten(text, max_len);
    }
    end_sentence(&out)
}

/// Shorten on a word boundary, appending "..." when cut.
pub fn shorten(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "process improvements".to_string();
    }
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let budget = max_len.saturating_sub(3);
    let mut out = String::new();
    for word in text.split_whitespace() {
        let extra = if out.is_empty() { 0 } else { 1 };
        if out.chars().count() + extra + word.chars().count() > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        out = text.chars().take(budget).collect();
    }
    out.push_str("...");
    out
}

/// Top three clusters with size and share, then a count of the rest.
pub fn cluster_overview(clusters: &ClusterSet) -> String {
    if clusters.is_empty() {
        return "No clusters identified".to_string();
    }

    let total = clusters.total_tickets();
    let mut parts: Vec<String> = clusters
        .iter()
        .take(3)
        .map(|c| {
            format!(
                "{} ({} {}, {:.1}%)",
                c.label,
                c.size(),
                plural(c.size(), "ticket", "tickets"),
                share(c.size(), total)
            )
        })
        .collect();

    let remaining = clusters.len().saturating_sub(3);
    if remaining > 0 {
        parts.push(format!(
            "and {remaining} other {}",
            plural(remaining, "category", "categories")
        ));
    }
    parts.join("; ")
}
