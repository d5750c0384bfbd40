//! Tokenization shared by the local embedder and the cluster labeler.

use std::collections::HashSet;
use std::sync::OnceLock;

/// English function words plus support-desk filler that never names a root cause.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "cant", "could", "did", "do", "does", "doing", "don", "dont",
    "down", "during", "each", "even", "ever", "every", "few", "for", "from", "further", "get",
    "gets", "getting", "got", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "im", "in", "into", "is", "isn", "isnt", "it", "its",
    "itself", "just", "keep", "keeps", "me", "might", "more", "most", "much", "must", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "out", "over", "own", "same", "she", "should", "so", "some", "still", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "us", "very", "was", "wasn", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "won",
    "would", "you", "your", "yours",
    // support-desk filler
    "anyone", "help", "issue", "issues", "please", "problem", "problems", "someone", "thanks",
    "ticket", "tickets", "user", "users",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Whether a lowercase term carries no topical meaning.
pub fn is_stopword(term: &str) -> bool {
    stopwords().contains(term)
}

/// A meaningful token with the exact text it was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Lowercased term.
    pub term: String,
    /// Original slice of the input.
    pub surface: &'a str,
}

/// Split text into meaningful tokens, keeping the original casing alongside.
///
/// Splits on non-alphanumeric characters, drops tokens shorter than two
/// characters and stopwords.
pub fn tokens(text: &str) -> Vec<Token<'_>> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() >= 2)
        .filter_map(|surface| {
            let term = surface.to_lowercase();
            if is_stopword(&term) {
                None
            } else {
                Some(Token { term, surface })
            }
        })
        .collect()
}

/// Lowercased meaningful terms of a text.
pub fn tokenize(text: &str) -> Vec<String> {
    tokens(text).into_iter().map(|t| t.term).collect()
}
