//! Deterministic cluster naming from member ticket text.

use crate::types::TicketBatch;
use shadowops_embeddings::text::tokens;
use std::collections::{HashMap, HashSet};

/// Longest label produced.
pub const MAX_LABEL_LEN: usize = 50;

/// Names clusters after their most shared meaningful terms.
#[derive(Debug, Clone)]
pub struct ClusterLabeler {
    max_terms: usize,
}

impl Default for ClusterLabeler {
    fn default() -> Self {
        Self { max_terms: 3 }
    }
}

#[derive(Debug)]
struct TermStats<'a> {
    term: String,
    surface: &'a str,
    doc_freq: usize,
    count: usize,
    first_seen: usize,
}

impl ClusterLabeler {
    pub fn new(max_terms: usize) -> Self {
        Self {
            max_terms: max_terms.max(1),
        }
    }

    /// Label every group (rank order), keeping labels unique.
    pub fn label_all(&self, batch: &TicketBatch, groups: &[Vec<usize>]) -> Vec<String> {
        let mut used = HashSet::new();
        groups
            .iter()
            .enumerate()
            .map(|(pos, group)| {
                let texts: Vec<&str> = group.iter().filter_map(|&i| batch.get(i)).collect();
                let label = self.label(&texts, pos + 1);
                disambiguate(label, &mut used)
            })
            .collect()
    }

    /// Label one cluster. `rank` is 1-based and only used by the generic label.
    pub fn label(&self, texts: &[&str], rank: usize) -> String {
        let ranked = rank_terms(texts);
        let generic = || format!("Issue Group {rank}");

        let Some(top) = ranked.first() else {
            return generic();
        };

        let chosen: Vec<&TermStats> = if texts.len() <= 1 {
            ranked.iter().take(self.max_terms).collect()
        } else if top.doc_freq < 2 {
            // Nothing shared between members.
            return generic();
        } else {
            ranked
                .iter()
                .take_while(|t| t.doc_freq == top.doc_freq)
                .take(self.max_terms)
                .collect()
        };

        let mut words: Vec<String> = chosen.iter().map(|t| display_word(t)).collect();
        if words.len() == 1 {
            words.push("Issues".to_string());
        }
        fit_words(words)
    }
}

fn rank_terms<'a>(texts: &[&'a str]) -> Vec<TermStats<'a>> {
    let mut stats: Vec<TermStats<'a>> = Vec::new();
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut position = 0;

    for &text in texts {
        let mut in_doc = HashSet::new();
        for token in tokens(text) {
            let idx = match slot.get(&token.term) {
                Some(&idx) => idx,
                None => {
                    slot.insert(token.term.clone(), stats.len());
                    stats.push(TermStats {
                        term: token.term.clone(),
                        surface: token.surface,
                        doc_freq: 0,
                        count: 0,
                        first_seen: position,
                    });
                    stats.len() - 1
                }
            };
            position += 1;
            stats[idx].count += 1;
            if in_doc.insert(idx) {
                stats[idx].doc_freq += 1;
            }
        }
    }

    stats.sort_by(|a, b| {
        b.doc_freq
            .cmp(&a.doc_freq)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.first_seen.cmp(&b.first_seen))
    });
    stats
}

/// Acronyms keep their casing; other words are capitalised.
fn display_word(stats: &TermStats) -> String {
    let letters: Vec<char> = stats.surface.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase()) {
        return stats.surface.to_string();
    }

    let mut chars = stats.term.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join words, dropping trailing ones until the label fits. A label keeps
/// at least two words; when two are still too long the second is cut.
fn fit_words(mut words: Vec<String>) -> String {
    while words.len() > 2 && words.join(" ").chars().count() > MAX_LABEL_LEN {
        words.pop();
    }
    let label = words.join(" ");
    if label.chars().count() <= MAX_LABEL_LEN {
        return label;
    }
    if words.len() < 2 {
        return label.chars().take(MAX_LABEL_LEN).collect();
    }

    // Leave room for a space and at least one character of the second word.
    let first: String = words[0].chars().take(MAX_LABEL_LEN - 2).collect();
    let room = MAX_LABEL_LEN - first.chars().count() - 1;
    let second: String = words[1].chars().take(room).collect();
    format!("{first} {second}")
}

fn disambiguate(label: String, used: &mut HashSet<String>) -> String {
    let mut candidate = label.clone();
    let mut n = 2;
    while used.contains(&candidate) {
        candidate = format!("{label} {n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(texts: &[&str]) -> String {
        ClusterLabeler::default().label(texts, 1)
    }

    #[test]
    fn test_shared_term_gets_issues_suffix() {
        assert_eq!(label(&["VPN not connecting", "VPN drops constantly"]), "VPN Issues");
    }

    #[test]
    fn test_tied_terms_form_phrase() {
        assert_eq!(
            label(&["Password reset needed", "need password reset asap"]),
            "Password Reset"
        );
    }

    #[test]
    fn test_singleton_uses_leading_terms() {
        assert_eq!(label(&["Printer offline"]), "Printer Offline");
        assert_eq!(label(&["Outlook!!"]), "Outlook Issues");
        assert_eq!(
            label(&["Shared drive permission denied for finance"]),
            "Shared Drive Permission"
        );
    }

    #[test]
    fn test_generic_when_nothing_meaningful() {
        let labeler = ClusterLabeler::default();
        assert_eq!(labeler.label(&["it is not on", "why is it"], 3), "Issue Group 3");
        assert_eq!(
            labeler.label(&["Printer offline", "Password reset"], 2),
            "Issue Group 2"
        );
    }

    #[test]
    fn test_label_is_deterministic_and_order_stable() {
        let texts = ["email bounce", "email quota", "email bounce again"];
        assert_eq!(label(&texts), label(&texts));
        assert_eq!(label(&texts), "Email Issues");
    }

    #[test]
    fn test_long_labels_are_capped() {
        let long = "supercalifragilisticexpialidocious antidisestablishmentarianism pneumonoultramicroscopic";
        let got = label(&[long]);
        assert!(got.chars().count() <= MAX_LABEL_LEN);
        assert_eq!(got, "Supercalifragilisticexpialidocious Antidisestablis");
    }

    #[test]
    fn test_fit_words_keeps_two_words() {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();

        let got = fit_words(words(&["Authentication", "Synchronization", "Provisioning", "Reconfiguration"]));
        assert_eq!(got, "Authentication Synchronization Provisioning");

        let giant = "x".repeat(60);
        let got = fit_words(words(&[giant.as_str(), "Printer"]));
        assert_eq!(got.chars().count(), MAX_LABEL_LEN);
        assert_eq!(got.split(' ').count(), 2);
        assert!(got.ends_with(" P"));
    }

    #[test]
    fn test_duplicate_labels_are_suffixed() {
        let batch = TicketBatch::new(vec![
            "VPN down".to_string(),
            "VPN slow".to_string(),
            "VPN timeout".to_string(),
            "VPN error".to_string(),
        ])
        .unwrap();
        let labels = ClusterLabeler::default().label_all(&batch, &[vec![0, 1], vec![2, 3]]);
        assert_eq!(labels, vec!["VPN Issues", "VPN Issues 2"]);
    }
}
