//! Group name suggestion heuristic
//!
//! Pure function over the member tabs: tokenize titles (hostname fallback
//! for blank titles), drop stopwords, score tokens by how many tabs they
//! appear in, boost adjacent pairs that recur, and title-case the winner.
//! Ties break lexically so the result is deterministic.

use std::collections::{HashMap, HashSet};
use tab_warden_core::TabSnapshot;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it", "la",
    "new", "of", "on", "or", "page", "tab", "that", "the", "this", "to", "untitled", "was", "what",
    "when", "where", "which", "with", "www", "you", "your",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .filter(|t| !t.bytes().all(|b| b.is_ascii_digit()))
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// The registrable-ish label of a URL's host: `https://docs.rs/x` -> `docs`.
fn hostname_label(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1)?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.split('@').last()?.split(':').next()?;
    let label = host
        .split('.')
        .find(|label| !label.is_empty() && *label != "www")?;
    let label = label.to_lowercase();
    (label.len() >= 2 && !is_stopword(&label)).then_some(label)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Suggest a 1-2 word name for a group of tabs, or `None` when the tabs
/// offer nothing usable.
pub fn suggest_group_name(tabs: &[TabSnapshot]) -> Option<String> {
    if tabs.is_empty() {
        return None;
    }

    // Document frequency per token and per adjacent pair.
    let mut token_docs: HashMap<String, usize> = HashMap::new();
    let mut bigram_docs: HashMap<(String, String), usize> = HashMap::new();

    for tab in tabs {
        let mut tokens = tokenize(&tab.title);
        if tokens.is_empty() {
            if let Some(label) = hostname_label(&tab.url) {
                tokens.push(label);
            }
        }

        let unique: HashSet<&String> = tokens.iter().collect();
        for token in unique {
            *token_docs.entry(token.clone()).or_insert(0) += 1;
        }

        let mut seen_pairs = HashSet::new();
        for pair in tokens.windows(2) {
            let key = (pair[0].clone(), pair[1].clone());
            if seen_pairs.insert(key.clone()) {
                *bigram_docs.entry(key).or_insert(0) += 1;
            }
        }
    }

    let best_token = token_docs
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(token, count)| (token.clone(), *count))?;

    // A pair that recurs across tabs beats a lone word of the same reach.
    let best_bigram = bigram_docs
        .iter()
        .filter(|(_, count)| **count >= 2)
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(pair, count)| (pair.clone(), *count));

    if let Some(((first, second), count)) = best_bigram {
        if count >= best_token.1 {
            return Some(format!("{} {}", title_case(&first), title_case(&second)));
        }
    }

    Some(title_case(&best_token.0))
}
