//! Lexical comparison of dialogue lines.
//!
//! The matcher decides whether a spoken line activates an authored trigger
//! phrase. Comparison is case-insensitive and token-based: an exact match is
//! raw equality of the case-folded strings, and a fuzzy match is a crude
//! bag-of-words overlap between the two lines. Pure functions, no state.

use std::collections::HashSet;

/// Minimum number of distinct shared tokens for a fuzzy match.
pub const FUZZY_SHARED_TOKEN_THRESHOLD: usize = 4;

/// Result of comparing a trigger phrase against the last spoken line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The phrases are identical after case-folding.
    Exact,
    /// Not identical, but at least [`FUZZY_SHARED_TOKEN_THRESHOLD`] distinct
    /// trigger tokens appear in the last line. Carries the shared count.
    Fuzzy(usize),
    /// No meaningful overlap.
    None,
}

impl MatchKind {
    /// Whether this is any kind of match at all.
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchKind::None)
    }
}

/// Compare a trigger phrase against the most recently spoken line.
///
/// Tokens are runs of non-whitespace; case is folded on both sides. An exact
/// match requires the folded strings to be equal, so internal whitespace
/// structure is significant. A fuzzy match counts each distinct trigger
/// token once, no matter how often it repeats in either phrase, and is not
/// order-sensitive.
pub fn matches(trigger_phrase: &str, last_line: &str) -> MatchKind {
    let trigger = trigger_phrase.to_lowercase();
    let last = last_line.to_lowercase();

    if trigger == last {
        return MatchKind::Exact;
    }

    let last_tokens: HashSet<&str> = last.split_whitespace().collect();
    let trigger_tokens: HashSet<&str> = trigger.split_whitespace().collect();

    let shared = trigger_tokens
        .iter()
        .filter(|t| last_tokens.contains(*t))
        .count();

    if shared >= FUZZY_SHARED_TOKEN_THRESHOLD {
        MatchKind::Fuzzy(shared)
    } else {
        MatchKind::None
    }
}
