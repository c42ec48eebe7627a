//! Speaking-duration heuristic used to pace the turn timer.
//!
//! This is a proxy for real speech duration, not measured audio length: the
//! scheduler only needs a plausible delay before handing the floor to the
//! next speaker.

use std::time::Duration;

/// Estimated time to speak one word.
const MS_PER_WORD: u64 = 400;

/// Shortest delay any line is given.
const MIN_SPEAKING_MS: u64 = 1_000;

/// Longest delay any line is given.
const MAX_SPEAKING_MS: u64 = 6_000;

/// Estimate how long `text` takes to speak aloud.
///
/// Counts whitespace-separated words at 400ms each, clamped to the
/// 1s..=6s range.
pub fn estimate_speaking_duration(text: &str) -> Duration {
    let words = text.split_whitespace().count() as u64;
    Duration::from_millis((words * MS_PER_WORD).clamp(MIN_SPEAKING_MS, MAX_SPEAKING_MS))
}
