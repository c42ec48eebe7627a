//! Per-agent record of recently spoken lines.
//!
//! Each agent remembers what it has said in the current conversation so the
//! same line is not picked again while fresh alternatives remain. When every
//! candidate has been used, the memory is dropped wholesale and the agent is
//! allowed to repeat itself rather than stall. That reset is a deliberate
//! trade of variety for availability.

use rand::seq::SliceRandom;
use rand::Rng;

/// Ordered, append-only record of lines an agent has spoken.
#[derive(Debug, Clone, Default)]
pub struct LineMemory {
    lines: Vec<String>,
}

impl LineMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Record a spoken line.
    pub fn record(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Whether the exact line has been spoken before.
    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }

    /// Drop all recorded history.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Number of recorded lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The recorded lines, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Pick a candidate line the agent has not said yet.
///
/// Chooses uniformly among the candidates absent from `memory`. If every
/// candidate has already been used, clears `memory` entirely and chooses
/// from the full set. Returns `None` only when `candidates` is empty. The
/// caller is responsible for recording the chosen line afterwards.
pub fn pick_unused<S: AsRef<str>>(candidates: &[S], memory: &mut LineMemory) -> Option<String> {
    pick_unused_with_rng(candidates, memory, &mut rand::thread_rng())
}

/// [`pick_unused`] with an explicit random source, for deterministic tests.
pub fn pick_unused_with_rng<S, R>(
    candidates: &[S],
    memory: &mut LineMemory,
    rng: &mut R,
) -> Option<String>
where
    S: AsRef<str>,
    R: Rng,
{
    if candidates.is_empty() {
        return None;
    }

    let unused: Vec<&S> = candidates
        .iter()
        .filter(|c| !memory.contains(c.as_ref()))
        .collect();

    if let Some(choice) = unused.choose(rng) {
        return Some(choice.as_ref().to_string());
    }

    // Every candidate has been said already: forget the history and allow
    // repeats instead of stalling the conversation.
    memory.clear();
    candidates.choose(rng).map(|c| c.as_ref().to_string())
}
