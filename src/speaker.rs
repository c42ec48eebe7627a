//! The speak capability seam and agent registration.
//!
//! Playback (text-to-speech, animation) lives outside this crate; the engine
//! only sees the [`Speaker`] trait. Registration happens once at startup
//! from an ordered list of slots, each optionally bound to a speaker.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the speak capability.
#[derive(Debug, Error)]
pub enum SpeakError {
    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    #[error("speech was cancelled")]
    Cancelled,
}

/// The playback capability one agent exposes to the engine.
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak a line aloud, resolving when playback completes or fails.
    async fn speak(&self, text: &str) -> Result<(), SpeakError>;

    /// Ask the agent to stop any speech in progress. Fire-and-forget.
    fn stop_speaking(&self);
}

/// One registration slot: an agent name optionally bound to a speaker.
pub struct AgentSlot {
    /// Agent name, matching the names used in the script.
    pub name: String,
    /// The bound playback capability. Unbound slots are skipped silently.
    pub speaker: Option<Arc<dyn Speaker>>,
}

impl AgentSlot {
    /// A slot bound to a speaker.
    pub fn bound(name: impl Into<String>, speaker: Arc<dyn Speaker>) -> Self {
        Self {
            name: name.into(),
            speaker: Some(speaker),
        }
    }

    /// An empty slot, skipped during registration.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            speaker: None,
        }
    }
}

/// Initial values a relationship score is drawn from.
const RELATIONSHIP_SEEDS: [i8; 3] = [-10, 0, 10];

/// The registered agents: rotation order, speaker bindings, and the
/// relationship-score matrix.
///
/// Relationship scores are assigned at registration between every ordered
/// pair of distinct agents. Nothing consults them yet; they are kept as a
/// latent extension point for future selection behavior.
pub struct Roster {
    names: Vec<String>,
    speakers: HashMap<String, Arc<dyn Speaker>>,
    relationships: HashMap<String, HashMap<String, i8>>,
}

impl Roster {
    /// Register agents from an ordered list of slots.
    pub fn register(slots: Vec<AgentSlot>) -> Self {
        Self::register_with_rng(slots, &mut rand::thread_rng())
    }

    /// [`Roster::register`] with an explicit random source, for
    /// deterministic tests.
    pub fn register_with_rng<R: Rng>(slots: Vec<AgentSlot>, rng: &mut R) -> Self {
        let mut names = Vec::new();
        let mut speakers: HashMap<String, Arc<dyn Speaker>> = HashMap::new();

        for slot in slots {
            let Some(speaker) = slot.speaker else {
                continue;
            };
            names.push(slot.name.clone());
            speakers.insert(slot.name, speaker);
        }

        let mut relationships: HashMap<String, HashMap<String, i8>> = HashMap::new();
        for from in &names {
            let mut scores = HashMap::new();
            for to in &names {
                if from != to {
                    let score = RELATIONSHIP_SEEDS.choose(rng).copied().unwrap_or(0);
                    scores.insert(to.clone(), score);
                }
            }
            relationships.insert(from.clone(), scores);
        }

        Self {
            names,
            speakers,
            relationships,
        }
    }

    /// Registered agent names in rotation order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no agents registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up the speaker bound to an agent name.
    pub fn speaker(&self, name: &str) -> Option<&Arc<dyn Speaker>> {
        self.speakers.get(name)
    }

    /// The relationship score from one agent toward another, if both are
    /// registered and distinct.
    pub fn relationship(&self, from: &str, to: &str) -> Option<i8> {
        self.relationships.get(from)?.get(to).copied()
    }

    /// Ask every registered agent to stop speaking.
    pub fn stop_all(&self) {
        for speaker in self.speakers.values() {
            speaker.stop_speaking();
        }
    }
}
