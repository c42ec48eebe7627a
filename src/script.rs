//! The static conversation script: agent profiles and trigger rules.
//!
//! The script is an immutable dataset supplied whole at startup. It carries
//! authoring metadata for each agent and an ordered list of triggers mapping
//! spoken phrases to candidate replies. Trigger order is semantically
//! significant: the first trigger that matches wins, for both exact and
//! fuzzy matches.

use crate::matcher::{self, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from loading or validating a script dataset.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("trigger {index} has no trigger phrases")]
    EmptyTriggerPhrases { index: usize },
}

/// Personality tag from the closed authoring vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Serious,
    Funny,
    Paranoid,
    Chill,
    Egotistical,
    Skeptical,
    Sarcastic,
    Gambler,
}

/// Authoring metadata for one agent.
///
/// The engine does not branch on any of these fields; they are part of the
/// dataset and round-trip through serialization unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent name, also the key used throughout the engine.
    pub name: String,
    /// Free-form backstory text.
    pub backstory: String,
    /// Topics this agent cares about.
    pub interests: Vec<String>,
    /// Personality tag.
    pub personality: Personality,
}

/// An authored rule mapping trigger phrases to per-responder replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    /// Restrict this rule to lines spoken by one named agent. Absent means
    /// the rule applies to any speaker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_filter: Option<String>,

    /// Phrases that activate the rule, in authoring order. Must be non-empty.
    pub says_any_of: Vec<String>,

    /// Responder name to candidate reply phrases. Entries naming agents that
    /// were never registered are simply unreachable.
    #[serde(default)]
    pub replies_from: BTreeMap<String, Vec<String>>,
}

/// The full conversation script: profiles plus the ordered trigger list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Agent profiles, authoring metadata only.
    #[serde(default)]
    pub profiles: Vec<AgentProfile>,

    /// Triggers in authoring order.
    pub triggers: Vec<Trigger>,
}

impl Script {
    /// Create a script from parts, validating the trigger list.
    pub fn new(profiles: Vec<AgentProfile>, triggers: Vec<Trigger>) -> Result<Self, ScriptError> {
        let script = Self { profiles, triggers };
        script.validate()?;
        Ok(script)
    }

    /// Parse a script from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Load a script from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Serialize the script to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ScriptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ScriptError> {
        for (index, trigger) in self.triggers.iter().enumerate() {
            if trigger.says_any_of.is_empty() {
                return Err(ScriptError::EmptyTriggerPhrases { index });
            }
        }
        Ok(())
    }

    /// Look up the profile for an agent by name.
    pub fn profile(&self, name: &str) -> Option<&AgentProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Number of triggers in the script.
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Find candidate replies for `responder` to the last spoken line.
    ///
    /// Triggers are scanned in authoring order and the first match wins.
    /// Within a single trigger an exact phrase match wins outright; failing
    /// that, the first fuzzy match resolves the scan. Only triggers whose
    /// speaker filter is absent or equal to `last_speaker`, and which define
    /// a reply list for `responder`, can win. A defined-but-empty list still
    /// wins the scan; selection then has nothing to pick and falls back to
    /// the standalone pool. Returns `None` when nothing matches.
    pub fn find_replies(
        &self,
        responder: &str,
        last_line: &str,
        last_speaker: &str,
    ) -> Option<&[String]> {
        for trigger in &self.triggers {
            if let Some(filter) = &trigger.speaker_filter {
                if filter != last_speaker {
                    continue;
                }
            }

            let Some(replies) = trigger.replies_from.get(responder) else {
                continue;
            };

            let mut fuzzy: Option<usize> = None;
            for phrase in &trigger.says_any_of {
                match matcher::matches(phrase, last_line) {
                    MatchKind::Exact => {
                        tracing::debug!(from = last_speaker, to = responder, "exact trigger match");
                        return Some(replies);
                    }
                    MatchKind::Fuzzy(shared) => {
                        fuzzy.get_or_insert(shared);
                    }
                    MatchKind::None => {}
                }
            }

            if let Some(shared) = fuzzy {
                tracing::debug!(
                    from = last_speaker,
                    to = responder,
                    shared,
                    "fuzzy trigger match"
                );
                return Some(replies);
            }
        }

        tracing::debug!(responder, "no trigger match, falling back to standalone lines");
        None
    }

    /// Standalone lines `speaker` may say when not replying to anything.
    ///
    /// Concatenates, in authoring order, the trigger phrases of every
    /// trigger whose speaker filter is absent or equal to `speaker`. Used
    /// for conversation openers and as the fallback when no reply applies.
    pub fn standalone_lines(&self, speaker: &str) -> Vec<&str> {
        let mut lines = Vec::new();
        for trigger in &self.triggers {
            if let Some(filter) = &trigger.speaker_filter {
                if filter != speaker {
                    continue;
                }
            }
            lines.extend(trigger.says_any_of.iter().map(String::as_str));
        }
        lines
    }
}
