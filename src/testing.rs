//! Testing utilities for the conversation engine.
//!
//! Provides a [`MockSpeaker`] that records spoken lines into a shared
//! transcript (optionally with scripted failures), a sample script fixture,
//! and assertion helpers for verifying conversation behavior without any
//! real playback backend.

use crate::script::{AgentProfile, Personality, Script, Trigger};
use crate::speaker::{SpeakError, Speaker};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Outcome of one scripted speak call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback succeeds immediately.
    Ok,
    /// Playback fails.
    Fail,
    /// Playback succeeds only after the given delay. Useful for holding a
    /// speak call outstanding while the test stops the conversation.
    Slow(std::time::Duration),
}

/// Transcript shared between mock speakers and the test, recording
/// `(speaker name, text)` pairs in speaking order.
#[derive(Debug, Clone, Default)]
pub struct SharedTranscript(Arc<Mutex<Vec<(String, String)>>>);

impl SharedTranscript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one spoken line.
    pub fn push(&self, speaker: &str, text: &str) {
        self.0
            .lock()
            .expect("transcript lock poisoned")
            .push((speaker.to_string(), text.to_string()));
    }

    /// Snapshot of all recorded lines.
    pub fn lines(&self) -> Vec<(String, String)> {
        self.0.lock().expect("transcript lock poisoned").clone()
    }

    /// Number of recorded lines.
    pub fn len(&self) -> usize {
        self.0.lock().expect("transcript lock poisoned").len()
    }

    /// Whether nothing has been spoken.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A speak capability that records into a [`SharedTranscript`].
///
/// Outcomes are consumed front-to-back per speak call; once exhausted (or
/// when constructed with [`MockSpeaker::always_ok`]) every call succeeds.
/// Failed calls record nothing.
pub struct MockSpeaker {
    name: String,
    transcript: SharedTranscript,
    outcomes: Mutex<VecDeque<SpeakOutcome>>,
    stop_count: AtomicUsize,
}

impl MockSpeaker {
    /// A speaker whose every speak call succeeds.
    pub fn always_ok(name: impl Into<String>, transcript: SharedTranscript) -> Arc<Self> {
        Self::with_outcomes(name, transcript, Vec::new())
    }

    /// A speaker with scripted outcomes for its first calls.
    pub fn with_outcomes(
        name: impl Into<String>,
        transcript: SharedTranscript,
        outcomes: Vec<SpeakOutcome>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            transcript,
            outcomes: Mutex::new(outcomes.into()),
            stop_count: AtomicUsize::new(0),
        })
    }

    /// How many times `stop_speaking` has been called.
    pub fn stop_count(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Speaker for MockSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeakError> {
        let outcome = self
            .outcomes
            .lock()
            .expect("outcomes lock poisoned")
            .pop_front()
            .unwrap_or(SpeakOutcome::Ok);

        match outcome {
            SpeakOutcome::Ok => {
                self.transcript.push(&self.name, text);
                Ok(())
            }
            SpeakOutcome::Fail => Err(SpeakError::PlaybackFailed("scripted failure".to_string())),
            SpeakOutcome::Slow(delay) => {
                // Nothing lands in the transcript until playback finishes,
                // so a cancelled call leaves no trace.
                tokio::time::sleep(delay).await;
                self.transcript.push(&self.name, text);
                Ok(())
            }
        }
    }

    fn stop_speaking(&self) {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A small two-agent script in the shape of a real authored dataset:
/// speaker-filtered triggers with per-responder reply pools plus one
/// unfiltered trigger.
pub fn sample_script() -> Script {
    let profiles = vec![
        AgentProfile {
            name: "Mara".to_string(),
            backstory: "Ran the harbor market stall for twenty years.".to_string(),
            interests: vec!["tides".to_string(), "fish prices".to_string()],
            personality: Personality::Skeptical,
        },
        AgentProfile {
            name: "Silas".to_string(),
            backstory: "Retired deckhand who never quite left the docks.".to_string(),
            interests: vec!["old ships".to_string(), "card games".to_string()],
            personality: Personality::Sarcastic,
        },
    ];

    let triggers = vec![
        Trigger {
            speaker_filter: Some("Mara".to_string()),
            says_any_of: vec![
                "The harbor market opens at dawn tomorrow.".to_string(),
                "Fresh catch prices are climbing again.".to_string(),
            ],
            replies_from: BTreeMap::from([(
                "Silas".to_string(),
                vec![
                    "Climbing prices never helped my stall.".to_string(),
                    "Dawn is too early for honest work.".to_string(),
                    "You say that every week.".to_string(),
                ],
            )]),
        },
        Trigger {
            speaker_filter: Some("Silas".to_string()),
            says_any_of: vec!["I'm done haggling with the fishmongers.".to_string()],
            replies_from: BTreeMap::from([(
                "Mara".to_string(),
                vec![
                    "You always say that.".to_string(),
                    "They will miss your coin.".to_string(),
                ],
            )]),
        },
        Trigger {
            speaker_filter: None,
            says_any_of: vec!["Strange weather on the water today.".to_string()],
            replies_from: BTreeMap::from([
                (
                    "Mara".to_string(),
                    vec!["The gulls knew it before we did.".to_string()],
                ),
                (
                    "Silas".to_string(),
                    vec!["Every day out here is strange.".to_string()],
                ),
            ]),
        },
    ];

    Script::new(profiles, triggers).expect("sample script is valid")
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the transcript holds at least `expected` lines.
#[track_caller]
pub fn assert_spoke_at_least(transcript: &SharedTranscript, expected: usize) {
    let actual = transcript.len();
    assert!(
        actual >= expected,
        "Expected at least {expected} spoken lines, got {actual}"
    );
}

/// Assert the first `count` transcript entries rotate through `names` in
/// registration order, wrapping modulo the agent count.
#[track_caller]
pub fn assert_round_robin(transcript: &SharedTranscript, names: &[&str], count: usize) {
    let lines = transcript.lines();
    assert!(
        lines.len() >= count,
        "Expected at least {count} spoken lines, got {}",
        lines.len()
    );
    for (i, (speaker, _)) in lines.iter().take(count).enumerate() {
        let expected = names[i % names.len()];
        assert_eq!(
            speaker, expected,
            "Turn {i}: expected speaker {expected}, got {speaker}"
        );
    }
}
