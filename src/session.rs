//! Presence-driven session control for one conversation circle.
//!
//! The circle reacts to two external signals from the spatial-trigger
//! collaborator: presence gained and presence lost. The first observer to
//! arrive starts the turn scheduler; when the last one leaves, the
//! scheduler stops. Agent registration is independent of presence and
//! happens once when the circle is built.

use crate::scheduler::{DialogueLine, SchedulerTuning, TurnScheduler};
use crate::script::Script;
use crate::speaker::{AgentSlot, Roster};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Identifier for one observer inside the activation zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceId(pub u64);

/// Configuration for a conversation circle.
#[derive(Debug, Clone, Default)]
pub struct CircleConfig {
    /// Human-readable circle name, used in diagnostics.
    pub name: String,
    /// Timing knobs passed through to the scheduler.
    pub tuning: SchedulerTuning,
}

impl CircleConfig {
    /// Create a config with default tuning.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tuning: SchedulerTuning::default(),
        }
    }

    /// Override the scheduler tuning.
    pub fn with_tuning(mut self, tuning: SchedulerTuning) -> Self {
        self.tuning = tuning;
        self
    }
}

/// One conversation circle: a scheduler plus the set of present observers.
///
/// Exactly one session is ever active for a circle; the scheduler's own
/// state machine enforces that `start` while running is a no-op.
pub struct ConversationCircle {
    config: CircleConfig,
    scheduler: TurnScheduler,
    present: HashSet<PresenceId>,
}

impl ConversationCircle {
    /// Build a circle from a script and an ordered list of agent slots.
    ///
    /// Unbound slots are skipped; relationship scores are rolled during
    /// registration.
    pub fn new(config: CircleConfig, script: Arc<Script>, slots: Vec<AgentSlot>) -> Self {
        let roster = Arc::new(Roster::register(slots));
        let scheduler = TurnScheduler::new(script, roster, config.tuning.clone());

        Self {
            config,
            scheduler,
            present: HashSet::new(),
        }
    }

    /// An observer entered the activation zone. Starts the conversation if
    /// it is not already running. Must be called within a tokio runtime.
    pub fn presence_gained(&mut self, id: PresenceId) {
        self.present.insert(id);
        if !self.scheduler.is_running() {
            tracing::debug!(circle = self.config.name.as_str(), id = id.0, "presence gained");
            self.scheduler.start();
        }
    }

    /// An observer left the activation zone. Stops the conversation when
    /// nobody is left.
    pub async fn presence_lost(&mut self, id: PresenceId) {
        self.present.remove(&id);
        if self.present.is_empty() {
            tracing::debug!(circle = self.config.name.as_str(), id = id.0, "last presence lost");
            self.scheduler.stop().await;
        }
    }

    /// Explicitly stop the conversation regardless of presence. Idempotent.
    pub async fn shutdown(&mut self) {
        self.scheduler.stop().await;
    }

    /// Whether the conversation is currently running.
    pub fn is_active(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Number of observers currently present.
    pub fn present_count(&self) -> usize {
        self.present.len()
    }

    /// The circle's name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The underlying scheduler, for state queries.
    pub fn scheduler(&self) -> &TurnScheduler {
        &self.scheduler
    }

    /// The last spoken line, observable while the circle is inactive.
    pub fn last_line(&self) -> Option<DialogueLine> {
        self.scheduler.last_line()
    }
}
