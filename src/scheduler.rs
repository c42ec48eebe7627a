//! The turn scheduler: the state machine that drives the conversation.
//!
//! Exactly one turn is ever in flight. Each turn selects the next speaker in
//! round-robin order, picks a line (a scripted reply to the last utterance
//! when one applies, a standalone line otherwise), records it, speaks it
//! through the agent's capability, and schedules the next turn from the
//! pacing estimate. The loop runs as a spawned task; cancellation is
//! cooperative through a per-run watch channel, so a stop followed
//! immediately by a start can never leave two turn chains running.

use crate::memory::{self, LineMemory};
use crate::pacing::estimate_speaking_duration;
use crate::script::Script;
use crate::speaker::Roster;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

/// Pause appended after a successfully spoken line.
const DEFAULT_TURN_GAP: Duration = Duration::from_millis(300);

/// Pause before the next turn after a failed or skipped one.
const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_millis(800);

/// Timing knobs for the turn loop.
#[derive(Debug, Clone)]
pub struct SchedulerTuning {
    /// Extra delay added to the speaking-duration estimate between turns.
    pub turn_gap: Duration,
    /// Delay before retrying after a speak failure or a skipped turn.
    pub failure_backoff: Duration,
}

impl SchedulerTuning {
    /// Set the inter-turn gap.
    pub fn with_turn_gap(mut self, gap: Duration) -> Self {
        self.turn_gap = gap;
        self
    }

    /// Set the failure backoff.
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            turn_gap: DEFAULT_TURN_GAP,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }
}

/// The most recently spoken utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    /// Name of the agent that spoke.
    pub speaker: String,
    /// What was said.
    pub text: String,
}

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No turn loop running.
    Idle,
    /// A turn loop task is active.
    Running,
}

/// Mutable conversation state, owned by the turn-loop task while running.
struct ConvoState {
    /// Monotonically increasing rotation counter; speaker index is this
    /// modulo the agent count.
    turn_counter: usize,
    last_line: Option<DialogueLine>,
    memories: HashMap<String, LineMemory>,
}

impl ConvoState {
    fn new(roster: &Roster) -> Self {
        let memories = roster
            .names()
            .iter()
            .map(|name| (name.clone(), LineMemory::new()))
            .collect();

        Self {
            turn_counter: 0,
            last_line: None,
            memories,
        }
    }
}

struct RunHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<ConvoState>,
}

/// Drives turn-taking for one conversation circle.
///
/// Holds the conversation state (rotation counter, last line, per-agent
/// memories) and hands it to a spawned loop task while running. Memories
/// persist across stop/start within a process; only the rotation index and
/// the last-spoken line reset on `start`.
pub struct TurnScheduler {
    script: Arc<Script>,
    roster: Arc<Roster>,
    tuning: SchedulerTuning,
    // Exactly one of these is populated: `state` while idle, `run` while the
    // loop task owns the state.
    state: Option<ConvoState>,
    run: Option<RunHandle>,
}

impl TurnScheduler {
    /// Create an idle scheduler over a script and a registered roster.
    pub fn new(script: Arc<Script>, roster: Arc<Roster>, tuning: SchedulerTuning) -> Self {
        let state = ConvoState::new(&roster);
        Self {
            script,
            roster,
            tuning,
            state: Some(state),
            run: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        if self.run.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Whether a turn loop is active.
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// The registered roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The last spoken line. Only observable while idle; the loop task owns
    /// the record while running.
    pub fn last_line(&self) -> Option<DialogueLine> {
        self.state.as_ref().and_then(|s| s.last_line.clone())
    }

    /// An agent's line memory. Only observable while idle.
    pub fn memory_of(&self, name: &str) -> Option<&LineMemory> {
        self.state.as_ref().and_then(|s| s.memories.get(name))
    }

    /// Start the conversation.
    ///
    /// No-op unless idle with at least two registered agents. Resets the
    /// rotation to the first registered agent, clears the last-spoken line,
    /// and spawns the turn loop, which attempts a turn immediately. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.run.is_some() || self.roster.len() < 2 {
            return;
        }
        let Some(mut state) = self.state.take() else {
            return;
        };

        state.turn_counter = 0;
        state.last_line = None;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(turn_loop(
            self.script.clone(),
            self.roster.clone(),
            self.tuning.clone(),
            state,
            cancel_rx,
        ));

        self.run = Some(RunHandle {
            cancel: cancel_tx,
            task,
        });
        tracing::debug!(agents = self.roster.len(), "conversation started");
    }

    /// Stop the conversation.
    ///
    /// Idempotent. Signals cancellation, waits for the loop task to wind
    /// down (so no further speak call can occur once this returns), and
    /// asks every agent to stop speaking.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        let _ = run.cancel.send(true);
        match run.task.await {
            Ok(state) => self.state = Some(state),
            // The loop task panicked; fall back to fresh state so the
            // scheduler stays usable.
            Err(_) => self.state = Some(ConvoState::new(&self.roster)),
        }

        self.roster.stop_all();
        tracing::debug!("conversation stopped");
    }
}

/// The turn loop. Owns the conversation state until cancelled, then returns
/// it to the scheduler.
async fn turn_loop(
    script: Arc<Script>,
    roster: Arc<Roster>,
    tuning: SchedulerTuning,
    mut state: ConvoState,
    mut cancel: watch::Receiver<bool>,
) -> ConvoState {
    let agent_count = roster.len();

    loop {
        if *cancel.borrow() {
            return state;
        }

        // Resolve the current speaker, skipping names whose binding has gone
        // missing. Each failed lookup advances the rotation by exactly one
        // step; bounded to one full rotation so the loop cannot spin.
        let mut resolved = None;
        for _ in 0..agent_count {
            let name = &roster.names()[state.turn_counter % agent_count];
            match roster.speaker(name) {
                Some(speaker) => {
                    resolved = Some((name.clone(), speaker.clone()));
                    break;
                }
                None => state.turn_counter += 1,
            }
        }
        let Some((speaker_name, speaker)) = resolved else {
            if sleep_or_cancel(&mut cancel, tuning.failure_backoff).await {
                return state;
            }
            continue;
        };

        let Some(text) = select_line(&script, &speaker_name, &mut state) else {
            // The speaker has zero authored lines anywhere: a defect in the
            // dataset. Stay silent for this turn and move on.
            tracing::warn!(
                speaker = speaker_name.as_str(),
                "no lines available, skipping turn"
            );
            state.turn_counter += 1;
            if sleep_or_cancel(&mut cancel, tuning.failure_backoff).await {
                return state;
            }
            continue;
        };

        // Record before speaking so the reply lookup for the next turn sees
        // this line even if playback is still in progress.
        if let Some(mem) = state.memories.get_mut(&speaker_name) {
            mem.record(text.clone());
        }
        state.last_line = Some(DialogueLine {
            speaker: speaker_name.clone(),
            text: text.clone(),
        });

        let outcome = tokio::select! {
            result = speaker.speak(&text) => Some(result),
            _ = cancel.changed() => None,
        };

        let delay = match outcome {
            // Cancelled while the speak call was outstanding.
            None => return state,
            Some(Ok(())) => {
                state.turn_counter += 1;
                estimate_speaking_duration(&text) + tuning.turn_gap
            }
            Some(Err(err)) => {
                tracing::warn!(
                    speaker = speaker_name.as_str(),
                    error = %err,
                    "speak failed, continuing after backoff"
                );
                state.turn_counter += 1;
                tuning.failure_backoff
            }
        };

        if sleep_or_cancel(&mut cancel, delay).await {
            return state;
        }
    }
}

/// Sleep for the inter-turn delay, waking early on cancellation. Returns
/// true when the loop should exit.
async fn sleep_or_cancel(cancel: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = time::sleep(delay) => *cancel.borrow(),
        _ = cancel.changed() => true,
    }
}

/// Select the line the speaker says this turn.
///
/// Prefers a scripted reply to the last spoken line; falls back to the
/// speaker's standalone pool. Either way the choice avoids lines in the
/// speaker's memory. Returns `None` only when the speaker has no authored
/// lines at all.
fn select_line(script: &Script, speaker: &str, state: &mut ConvoState) -> Option<String> {
    let last = state.last_line.clone();
    let memory = state.memories.entry(speaker.to_string()).or_default();

    if let Some(last) = last {
        if let Some(replies) = script.find_replies(speaker, &last.text, &last.speaker) {
            if let Some(line) = memory::pick_unused(replies, memory) {
                return Some(line);
            }
        }
    }

    let standalone = script.standalone_lines(speaker);
    memory::pick_unused(&standalone, memory)
}
