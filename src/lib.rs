//! Script-driven NPC conversation engine.
//!
//! This crate orchestrates a turn-based conversation among a small group of
//! autonomous agents speaking lines from a shared authored script:
//! - Trigger/reply matching (exact and fuzzy) over the last spoken line
//! - Per-agent memory so lines are not repeated while alternatives remain
//! - A round-robin turn scheduler paced by a speaking-duration estimate
//! - Presence-driven session control (start on first observer, stop on last)
//!
//! Playback is external: agents are registered with any [`Speaker`]
//! implementation, and the script dataset is loaded whole at startup.
//!
//! # Quick Start
//!
//! ```ignore
//! use banter::{AgentSlot, CircleConfig, ConversationCircle, PresenceId, Script};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let script = Arc::new(Script::load_json("script.json").await?);
//!
//!     let slots = vec![
//!         AgentSlot::bound("Mara", mara_playback),
//!         AgentSlot::bound("Silas", silas_playback),
//!     ];
//!
//!     let mut circle = ConversationCircle::new(CircleConfig::new("dockside"), script, slots);
//!
//!     circle.presence_gained(PresenceId(1)); // conversation starts
//!     // ...
//!     circle.presence_lost(PresenceId(1)).await; // conversation stops
//!     Ok(())
//! }
//! ```

pub mod matcher;
pub mod memory;
pub mod pacing;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod speaker;
pub mod testing;

// Primary public API
pub use matcher::{matches, MatchKind};
pub use memory::{pick_unused, LineMemory};
pub use pacing::estimate_speaking_duration;
pub use scheduler::{DialogueLine, SchedulerState, SchedulerTuning, TurnScheduler};
pub use script::{AgentProfile, Personality, Script, ScriptError, Trigger};
pub use session::{CircleConfig, ConversationCircle, PresenceId};
pub use speaker::{AgentSlot, Roster, SpeakError, Speaker};
