//! Shared event types and serialization for the society simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod clock;
pub mod event;
pub mod interaction;
pub mod snapshot;

// Re-export clock types
pub use clock::{ParseTimeError, SimTime};

// Re-export interaction types
pub use interaction::{Action, InteractionRecord, Outcome, ParticipantRecord};

// Re-export event types
pub use event::{generate_event_id, RunEndReason, SocietyEvent, SocietyEventKind};

// Re-export snapshot types
pub use snapshot::{
    generate_snapshot_id, AgentSnapshot, CoalitionSnapshot, SocietyMetrics, SocietySnapshot,
};
