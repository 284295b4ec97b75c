//! Core simulation logic: agents, trust, karma, coalitions.
//!
//! A population of autonomous agents plays repeated pairwise
//! cooperate/defect encounters inside a metabolic resource economy. Every
//! encounter moves ATP and trust; agents die when their balance is
//! exhausted, and trustworthy lineages are reborn with partial carryover.
//! The [`scheduler::Scheduler`] is the public entry point; everything else
//! hangs off it.

pub mod coalition;
pub mod config;
pub mod decision;
pub mod error;
pub mod game;
pub mod lifecycle;
pub mod output;
pub mod patterns;
pub mod recorder;
pub mod registry;
pub mod scheduler;
pub mod setup;
pub mod trust;

pub use config::ScenarioConfig;
pub use decision::{DecisionFrame, StrategyKind};
pub use error::{ConfigError, SimError, StateError};
pub use registry::{Agent, AgentId, AgentRegistry, LineageId};
pub use scheduler::{RunState, Scheduler};

// Re-export the shared data crate for downstream convenience.
pub use society_events;
