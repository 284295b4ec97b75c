//! Simulation Error Types
//!
//! Three severities: configuration errors are fatal before any step runs,
//! state errors are recoverable rejections with no mutation, and lifecycle
//! invariant violations halt the run because continuing would corrupt
//! already-emitted metrics.

use society_events::SimTime;
use thiserror::Error;

/// Errors raised while validating or loading a scenario configuration.
///
/// All variants are fatal at setup: no simulation step executes after one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("population is empty")]
    EmptyPopulation,

    #[error("duplicate agent name '{0}' in population spec")]
    DuplicateName(String),

    #[error("initial ATP must be positive, got {0}")]
    NonPositiveAtp(f64),

    #[error("{name} must lie in [0,1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("schedule is empty: epochs={epochs}, rounds={rounds}, interactions={interactions}")]
    EmptySchedule {
        epochs: u64,
        rounds: u64,
        interactions: u64,
    },

    #[error("population declares {0} human slots; at most one is supported")]
    MultipleHumanSlots(usize),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("could not read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse scenario file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Recoverable rejections of external calls. The call is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no human decision is pending")]
    NoPendingDecision,

    #[error("decision frame '{submitted}' is stale (pending frame is '{pending}')")]
    StaleFrame { submitted: String, pending: String },

    #[error("decision frame '{0}' was already resolved")]
    AlreadyResolved(String),
}

/// Top-level simulation error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("rejected: {0}")]
    State(#[from] StateError),

    /// Reached only if scheduler invariants are broken; halts the run.
    #[error("lifecycle invariant violated at {time}: agent '{agent_id}' is {condition}")]
    LifecycleInvariant {
        time: SimTime,
        agent_id: String,
        condition: &'static str,
    },

    #[error("output error at {time}: {source}")]
    Output {
        time: SimTime,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Constructor for the fatal dead/stale-participant assertion.
    pub fn lifecycle(time: SimTime, agent_id: impl Into<String>, condition: &'static str) -> Self {
        SimError::LifecycleInvariant {
            time,
            agent_id: agent_id.into(),
            condition,
        }
    }

    /// True for errors the embedding driver may swallow and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SimError::State(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_errors_are_recoverable() {
        let err = SimError::from(StateError::NoPendingDecision);
        assert!(err.is_recoverable());

        let err = SimError::lifecycle(SimTime::new(1, 2, 3), "agent_0_g0", "dead");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_lifecycle_error_reports_step_context() {
        let err = SimError::lifecycle(SimTime::new(4, 7, 2), "agent_5_g1", "stale generation");
        let msg = err.to_string();
        assert!(msg.contains("epoch_4.round_7.interaction_2"));
        assert!(msg.contains("agent_5_g1"));
    }
}
