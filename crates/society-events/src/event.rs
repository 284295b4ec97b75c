//! Society Event Types
//!
//! Every observable state transition in the simulation is recorded as a
//! `SocietyEvent`. Events are append-only and carry enough identifying
//! context (time plus involved agent ids) to reproduce the step that
//! produced them without replaying the whole run.

use serde::{Deserialize, Serialize};

use crate::{InteractionRecord, SimTime};

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// A single recorded simulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocietyEvent {
    pub event_id: String,
    pub time: SimTime,
    #[serde(flatten)]
    pub kind: SocietyEventKind,
}

impl SocietyEvent {
    pub fn new(event_id: impl Into<String>, time: SimTime, kind: SocietyEventKind) -> Self {
        Self {
            event_id: event_id.into(),
            time,
            kind,
        }
    }
}

/// The payload of a recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SocietyEventKind {
    /// A pairwise encounter was committed.
    InteractionResolved { record: InteractionRecord },
    /// An agent's ATP reached zero and it left the population.
    AgentDied {
        agent_id: String,
        lineage: u32,
        generation: u32,
        /// Reputation frozen at the moment of death.
        final_reputation: f64,
    },
    /// A dead agent's lineage continued into a new generation.
    AgentReborn {
        predecessor_id: String,
        successor_id: String,
        lineage: u32,
        generation: u32,
        seed_atp: f64,
    },
    /// A dead agent failed the rebirth check and was permanently retired.
    AgentArchived {
        agent_id: String,
        lineage: u32,
        final_reputation: f64,
    },
    /// A new mutual-trust cluster was detected at an epoch boundary.
    CoalitionFormed {
        coalition_id: String,
        members: Vec<String>,
        min_mutual_trust: f64,
    },
    /// A previously detected cluster no longer met the trust floor.
    CoalitionDissolved { coalition_id: String },
    /// A coalition member transferred ATP to a struggling member.
    SupportGranted {
        coalition_id: String,
        donor_id: String,
        recipient_id: String,
        amount: f64,
    },
    /// The scheduler suspended awaiting a human decision.
    HumanDecisionRequested {
        frame_id: String,
        agent_id: String,
        partner_id: String,
    },
    /// A pending human decision was submitted and the interaction resumed.
    HumanDecisionSubmitted { frame_id: String },
    /// A pending human decision was abandoned; no state was mutated.
    HumanDecisionCancelled { frame_id: String },
    /// The run reached its configured end or a terminal condition.
    RunEnded { reason: RunEndReason },
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEndReason {
    /// All configured epochs completed.
    Completed,
    /// Fewer than two agents remained alive.
    PopulationExhausted,
    /// The embedding driver cancelled the run.
    Cancelled,
}

impl SocietyEventKind {
    /// Short tag used in log lines and counters.
    pub fn tag(&self) -> &'static str {
        match self {
            SocietyEventKind::InteractionResolved { .. } => "interaction_resolved",
            SocietyEventKind::AgentDied { .. } => "agent_died",
            SocietyEventKind::AgentReborn { .. } => "agent_reborn",
            SocietyEventKind::AgentArchived { .. } => "agent_archived",
            SocietyEventKind::CoalitionFormed { .. } => "coalition_formed",
            SocietyEventKind::CoalitionDissolved { .. } => "coalition_dissolved",
            SocietyEventKind::SupportGranted { .. } => "support_granted",
            SocietyEventKind::HumanDecisionRequested { .. } => "human_decision_requested",
            SocietyEventKind::HumanDecisionSubmitted { .. } => "human_decision_submitted",
            SocietyEventKind::HumanDecisionCancelled { .. } => "human_decision_cancelled",
            SocietyEventKind::RunEnded { .. } => "run_ended",
        }
    }
}
