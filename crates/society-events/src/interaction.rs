//! Interaction Records
//!
//! The immutable per-encounter record appended by the payoff engine, plus
//! the action and outcome vocabulary shared by every other crate.

use serde::{Deserialize, Serialize};

use crate::SimTime;

/// One of the two moves available in an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Cooperate,
    Defect,
}

impl Action {
    pub fn is_cooperation(self) -> bool {
        matches!(self, Action::Cooperate)
    }

    /// The other action.
    pub fn inverse(self) -> Self {
        match self {
            Action::Cooperate => Action::Defect,
            Action::Defect => Action::Cooperate,
        }
    }
}

/// Classification of a resolved encounter from one participant's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both participants cooperated.
    MutualCooperation,
    /// Both participants defected.
    MutualDefection,
    /// This participant cooperated against a defector.
    Exploited,
    /// This participant defected against a cooperator.
    Exploiting,
}

impl Outcome {
    /// Classifies the encounter from the perspective of the participant who
    /// played `own` against a partner who played `partner`.
    pub fn classify(own: Action, partner: Action) -> Self {
        match (own, partner) {
            (Action::Cooperate, Action::Cooperate) => Outcome::MutualCooperation,
            (Action::Defect, Action::Defect) => Outcome::MutualDefection,
            (Action::Cooperate, Action::Defect) => Outcome::Exploited,
            (Action::Defect, Action::Cooperate) => Outcome::Exploiting,
        }
    }

    /// True when the encounter went well for this participant.
    pub fn is_favorable(self) -> bool {
        matches!(self, Outcome::MutualCooperation | Outcome::Exploiting)
    }
}

/// One side of a resolved interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub agent_id: String,
    pub action: Action,
    pub outcome: Outcome,
    /// Signed ATP change committed for this participant.
    pub atp_delta: f64,
    /// Signed change to this participant's trust toward the partner.
    pub trust_delta: f64,
}

/// Immutable record of one committed pairwise encounter.
///
/// Appended exactly once per resolved interaction, in round order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub time: SimTime,
    pub first: ParticipantRecord,
    pub second: ParticipantRecord,
}

impl InteractionRecord {
    /// Net ATP created or destroyed by this encounter.
    pub fn net_atp(&self) -> f64 {
        self.first.atp_delta + self.second.atp_delta
    }

    /// True when both sides cooperated.
    pub fn is_mutual_cooperation(&self) -> bool {
        self.first.outcome == Outcome::MutualCooperation
    }

    /// Returns the record for the given agent, if it participated.
    pub fn side_of(&self, agent_id: &str) -> Option<&ParticipantRecord> {
        if self.first.agent_id == agent_id {
            Some(&self.first)
        } else if self.second.agent_id == agent_id {
            Some(&self.second)
        } else {
            None
        }
    }
}
