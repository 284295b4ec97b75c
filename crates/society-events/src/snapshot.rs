//! Snapshot Types
//!
//! Serialization structs for society snapshots and aggregate metrics.
//!
//! Snapshots capture the complete externally visible state of the simulation
//! at a point in time. They are the only surface rendering, narrative, and
//! export collaborators read; none of them can mutate simulation state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::SimTime;

/// Generates a snapshot ID with the given sequence number.
pub fn generate_snapshot_id(sequence: u64) -> String {
    format!("snap_{:06}", sequence)
}

/// Per-agent state at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub name: String,
    pub lineage: u32,
    pub generation: u32,
    pub strategy: String,
    pub alive: bool,
    pub atp: f64,
    pub reputation: f64,
    pub karma: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coalition: Option<String>,
    pub interactions: u64,
    pub cooperations: u64,
    pub defections: u64,
    /// Outbound trust edges toward peers, keyed by agent id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub trust_toward: HashMap<String, f64>,
}

impl AgentSnapshot {
    /// Lifetime cooperation rate, 0.0 when the agent never interacted.
    pub fn cooperation_rate(&self) -> f64 {
        if self.interactions == 0 {
            0.0
        } else {
            self.cooperations as f64 / self.interactions as f64
        }
    }
}

/// A mutual-trust cluster at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionSnapshot {
    pub coalition_id: String,
    pub members: Vec<String>,
    pub formed_epoch: u64,
    pub min_mutual_trust: f64,
}

/// Aggregate society-level metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocietyMetrics {
    pub time: SimTime,
    pub alive_count: usize,
    pub dead_count: usize,
    /// Deaths that were not followed by a rebirth.
    pub permanent_deaths: usize,
    pub rebirths: usize,
    pub total_interactions: u64,
    /// Fraction of all committed actions that were cooperations.
    pub cooperation_rate: f64,
    pub total_atp: f64,
    pub mean_atp: f64,
    pub mean_reputation: f64,
    pub mean_trust: f64,
    pub coalition_count: usize,
    /// Fraction of alive agents holding coalition membership.
    pub coalition_coverage: f64,
    pub outcome_counts: HashMap<String, u64>,
}

/// Full point-in-time snapshot of the society.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocietySnapshot {
    pub snapshot_id: String,
    pub time: SimTime,
    pub trigger: String,
    pub agents: Vec<AgentSnapshot>,
    pub coalitions: Vec<CoalitionSnapshot>,
    pub metrics: SocietyMetrics,
}
