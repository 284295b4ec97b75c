//! Trust & Reputation Model
//!
//! Directed trust edges in [0,1], updated after every committed
//! interaction, plus the smoothed population-visible reputation aggregate.
//! The edge table is one of the two shared mutable resources of the
//! simulation (the other is the agent registry); every component reads and
//! writes trust through it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::TrustParams;
use crate::registry::AgentId;

use society_events::Action;

/// A single directed trust edge with its interaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEdge {
    /// Raw trust value in [0,1].
    pub value: f64,
    /// Round of the last interaction between the pair.
    pub last_interaction_round: u64,
    /// Observed cooperations by the partner, for consistency tracking.
    cooperations_seen: u64,
    /// Observed defections by the partner.
    defections_seen: u64,
}

impl TrustEdge {
    fn new(initial: f64) -> Self {
        Self {
            value: initial.clamp(0.0, 1.0),
            last_interaction_round: 0,
            cooperations_seen: 0,
            defections_seen: 0,
        }
    }

    /// How consistently the partner has behaved, in [0.5, 1].
    ///
    /// 1.0 means the partner always played the same action toward this
    /// observer; 0.5 means a perfect coin flip.
    pub fn consistency(&self) -> f64 {
        let total = self.cooperations_seen + self.defections_seen;
        if total == 0 {
            return 1.0;
        }
        let p = self.cooperations_seen as f64 / total as f64;
        p.max(1.0 - p)
    }
}

/// The directed trust-edge table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustGraph {
    edges: BTreeMap<AgentId, BTreeMap<AgentId, TrustEdge>>,
    initial_trust: f64,
}

impl TrustGraph {
    pub fn new(initial_trust: f64) -> Self {
        Self {
            edges: BTreeMap::new(),
            initial_trust: initial_trust.clamp(0.0, 1.0),
        }
    }

    /// Raw directed trust from `observer` toward `target`.
    pub fn trust(&self, observer: &AgentId, target: &AgentId) -> f64 {
        self.edges
            .get(observer)
            .and_then(|m| m.get(target))
            .map(|e| e.value)
            .unwrap_or(self.initial_trust)
    }

    /// Effective trust after optional coherence modulation. Never below 0.
    pub fn effective_trust(
        &self,
        observer: &AgentId,
        target: &AgentId,
        params: &TrustParams,
    ) -> f64 {
        let raw = self.trust(observer, target);
        if !params.coherence_modulation {
            return raw;
        }
        let consistency = self
            .edges
            .get(observer)
            .and_then(|m| m.get(target))
            .map(|e| e.consistency())
            .unwrap_or(1.0);
        (raw * consistency).max(0.0)
    }

    fn edge_mut(&mut self, observer: &AgentId, target: &AgentId) -> &mut TrustEdge {
        let initial = self.initial_trust;
        self.edges
            .entry(observer.clone())
            .or_default()
            .entry(target.clone())
            .or_insert_with(|| TrustEdge::new(initial))
    }

    /// Updates `observer`'s trust toward `target` from the action `target`
    /// just played against `observer`. Returns the signed delta applied.
    pub fn observe(
        &mut self,
        observer: &AgentId,
        target: &AgentId,
        target_action: Action,
        round: u64,
        params: &TrustParams,
    ) -> f64 {
        let edge = self.edge_mut(observer, target);
        let before = edge.value;
        match target_action {
            Action::Cooperate => {
                edge.value = (edge.value + params.gain_step).min(1.0);
                edge.cooperations_seen += 1;
            }
            Action::Defect => {
                edge.value = (edge.value - params.loss_step).max(0.0);
                edge.defections_seen += 1;
            }
        }
        edge.last_interaction_round = round;
        edge.value - before
    }

    /// Mean inbound trust toward `target` over existing edges; falls back
    /// to the initial trust level when nobody has an edge yet.
    pub fn inbound_mean(&self, target: &AgentId) -> f64 {
        let mut sum = 0.0;
        let mut count = 0u32;
        for edges in self.edges.values() {
            if let Some(edge) = edges.get(target) {
                sum += edge.value;
                count += 1;
            }
        }
        if count == 0 {
            self.initial_trust
        } else {
            sum / count as f64
        }
    }

    /// Smoothed reputation update: blend of inbound trust and cooperation
    /// rate, exponentially smoothed against the current value, clamped.
    pub fn updated_reputation(
        &self,
        target: &AgentId,
        current: f64,
        cooperation_rate: f64,
        params: &TrustParams,
    ) -> f64 {
        let w = params.reputation_trust_weight;
        let signal = w * self.inbound_mean(target) + (1.0 - w) * cooperation_rate;
        let alpha = params.reputation_smoothing;
        ((1.0 - alpha) * current + alpha * signal).clamp(0.0, 1.0)
    }

    /// Multiplicative decay of every edge whose pair did not interact this
    /// round. A no-op when `idle_decay` is 1.0.
    pub fn decay_idle(&mut self, round: u64, params: &TrustParams) {
        if params.idle_decay >= 1.0 {
            return;
        }
        for edges in self.edges.values_mut() {
            for edge in edges.values_mut() {
                if edge.last_interaction_round < round {
                    edge.value = (edge.value * params.idle_decay).clamp(0.0, 1.0);
                }
            }
        }
    }

    /// Outbound edges from `observer`, for snapshots.
    pub fn edges_from(&self, observer: &AgentId) -> Vec<(AgentId, f64)> {
        self.edges
            .get(observer)
            .map(|m| m.iter().map(|(id, e)| (id.clone(), e.value)).collect())
            .unwrap_or_default()
    }

    /// Replaces every edge touching `old` with one touching `new`, scaled
    /// by `fraction`. Used by rebirth to carry trust karma forward.
    pub fn carry_over(&mut self, old: &AgentId, new: &AgentId, fraction: f64) {
        // Outbound edges.
        if let Some(mut outbound) = self.edges.remove(old) {
            for edge in outbound.values_mut() {
                edge.value = (edge.value * fraction).clamp(0.0, 1.0);
            }
            self.edges.insert(new.clone(), outbound);
        }
        // Inbound edges.
        for edges in self.edges.values_mut() {
            if let Some(mut edge) = edges.remove(old) {
                edge.value = (edge.value * fraction).clamp(0.0, 1.0);
                edges.insert(new.clone(), edge);
            }
        }
    }

    /// Removes every edge touching `id`. Used when an agent is archived.
    pub fn remove_agent(&mut self, id: &AgentId) {
        self.edges.remove(id);
        for edges in self.edges.values_mut() {
            edges.remove(id);
        }
    }

    /// Mean of all existing directed edges; initial trust when none exist.
    pub fn mean_trust(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0u64;
        for edges in self.edges.values() {
            for edge in edges.values() {
                sum += edge.value;
                count += 1;
            }
        }
        if count == 0 {
            self.initial_trust
        } else {
            sum / count as f64
        }
    }

    /// Serialized form used by rollback and no-mutation checks.
    pub fn state_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("trust graph serialization cannot fail")
    }
}
