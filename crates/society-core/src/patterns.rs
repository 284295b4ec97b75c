//! Pattern Learning Store (EP)
//!
//! A cross-life situation-to-outcome corpus keyed by lineage. Entries
//! survive rebirth: a successor consults everything its predecessors
//! recorded. The store is purely advisory; it never touches agent resource
//! or trust state, and consuming strategies are free to ignore it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use society_events::{Action, Outcome, SimTime};

use crate::config::PatternParams;
use crate::registry::LineageId;

/// Quantized situation descriptor: a resource bucket and a trust bucket.
///
/// Buckets deliberately lose precision so distinct but similar situations
/// pool their evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// ATP relative to the starting endowment: 0 = desperate (<25%),
    /// 1 = strained, 2 = comfortable, 3 = rich (>=100%).
    pub atp_bucket: u8,
    /// Trust toward the partner in five 0.2-wide buckets.
    pub trust_bucket: u8,
}

impl Fingerprint {
    /// Quantizes a live situation.
    pub fn quantize(atp: f64, initial_atp: f64, trust_toward_partner: f64) -> Self {
        let ratio = if initial_atp > 0.0 { atp / initial_atp } else { 0.0 };
        let atp_bucket = if ratio < 0.25 {
            0
        } else if ratio < 0.6 {
            1
        } else if ratio < 1.0 {
            2
        } else {
            3
        };
        let trust_bucket = ((trust_toward_partner.clamp(0.0, 1.0) * 5.0) as u8).min(4);
        Self {
            atp_bucket,
            trust_bucket,
        }
    }

    /// Bucket distance used for similarity weighting.
    fn distance(&self, other: &Fingerprint) -> u8 {
        self.atp_bucket.abs_diff(other.atp_bucket) + self.trust_bucket.abs_diff(other.trust_bucket)
    }
}

/// One recorded situation/action/outcome observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub fingerprint: Fingerprint,
    pub action: Action,
    pub outcome: Outcome,
    pub recorded_at: SimTime,
    /// Monotone insertion counter, the recency marker.
    pub sequence: u64,
}

/// Advisory recommendation returned by a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    /// Bounded confidence in (0, max_confidence); rises monotonically with
    /// the weight of consistent supporting evidence.
    pub confidence: f64,
}

/// The lineage-keyed pattern corpus.
///
/// Owned explicitly by the run (no global state); created at a lineage's
/// first life and never implicitly reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStore {
    by_lineage: BTreeMap<LineageId, Vec<PatternEntry>>,
    next_sequence: u64,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observation to a lineage's corpus.
    pub fn record_outcome(
        &mut self,
        lineage: LineageId,
        fingerprint: Fingerprint,
        action: Action,
        outcome: Outcome,
        time: SimTime,
    ) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.by_lineage.entry(lineage).or_default().push(PatternEntry {
            fingerprint,
            action,
            outcome,
            recorded_at: time,
            sequence,
        });
    }

    /// Number of entries recorded for a lineage.
    pub fn corpus_len(&self, lineage: LineageId) -> usize {
        self.by_lineage.get(&lineage).map(Vec::len).unwrap_or(0)
    }

    /// Recommends an action for a situation, or `None` when the lineage has
    /// no applicable evidence.
    ///
    /// Evidence is weighted toward more recent and more similar entries.
    /// The recommended action is the one whose favorable-outcome weight
    /// dominates; confidence approaches `max_confidence` asymptotically.
    pub fn query(
        &self,
        lineage: LineageId,
        fingerprint: Fingerprint,
        params: &PatternParams,
    ) -> Option<Recommendation> {
        let entries = self.by_lineage.get(&lineage)?;
        if entries.is_empty() {
            return None;
        }

        let newest = entries.last().map(|e| e.sequence).unwrap_or(0);
        let mut cooperate_score = 0.0;
        let mut defect_score = 0.0;
        let mut total_weight = 0.0;

        for entry in entries {
            let similarity = match fingerprint.distance(&entry.fingerprint) {
                0 => 1.0,
                1 => params.neighbor_weight,
                _ => continue,
            };
            let age = (newest - entry.sequence) as i32;
            let recency = params.recency_weight.powi(age);
            let weight = similarity * recency;
            total_weight += weight;

            // Favorable outcomes vote for the action taken; unfavorable
            // ones vote for the opposite action.
            let endorsed = if entry.outcome.is_favorable() {
                entry.action
            } else {
                entry.action.inverse()
            };
            match endorsed {
                Action::Cooperate => cooperate_score += weight,
                Action::Defect => defect_score += weight,
            }
        }

        if total_weight == 0.0 {
            return None;
        }

        let (action, winning) = if cooperate_score >= defect_score {
            (Action::Cooperate, cooperate_score)
        } else {
            (Action::Defect, defect_score)
        };
        // Consistency of the evidence scales how fast confidence saturates.
        let consistency = winning / total_weight;
        let confidence = params.max_confidence * consistency * (winning / (winning + 1.0));

        Some(Recommendation { action, confidence })
    }
}
