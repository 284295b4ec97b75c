//! Coalition Manager
//!
//! Derives mutual-trust clusters from the trust graph. Membership is
//! recomputed wholesale at every epoch boundary rather than patched
//! incrementally, so deaths and rebirths can never leave stale members
//! behind. Coalitions also grant bounded peer-to-peer ATP support to
//! members below the critical resource threshold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use society_events::{SimTime, SocietyEventKind};

use crate::config::{CoalitionParams, TrustParams};
use crate::error::SimError;
use crate::recorder::EventRecorder;
use crate::registry::{AgentId, AgentRegistry};
use crate::trust::TrustGraph;

/// A cluster of mutually high-trust agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coalition {
    /// Stable across recomputes as long as the smallest member id stays.
    pub id: String,
    pub members: Vec<AgentId>,
    pub formed_epoch: u64,
    /// Minimum mutual trust observed on any support edge inside the
    /// cluster at the last recompute.
    pub min_mutual_trust: f64,
}

/// The current set of coalitions, rebuilt each epoch boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoalitionRegistry {
    coalitions: Vec<Coalition>,
    by_agent: BTreeMap<AgentId, String>,
}

/// Union-find over indices into the sorted alive-agent list.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

impl CoalitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coalitions(&self) -> &[Coalition] {
        &self.coalitions
    }

    pub fn count(&self) -> usize {
        self.coalitions.len()
    }

    /// The coalition an agent currently belongs to, if any.
    pub fn coalition_of(&self, id: &AgentId) -> Option<&Coalition> {
        let coalition_id = self.by_agent.get(id)?;
        self.coalitions.iter().find(|c| &c.id == coalition_id)
    }

    /// Rebuilds all coalitions from scratch over the alive population.
    ///
    /// A support edge exists between two agents iff both directed trust
    /// values meet the configured floor; connected components of at least
    /// two agents become coalitions. Formation/dissolution events are
    /// recorded against the previous generation of clusters.
    pub fn recompute(
        &mut self,
        registry: &AgentRegistry,
        trust: &TrustGraph,
        params: &CoalitionParams,
        epoch: u64,
        time: SimTime,
        recorder: &mut EventRecorder,
    ) {
        let alive = registry.alive_ids();
        let mut uf = UnionFind::new(alive.len());
        // Mutual trust per edge, kept to compute each cluster's floor.
        let mut edge_trust: BTreeMap<(usize, usize), f64> = BTreeMap::new();

        for i in 0..alive.len() {
            for j in (i + 1)..alive.len() {
                let forward = trust.trust(&alive[i], &alive[j]);
                let backward = trust.trust(&alive[j], &alive[i]);
                if forward >= params.trust_floor && backward >= params.trust_floor {
                    uf.union(i, j);
                    edge_trust.insert((i, j), forward.min(backward));
                }
            }
        }

        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..alive.len() {
            clusters.entry(uf.find(i)).or_default().push(i);
        }

        let previous_ids: Vec<String> = self.coalitions.iter().map(|c| c.id.clone()).collect();
        let previous: BTreeMap<String, Coalition> = self
            .coalitions
            .drain(..)
            .map(|c| (c.id.clone(), c))
            .collect();
        self.by_agent.clear();

        for members_idx in clusters.values() {
            if members_idx.len() < 2 {
                continue;
            }
            let members: Vec<AgentId> = members_idx.iter().map(|&i| alive[i].clone()).collect();
            let min_mutual_trust = edge_trust
                .iter()
                .filter(|((i, j), _)| members_idx.contains(i) && members_idx.contains(j))
                .map(|(_, &t)| t)
                .fold(f64::INFINITY, f64::min);
            // The smallest member id anchors the coalition's identity.
            let id = format!("coal_{}", members[0].as_str());

            let is_new = !previous.contains_key(&id);
            let formed_epoch = previous.get(&id).map(|c| c.formed_epoch).unwrap_or(epoch);

            for member in &members {
                self.by_agent.insert(member.clone(), id.clone());
            }
            let coalition = Coalition {
                id: id.clone(),
                members: members.clone(),
                formed_epoch,
                min_mutual_trust,
            };
            if is_new {
                recorder.record(
                    time,
                    SocietyEventKind::CoalitionFormed {
                        coalition_id: id.clone(),
                        members: members.iter().map(|m| m.0.clone()).collect(),
                        min_mutual_trust,
                    },
                );
            }
            self.coalitions.push(coalition);
        }

        for old_id in previous_ids {
            if !self.coalitions.iter().any(|c| c.id == old_id) {
                recorder.record(
                    time,
                    SocietyEventKind::CoalitionDissolved {
                        coalition_id: old_id,
                    },
                );
            }
        }
    }

    /// Grants bounded support transfers inside each coalition.
    ///
    /// A member below the critical ATP threshold receives from the richest
    /// member that can afford to give without falling below the threshold
    /// itself; the amount is capped per recipient per round so the
    /// mechanism cannot launder value toward chronic low performers.
    pub fn grant_support(
        &self,
        registry: &mut AgentRegistry,
        params: &CoalitionParams,
        time: SimTime,
        recorder: &mut EventRecorder,
    ) -> Result<(), SimError> {
        for coalition in &self.coalitions {
            let mut needy: Vec<AgentId> = Vec::new();
            for member in &coalition.members {
                if let Some(agent) = registry.get(member) {
                    if agent.alive && agent.atp < params.critical_atp {
                        needy.push(member.clone());
                    }
                }
            }

            for recipient in needy {
                // Richest member that stays above the threshold after giving.
                let donor = coalition
                    .members
                    .iter()
                    .filter(|m| **m != recipient)
                    .filter_map(|m| registry.get(m).filter(|a| a.alive).map(|a| (m, a.atp)))
                    .filter(|(_, atp)| *atp - params.transfer_cap_per_round > params.critical_atp)
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(m, atp)| (m.clone(), atp));

                let Some((donor_id, _)) = donor else {
                    continue;
                };
                let recipient_atp = registry
                    .get(&recipient)
                    .map(|a| a.atp)
                    .unwrap_or(params.critical_atp);
                let amount = params
                    .transfer_cap_per_round
                    .min(params.critical_atp - recipient_atp)
                    .max(0.0);
                if amount <= 0.0 {
                    continue;
                }

                registry.adjust_atp(&donor_id, -amount, time)?;
                registry.adjust_atp(&recipient, amount, time)?;
                recorder.record(
                    time,
                    SocietyEventKind::SupportGranted {
                        coalition_id: coalition.id.clone(),
                        donor_id: donor_id.0.clone(),
                        recipient_id: recipient.0.clone(),
                        amount,
                    },
                );
            }
        }
        Ok(())
    }
}
