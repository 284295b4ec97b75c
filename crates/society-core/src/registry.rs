//! Agent Registry
//!
//! The single source of truth for agent state. Every component reads and
//! writes agents through this registry; nothing holds a divergent copy
//! across a scheduler step. ATP is mutated only through the payoff engine's
//! committed interactions and through lifecycle/coalition transitions, all
//! of which go through `adjust_atp`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use society_events::SimTime;

use crate::decision::StrategyKind;
use crate::error::{ConfigError, SimError};

/// Persistent identity thread linking an agent across rebirths.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LineageId(pub u32);

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lineage_{}", self.0)
    }
}

/// Generation-scoped identity for one life of a lineage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(lineage: LineageId, generation: u32) -> Self {
        Self(format!("agent_{}_g{}", lineage.0, generation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statistics frozen at the moment of death.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStats {
    /// ATP frozen at death, clamped to zero.
    pub atp: f64,
    /// The unclamped balance after the fatal debit, kept for diagnostics.
    pub atp_unclamped: f64,
    pub reputation: f64,
    pub cooperation_rate: f64,
    pub interactions: u64,
    pub died_at: SimTime,
}

/// One agent, alive or dead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub lineage: LineageId,
    pub generation: u32,
    pub strategy: StrategyKind,
    pub atp: f64,
    /// Aggregate population-visible trust signal, in [0,1].
    pub reputation: f64,
    /// Reputation carried over from the previous life; 0.0 for the first
    /// generation of a lineage.
    pub karma: f64,
    pub alive: bool,
    pub interactions: u64,
    pub cooperations: u64,
    pub defections: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_stats: Option<FinalStats>,
}

impl Agent {
    /// Creates a first-generation agent.
    pub fn first_generation(
        lineage: LineageId,
        name: impl Into<String>,
        strategy: StrategyKind,
        atp: f64,
        reputation: f64,
    ) -> Self {
        Self {
            id: AgentId::new(lineage, 0),
            name: name.into(),
            lineage,
            generation: 0,
            strategy,
            atp,
            reputation,
            karma: 0.0,
            alive: true,
            interactions: 0,
            cooperations: 0,
            defections: 0,
            final_stats: None,
        }
    }

    /// Lifetime cooperation rate, 0.0 before the first interaction.
    pub fn cooperation_rate(&self) -> f64 {
        if self.interactions == 0 {
            0.0
        } else {
            self.cooperations as f64 / self.interactions as f64
        }
    }

    pub(crate) fn record_action(&mut self, cooperated: bool) {
        self.interactions += 1;
        if cooperated {
            self.cooperations += 1;
        } else {
            self.defections += 1;
        }
    }
}

/// Owns all agent records, alive and archived.
///
/// Iteration order is deterministic (sorted by id) so that seeded runs
/// replay identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
    /// Dead agents that failed the rebirth check. Never reconsidered.
    archived: BTreeMap<AgentId, Agent>,
    next_lineage: u32,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next unused lineage id.
    pub fn allocate_lineage(&mut self) -> LineageId {
        let id = LineageId(self.next_lineage);
        self.next_lineage += 1;
        id
    }

    /// Inserts a newly created agent. Duplicate ids are a setup error.
    pub fn insert(&mut self, agent: Agent) -> Result<(), ConfigError> {
        if self.agents.contains_key(&agent.id) || self.archived.contains_key(&agent.id) {
            return Err(ConfigError::DuplicateName(agent.id.0.clone()));
        }
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id).or_else(|| self.archived.get(id))
    }

    pub(crate) fn get_mut(&mut self, id: &AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Alive agents in deterministic (id-sorted) order.
    pub fn alive_agents(&self) -> Vec<&Agent> {
        self.agents.values().filter(|a| a.alive).collect()
    }

    /// Ids of alive agents in deterministic order.
    pub fn alive_ids(&self) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|a| a.alive)
            .map(|a| a.id.clone())
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.agents.values().filter(|a| a.alive).count()
    }

    /// All non-archived agents, dead lineage-continued ones included.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Permanently retired agents.
    pub fn archived(&self) -> impl Iterator<Item = &Agent> {
        self.archived.values()
    }

    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    /// True if the id refers to the current (alive) life of its lineage.
    pub fn is_current_and_alive(&self, id: &AgentId) -> bool {
        self.agents.get(id).map(|a| a.alive).unwrap_or(false)
    }

    /// Applies a committed ATP delta. Only the payoff engine, the lifecycle
    /// manager, and coalition support transfers call this.
    pub(crate) fn adjust_atp(
        &mut self,
        id: &AgentId,
        delta: f64,
        time: SimTime,
    ) -> Result<f64, SimError> {
        let agent = self
            .agents
            .get_mut(id)
            .filter(|a| a.alive)
            .ok_or_else(|| SimError::lifecycle(time, id.as_str(), "dead or unknown"))?;
        agent.atp += delta;
        Ok(agent.atp)
    }

    /// Marks an agent dead and freezes its final statistics.
    pub(crate) fn mark_dead(&mut self, id: &AgentId, time: SimTime) -> Result<FinalStats, SimError> {
        let agent = self
            .agents
            .get_mut(id)
            .filter(|a| a.alive)
            .ok_or_else(|| SimError::lifecycle(time, id.as_str(), "already dead"))?;
        agent.alive = false;
        let stats = FinalStats {
            atp: agent.atp.max(0.0),
            atp_unclamped: agent.atp,
            reputation: agent.reputation,
            cooperation_rate: agent.cooperation_rate(),
            interactions: agent.interactions,
            died_at: time,
        };
        agent.atp = stats.atp;
        agent.final_stats = Some(stats.clone());
        Ok(stats)
    }

    /// Moves a dead agent to the permanent archive.
    pub(crate) fn archive(&mut self, id: &AgentId, time: SimTime) -> Result<(), SimError> {
        match self.agents.remove(id) {
            Some(agent) if !agent.alive => {
                self.archived.insert(id.clone(), agent);
                Ok(())
            }
            Some(agent) => {
                // Put it back; archiving a living agent is an invariant break.
                self.agents.insert(id.clone(), agent);
                Err(SimError::lifecycle(time, id.as_str(), "still alive"))
            }
            None => Err(SimError::lifecycle(time, id.as_str(), "unknown")),
        }
    }

    /// Serialized form used by rollback and no-mutation checks.
    pub fn state_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("registry serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_agent(lineage: u32, strategy: StrategyKind) -> Agent {
        Agent::first_generation(LineageId(lineage), format!("A{}", lineage), strategy, 100.0, 0.5)
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent(0, StrategyKind::Cooperator)).unwrap();
        let result = registry.insert(test_agent(0, StrategyKind::Defector));
        assert!(matches!(result, Err(ConfigError::DuplicateName(_))));
    }

    #[test]
    fn test_alive_iteration_is_sorted_and_excludes_dead() {
        let mut registry = AgentRegistry::new();
        for i in 0..3 {
            registry.insert(test_agent(i, StrategyKind::Cooperator)).unwrap();
        }
        let victim = AgentId::new(LineageId(1), 0);
        registry.adjust_atp(&victim, -200.0, SimTime::start()).unwrap();
        registry.mark_dead(&victim, SimTime::start()).unwrap();

        let alive = registry.alive_ids();
        assert_eq!(alive.len(), 2);
        assert!(alive.windows(2).all(|w| w[0] < w[1]));
        assert!(!alive.contains(&victim));
    }

    #[test]
    fn test_mark_dead_freezes_clamped_stats() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent(0, StrategyKind::Cooperator)).unwrap();
        let id = AgentId::new(LineageId(0), 0);
        registry.adjust_atp(&id, -103.5, SimTime::start()).unwrap();
        let stats = registry.mark_dead(&id, SimTime::new(1, 2, 3)).unwrap();

        assert_eq!(stats.atp, 0.0);
        assert_eq!(stats.atp_unclamped, -3.5);
        assert_eq!(stats.died_at, SimTime::new(1, 2, 3));
        assert!(!registry.get(&id).unwrap().alive);
    }

    #[test]
    fn test_atp_adjustment_rejects_dead_agents() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent(0, StrategyKind::Cooperator)).unwrap();
        let id = AgentId::new(LineageId(0), 0);
        registry.adjust_atp(&id, -100.0, SimTime::start()).unwrap();
        registry.mark_dead(&id, SimTime::start()).unwrap();

        let result = registry.adjust_atp(&id, 5.0, SimTime::start());
        assert!(matches!(result, Err(SimError::LifecycleInvariant { .. })));
    }

    #[test]
    fn test_archive_requires_death() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent(0, StrategyKind::Cooperator)).unwrap();
        let id = AgentId::new(LineageId(0), 0);

        assert!(registry.archive(&id, SimTime::start()).is_err());
        registry.adjust_atp(&id, -100.0, SimTime::start()).unwrap();
        registry.mark_dead(&id, SimTime::start()).unwrap();
        registry.archive(&id, SimTime::start()).unwrap();

        assert_eq!(registry.archived_count(), 1);
        assert!(registry.get(&id).is_some());
        assert!(!registry.is_current_and_alive(&id));
    }

    #[test]
    fn test_state_bytes_stable_without_mutation() {
        let mut registry = AgentRegistry::new();
        registry.insert(test_agent(0, StrategyKind::Adaptive)).unwrap();
        let before = registry.state_bytes();
        let _ = registry.alive_agents();
        let _ = registry.get(&AgentId::new(LineageId(0), 0));
        assert_eq!(before, registry.state_bytes());
    }
}
