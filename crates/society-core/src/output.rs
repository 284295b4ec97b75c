//! Snapshot & Metrics Output
//!
//! Builds the read-only snapshots external collaborators consume and
//! writes them to disk. Nothing here mutates simulation state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use society_events::{
    generate_snapshot_id, AgentSnapshot, CoalitionSnapshot, SimTime, SocietyMetrics,
    SocietySnapshot,
};

use crate::coalition::CoalitionRegistry;
use crate::recorder::EventRecorder;
use crate::registry::AgentRegistry;
use crate::trust::TrustGraph;

/// Lifetime counters the scheduler accumulates across the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounters {
    pub total_interactions: u64,
    pub total_cooperations: u64,
    pub total_defections: u64,
    pub rebirths: usize,
    pub outcome_mutual_cooperation: u64,
    pub outcome_mutual_defection: u64,
    pub outcome_exploited: u64,
}

impl RunCounters {
    /// Fraction of committed actions that were cooperations.
    pub fn cooperation_rate(&self) -> f64 {
        let total = self.total_cooperations + self.total_defections;
        if total == 0 {
            0.0
        } else {
            self.total_cooperations as f64 / total as f64
        }
    }
}

/// Computes aggregate metrics from current state plus run counters.
pub fn compute_metrics(
    time: SimTime,
    registry: &AgentRegistry,
    trust: &TrustGraph,
    coalitions: &CoalitionRegistry,
    counters: &RunCounters,
) -> SocietyMetrics {
    let alive: Vec<_> = registry.alive_agents();
    let alive_count = alive.len();
    let total_atp: f64 = alive.iter().map(|a| a.atp).sum();
    let mean_atp = if alive_count == 0 {
        0.0
    } else {
        total_atp / alive_count as f64
    };
    let mean_reputation = if alive_count == 0 {
        0.0
    } else {
        alive.iter().map(|a| a.reputation).sum::<f64>() / alive_count as f64
    };

    let dead_count = registry.agents().filter(|a| !a.alive).count() + registry.archived_count();
    let in_coalition = alive
        .iter()
        .filter(|a| coalitions.coalition_of(&a.id).is_some())
        .count();

    let mut outcome_counts = HashMap::new();
    outcome_counts.insert(
        "mutual_cooperation".to_string(),
        counters.outcome_mutual_cooperation,
    );
    outcome_counts.insert(
        "mutual_defection".to_string(),
        counters.outcome_mutual_defection,
    );
    outcome_counts.insert("exploited".to_string(), counters.outcome_exploited);

    SocietyMetrics {
        time,
        alive_count,
        dead_count,
        permanent_deaths: registry.archived_count(),
        rebirths: counters.rebirths,
        total_interactions: counters.total_interactions,
        cooperation_rate: counters.cooperation_rate(),
        total_atp,
        mean_atp,
        mean_reputation,
        mean_trust: trust.mean_trust(),
        coalition_count: coalitions.count(),
        coalition_coverage: if alive_count == 0 {
            0.0
        } else {
            in_coalition as f64 / alive_count as f64
        },
        outcome_counts,
    }
}

/// Builds a full society snapshot.
pub fn build_snapshot(
    sequence: u64,
    time: SimTime,
    trigger: &str,
    registry: &AgentRegistry,
    trust: &TrustGraph,
    coalitions: &CoalitionRegistry,
    metrics: SocietyMetrics,
) -> SocietySnapshot {
    let agents = registry
        .agents()
        .chain(registry.archived())
        .map(|agent| AgentSnapshot {
            agent_id: agent.id.0.clone(),
            name: agent.name.clone(),
            lineage: agent.lineage.0,
            generation: agent.generation,
            strategy: agent.strategy.to_string(),
            alive: agent.alive,
            atp: agent.atp,
            reputation: agent.reputation,
            karma: agent.karma,
            coalition: coalitions.coalition_of(&agent.id).map(|c| c.id.clone()),
            interactions: agent.interactions,
            cooperations: agent.cooperations,
            defections: agent.defections,
            trust_toward: trust
                .edges_from(&agent.id)
                .into_iter()
                .map(|(id, v)| (id.0, v))
                .collect(),
        })
        .collect();

    let coalitions = coalitions
        .coalitions()
        .iter()
        .map(|c| CoalitionSnapshot {
            coalition_id: c.id.clone(),
            members: c.members.iter().map(|m| m.0.clone()).collect(),
            formed_epoch: c.formed_epoch,
            min_mutual_trust: c.min_mutual_trust,
        })
        .collect();

    SocietySnapshot {
        snapshot_id: generate_snapshot_id(sequence),
        time,
        trigger: trigger.to_string(),
        agents,
        coalitions,
        metrics,
    }
}

/// Writes a snapshot as pretty JSON into `dir`, returning the path.
pub fn write_snapshot(dir: impl AsRef<Path>, snapshot: &SocietySnapshot) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir.as_ref())?;
    let path = dir.as_ref().join(format!("{}.json", snapshot.snapshot_id));
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Writes final metrics as pretty JSON.
pub fn write_metrics(path: impl AsRef<Path>, metrics: &SocietyMetrics) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(metrics)?;
    fs::write(path, json)
}

/// Writes the whole event log as JSON, for consumers that did not tail the
/// JSONL sink.
pub fn write_event_log(path: impl AsRef<Path>, recorder: &EventRecorder) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(recorder.events())?;
    fs::write(path, json)
}
