//! Population Setup
//!
//! Builds the starting registry from a scenario's population spec.

use std::collections::HashMap;

use tracing::info;

use crate::config::ScenarioConfig;
use crate::error::ConfigError;
use crate::registry::{Agent, AgentRegistry};

/// Summary of the spawned population.
#[derive(Debug, Clone)]
pub struct SpawnSummary {
    pub total_agents: usize,
    pub by_strategy: HashMap<String, usize>,
}

/// Builds the starting registry. Every agent gets a fresh lineage and
/// starts at generation zero with the scenario's initial ATP; initial
/// reputation matches the initial trust level so the two signals agree
/// before any interaction.
pub fn build_registry(config: &ScenarioConfig) -> Result<(AgentRegistry, SpawnSummary), ConfigError> {
    let mut registry = AgentRegistry::new();
    let mut by_strategy: HashMap<String, usize> = HashMap::new();

    for spec in &config.population.agents {
        let lineage = registry.allocate_lineage();
        let agent = Agent::first_generation(
            lineage,
            spec.name.clone(),
            spec.strategy,
            config.population.initial_atp,
            config.population.initial_trust,
        );
        registry.insert(agent)?;
        *by_strategy.entry(spec.strategy.to_string()).or_insert(0) += 1;
    }

    let summary = SpawnSummary {
        total_agents: registry.alive_count(),
        by_strategy,
    };
    info!(
        scenario = %config.name,
        agents = summary.total_agents,
        "population spawned"
    );
    Ok((registry, summary))
}
