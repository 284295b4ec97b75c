//! Lifecycle Manager
//!
//! Death and rebirth. An agent whose ATP reaches zero dies in the same
//! scheduler step; if its reputation at death clears the rebirth
//! threshold, the lineage continues into a new generation seeded from the
//! predecessor's final values by the configured karma fractions. Otherwise
//! the agent is archived and never reconsidered.

use tracing::{debug, info};

use society_events::{SimTime, SocietyEventKind};

use crate::config::{LifecycleParams, RebirthTieBreak};
use crate::error::SimError;
use crate::recorder::EventRecorder;
use crate::registry::{Agent, AgentId, AgentRegistry, FinalStats};
use crate::trust::TrustGraph;

/// What became of a dead agent.
#[derive(Debug, Clone, PartialEq)]
pub enum DeathResolution {
    /// The lineage continues under the returned successor id.
    Reborn(AgentId),
    /// Permanent death; the agent is archived.
    Archived,
}

/// Whether reputation at death clears the rebirth threshold under the
/// configured tie-break.
pub fn rebirth_eligible(reputation: f64, params: &LifecycleParams) -> bool {
    match params.tie_break {
        RebirthTieBreak::GreaterOrEqual => reputation >= params.rebirth_threshold,
        RebirthTieBreak::StrictlyGreater => reputation > params.rebirth_threshold,
    }
}

/// Successor ATP from the predecessor's frozen final balance.
///
/// Exactly `final_atp x atp_fraction` when that is viable; death freezes
/// ATP at or below zero in practice, so the configured floor provides the
/// actual seed in the common case. No rounding is applied beyond f64
/// multiplication.
pub fn karma_seed_atp(final_atp: f64, params: &LifecycleParams) -> f64 {
    (final_atp.max(0.0) * params.karma_atp_fraction).max(params.rebirth_floor)
}

/// Processes a death detected after a committed interaction or transfer.
///
/// Marks the agent dead, freezes final statistics, and either spawns the
/// successor (same lineage, generation + 1, karma-scaled ATP/trust, same
/// pattern corpus) or archives the agent permanently.
pub fn process_death(
    registry: &mut AgentRegistry,
    trust: &mut TrustGraph,
    params: &LifecycleParams,
    id: &AgentId,
    time: SimTime,
    recorder: &mut EventRecorder,
) -> Result<DeathResolution, SimError> {
    let stats = registry.mark_dead(id, time)?;
    let (lineage, generation, name, strategy) = {
        let agent = registry
            .get(id)
            .ok_or_else(|| SimError::lifecycle(time, id.as_str(), "unknown"))?;
        (agent.lineage, agent.generation, agent.name.clone(), agent.strategy)
    };

    recorder.record(
        time,
        SocietyEventKind::AgentDied {
            agent_id: id.0.clone(),
            lineage: lineage.0,
            generation,
            final_reputation: stats.reputation,
        },
    );

    if !rebirth_eligible(stats.reputation, params) {
        debug!(
            agent = %id,
            reputation = stats.reputation,
            threshold = params.rebirth_threshold,
            "permanent death"
        );
        registry.archive(id, time)?;
        trust.remove_agent(id);
        recorder.record(
            time,
            SocietyEventKind::AgentArchived {
                agent_id: id.0.clone(),
                lineage: lineage.0,
                final_reputation: stats.reputation,
            },
        );
        return Ok(DeathResolution::Archived);
    }

    let successor = successor_from(&stats, lineage, generation, name, strategy, params);
    let successor_id = successor.id.clone();
    let seed_atp = successor.atp;
    registry.insert(successor).map_err(SimError::Config)?;
    trust.carry_over(id, &successor_id, params.karma_trust_fraction);

    info!(
        predecessor = %id,
        successor = %successor_id,
        seed_atp,
        "lineage reborn"
    );
    recorder.record(
        time,
        SocietyEventKind::AgentReborn {
            predecessor_id: id.0.clone(),
            successor_id: successor_id.0.clone(),
            lineage: lineage.0,
            generation: generation + 1,
            seed_atp,
        },
    );

    Ok(DeathResolution::Reborn(successor_id))
}

fn successor_from(
    stats: &FinalStats,
    lineage: crate::registry::LineageId,
    generation: u32,
    name: String,
    strategy: crate::decision::StrategyKind,
    params: &LifecycleParams,
) -> Agent {
    let generation = generation + 1;
    Agent {
        id: AgentId::new(lineage, generation),
        name,
        lineage,
        generation,
        strategy,
        atp: karma_seed_atp(stats.atp, params),
        reputation: (stats.reputation * params.karma_trust_fraction).clamp(0.0, 1.0),
        karma: stats.reputation,
        alive: true,
        interactions: 0,
        cooperations: 0,
        defections: 0,
        final_stats: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustParams;
    use crate::decision::StrategyKind;
    use crate::registry::LineageId;
    use society_events::Action;

    fn id(n: u32) -> AgentId {
        AgentId::new(LineageId(n), 0)
    }

    fn setup(reputation: f64) -> (AgentRegistry, TrustGraph, EventRecorder) {
        let mut registry = AgentRegistry::new();
        for i in 0..2 {
            let mut agent = Agent::first_generation(
                LineageId(i),
                format!("A{}", i),
                StrategyKind::Reciprocator,
                100.0,
                reputation,
            );
            agent.reputation = reputation;
            registry.insert(agent).unwrap();
        }
        (registry, TrustGraph::new(0.5), EventRecorder::new())
    }

    fn kill(registry: &mut AgentRegistry, target: &AgentId) {
        registry.adjust_atp(target, -103.0, SimTime::start()).unwrap();
    }

    #[test]
    fn test_rebirth_tie_break_at_threshold() {
        let inclusive = LifecycleParams::default();
        assert!(rebirth_eligible(0.5, &inclusive));
        assert!(!rebirth_eligible(0.499999, &inclusive));

        let strict = LifecycleParams {
            tie_break: RebirthTieBreak::StrictlyGreater,
            ..LifecycleParams::default()
        };
        assert!(!rebirth_eligible(0.5, &strict));
        assert!(rebirth_eligible(0.500001, &strict));
        assert!(!rebirth_eligible(0.499999, &strict));
    }

    #[test]
    fn test_karma_seed_is_exact_fraction_above_floor() {
        let params = LifecycleParams {
            karma_atp_fraction: 0.5,
            rebirth_floor: 10.0,
            ..LifecycleParams::default()
        };
        assert_eq!(karma_seed_atp(80.0, &params), 40.0);
        // At or below zero the floor takes over.
        assert_eq!(karma_seed_atp(0.0, &params), 10.0);
        assert_eq!(karma_seed_atp(-3.5, &params), 10.0);
    }

    #[test]
    fn test_eligible_death_spawns_successor_with_lineage() {
        let (mut registry, mut trust, mut recorder) = setup(0.8);
        let trust_params = TrustParams::default();
        for _ in 0..10 {
            trust.observe(&id(1), &id(0), Action::Cooperate, 0, &trust_params);
        }
        let inbound_before = trust.trust(&id(1), &id(0));
        kill(&mut registry, &id(0));

        let params = LifecycleParams::default();
        let resolution = process_death(
            &mut registry,
            &mut trust,
            &params,
            &id(0),
            SimTime::new(2, 3, 1),
            &mut recorder,
        )
        .unwrap();

        let DeathResolution::Reborn(successor_id) = resolution else {
            panic!("expected rebirth");
        };
        let successor = registry.get(&successor_id).unwrap();
        assert_eq!(successor.lineage, LineageId(0));
        assert_eq!(successor.generation, 1);
        assert_eq!(successor.atp, params.rebirth_floor);
        assert_eq!(successor.karma, 0.8);
        assert!(successor.alive);

        // Inbound trust carried over at the karma fraction.
        let inbound_after = trust.trust(&id(1), &successor_id);
        assert!((inbound_after - inbound_before * params.karma_trust_fraction).abs() < 1e-12);

        // The predecessor is dead but not archived (its lineage continues).
        assert!(!registry.get(&id(0)).unwrap().alive);
        assert_eq!(registry.archived_count(), 0);

        let counts = recorder.counts_by_tag();
        assert_eq!(counts.get("agent_died"), Some(&1));
        assert_eq!(counts.get("agent_reborn"), Some(&1));
    }

    #[test]
    fn test_ineligible_death_is_archived_permanently() {
        let (mut registry, mut trust, mut recorder) = setup(0.2);
        kill(&mut registry, &id(0));

        let resolution = process_death(
            &mut registry,
            &mut trust,
            &LifecycleParams::default(),
            &id(0),
            SimTime::start(),
            &mut recorder,
        )
        .unwrap();

        assert_eq!(resolution, DeathResolution::Archived);
        assert_eq!(registry.archived_count(), 1);
        assert_eq!(registry.alive_count(), 1);
        assert!(!registry.is_current_and_alive(&id(0)));
        assert_eq!(
            recorder.counts_by_tag().get("agent_archived"),
            Some(&1)
        );
    }

    #[test]
    fn test_boundary_reputation_exactly_at_threshold() {
        // 0.5 with the default inclusive tie-break is reborn.
        let (mut registry, mut trust, mut recorder) = setup(0.5);
        kill(&mut registry, &id(0));
        let resolution = process_death(
            &mut registry,
            &mut trust,
            &LifecycleParams::default(),
            &id(0),
            SimTime::start(),
            &mut recorder,
        )
        .unwrap();
        assert!(matches!(resolution, DeathResolution::Reborn(_)));

        // 0.499999 is archived.
        let (mut registry, mut trust, mut recorder) = setup(0.499999);
        kill(&mut registry, &id(0));
        let resolution = process_death(
            &mut registry,
            &mut trust,
            &LifecycleParams::default(),
            &id(0),
            SimTime::start(),
            &mut recorder,
        )
        .unwrap();
        assert_eq!(resolution, DeathResolution::Archived);
    }

    #[test]
    fn test_successor_counters_start_fresh() {
        let (mut registry, mut trust, mut recorder) = setup(0.9);
        if let Some(agent) = registry.get_mut(&id(0)) {
            agent.interactions = 40;
            agent.cooperations = 30;
            agent.defections = 10;
        }
        kill(&mut registry, &id(0));
        let resolution = process_death(
            &mut registry,
            &mut trust,
            &LifecycleParams::default(),
            &id(0),
            SimTime::start(),
            &mut recorder,
        )
        .unwrap();
        let DeathResolution::Reborn(successor_id) = resolution else {
            panic!("expected rebirth");
        };
        let successor = registry.get(&successor_id).unwrap();
        assert_eq!(successor.interactions, 0);
        assert_eq!(successor.cooperation_rate(), 0.0);
    }
}
