//! Game/Payoff Engine
//!
//! Resolves one pairwise encounter: classifies the outcome, applies the
//! configured ATP deltas to both participants atomically, delegates the
//! trust update to the trust model, refreshes both reputations, and
//! appends the immutable interaction record.

use society_events::{
    Action, InteractionRecord, Outcome, ParticipantRecord, SimTime, SocietyEventKind,
};

use crate::config::{PayoffMatrix, TrustParams};
use crate::error::SimError;
use crate::recorder::EventRecorder;
use crate::registry::{AgentId, AgentRegistry};
use crate::trust::TrustGraph;

/// Resolves one encounter between two distinct alive agents.
///
/// Both ATP deltas commit together; the interaction is never half-applied.
/// Returns the committed record; the caller owns death processing for any
/// participant whose balance reached zero.
#[allow(clippy::too_many_arguments)]
pub fn resolve(
    registry: &mut AgentRegistry,
    trust: &mut TrustGraph,
    recorder: &mut EventRecorder,
    payoff: &PayoffMatrix,
    trust_params: &TrustParams,
    first_id: &AgentId,
    first_action: Action,
    second_id: &AgentId,
    second_action: Action,
    time: SimTime,
) -> Result<InteractionRecord, SimError> {
    // Both participants must be the current, living generation of their
    // lineage; anything else is a scheduler invariant break.
    for id in [first_id, second_id] {
        if !registry.is_current_and_alive(id) {
            return Err(SimError::lifecycle(time, id.as_str(), "dead or stale generation"));
        }
    }
    if first_id == second_id {
        return Err(SimError::lifecycle(time, first_id.as_str(), "paired with itself"));
    }

    let first_delta = payoff.delta(first_action, second_action);
    let second_delta = payoff.delta(second_action, first_action);

    // Commit ATP atomically: both registry writes happen before anything
    // else can observe the interaction.
    registry.adjust_atp(first_id, first_delta, time)?;
    registry.adjust_atp(second_id, second_delta, time)?;

    // Trust moves from each participant's view of what the partner did.
    let first_trust_delta =
        trust.observe(first_id, second_id, second_action, time.round, trust_params);
    let second_trust_delta =
        trust.observe(second_id, first_id, first_action, time.round, trust_params);

    // Counters and smoothed reputations.
    for (id, action) in [(first_id, first_action), (second_id, second_action)] {
        if let Some(agent) = registry.get_mut(id) {
            agent.record_action(action.is_cooperation());
        }
        let (current, coop_rate) = {
            let agent = registry
                .get(id)
                .ok_or_else(|| SimError::lifecycle(time, id.as_str(), "unknown"))?;
            (agent.reputation, agent.cooperation_rate())
        };
        let updated = trust.updated_reputation(id, current, coop_rate, trust_params);
        if let Some(agent) = registry.get_mut(id) {
            agent.reputation = updated;
        }
    }

    let record = InteractionRecord {
        time,
        first: ParticipantRecord {
            agent_id: first_id.0.clone(),
            action: first_action,
            outcome: Outcome::classify(first_action, second_action),
            atp_delta: first_delta,
            trust_delta: first_trust_delta,
        },
        second: ParticipantRecord {
            agent_id: second_id.0.clone(),
            action: second_action,
            outcome: Outcome::classify(second_action, first_action),
            atp_delta: second_delta,
            trust_delta: second_trust_delta,
        },
    };

    recorder.record(
        time,
        SocietyEventKind::InteractionResolved {
            record: record.clone(),
        },
    );

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::StrategyKind;
    use crate::registry::{Agent, LineageId};

    fn setup() -> (AgentRegistry, TrustGraph, EventRecorder) {
        let mut registry = AgentRegistry::new();
        for (i, strategy) in [StrategyKind::Cooperator, StrategyKind::Defector]
            .iter()
            .enumerate()
        {
            registry
                .insert(Agent::first_generation(
                    LineageId(i as u32),
                    format!("A{}", i),
                    *strategy,
                    100.0,
                    0.5,
                ))
                .unwrap();
        }
        (registry, TrustGraph::new(0.5), EventRecorder::new())
    }

    fn id(n: u32) -> AgentId {
        AgentId::new(LineageId(n), 0)
    }

    #[test]
    fn test_atp_deltas_match_matrix_net_exactly() {
        let (mut registry, mut trust, mut recorder) = setup();
        let payoff = PayoffMatrix::default();
        let trust_params = TrustParams::default();

        let record = resolve(
            &mut registry,
            &mut trust,
            &mut recorder,
            &payoff,
            &trust_params,
            &id(0),
            Action::Cooperate,
            &id(1),
            Action::Defect,
            SimTime::start(),
        )
        .unwrap();

        assert_eq!(record.net_atp(), payoff.net(Action::Cooperate, Action::Defect));
        assert_eq!(record.first.atp_delta, payoff.sucker);
        assert_eq!(record.second.atp_delta, payoff.temptation);

        let a = registry.get(&id(0)).unwrap();
        let b = registry.get(&id(1)).unwrap();
        assert!(!a.atp.is_nan() && !b.atp.is_nan());
        assert_eq!(a.atp, 100.0 + payoff.sucker);
        assert_eq!(b.atp, 100.0 + payoff.temptation);
    }

    #[test]
    fn test_outcome_classification_per_participant() {
        let (mut registry, mut trust, mut recorder) = setup();
        let record = resolve(
            &mut registry,
            &mut trust,
            &mut recorder,
            &PayoffMatrix::default(),
            &TrustParams::default(),
            &id(0),
            Action::Cooperate,
            &id(1),
            Action::Defect,
            SimTime::start(),
        )
        .unwrap();

        assert_eq!(record.first.outcome, Outcome::Exploited);
        assert_eq!(record.second.outcome, Outcome::Exploiting);
    }

    #[test]
    fn test_defection_decreases_partner_trust() {
        let (mut registry, mut trust, mut recorder) = setup();
        let before = trust.trust(&id(0), &id(1));
        resolve(
            &mut registry,
            &mut trust,
            &mut recorder,
            &PayoffMatrix::default(),
            &TrustParams::default(),
            &id(0),
            Action::Cooperate,
            &id(1),
            Action::Defect,
            SimTime::start(),
        )
        .unwrap();

        // The cooperator's trust toward the defector dropped; the
        // defector's trust toward the cooperator rose.
        assert!(trust.trust(&id(0), &id(1)) < before);
        assert!(trust.trust(&id(1), &id(0)) > before);
    }

    #[test]
    fn test_record_is_appended_once() {
        let (mut registry, mut trust, mut recorder) = setup();
        resolve(
            &mut registry,
            &mut trust,
            &mut recorder,
            &PayoffMatrix::default(),
            &TrustParams::default(),
            &id(0),
            Action::Cooperate,
            &id(1),
            Action::Cooperate,
            SimTime::start(),
        )
        .unwrap();
        assert_eq!(recorder.event_count(), 1);
        assert_eq!(recorder.events()[0].kind.tag(), "interaction_resolved");
    }

    #[test]
    fn test_dead_participant_is_a_fatal_invariant() {
        let (mut registry, mut trust, mut recorder) = setup();
        registry.adjust_atp(&id(1), -100.0, SimTime::start()).unwrap();
        registry.mark_dead(&id(1), SimTime::start()).unwrap();

        let result = resolve(
            &mut registry,
            &mut trust,
            &mut recorder,
            &PayoffMatrix::default(),
            &TrustParams::default(),
            &id(0),
            Action::Cooperate,
            &id(1),
            Action::Defect,
            SimTime::new(0, 0, 1),
        );
        assert!(matches!(result, Err(SimError::LifecycleInvariant { .. })));
        // Nothing was committed.
        assert_eq!(registry.get(&id(0)).unwrap().atp, 100.0);
        assert_eq!(recorder.event_count(), 0);
    }

    #[test]
    fn test_reputation_stays_in_bounds_over_many_rounds() {
        let (mut registry, mut trust, mut recorder) = setup();
        for i in 0..200 {
            let time = SimTime::new(0, i, 0);
            resolve(
                &mut registry,
                &mut trust,
                &mut recorder,
                &PayoffMatrix::default(),
                &TrustParams::default(),
                &id(0),
                Action::Cooperate,
                &id(1),
                Action::Defect,
                time,
            )
            .unwrap();
            // Defector keeps gaining, cooperator is drained below zero
            // eventually; stop before the death boundary.
            if registry.get(&id(0)).unwrap().atp <= 5.0 {
                break;
            }
            for agent_id in [id(0), id(1)] {
                let rep = registry.get(&agent_id).unwrap().reputation;
                assert!((0.0..=1.0).contains(&rep));
            }
        }
    }
}
