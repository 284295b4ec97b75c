//! Interaction Scheduler
//!
//! The top-level driver: epochs of rounds of pairwise interactions, fully
//! serialized. Each tick selects a pair of distinct alive agents, collects
//! both decisions, and commits the encounter through the payoff engine.
//! When the human-controlled agent is selected the scheduler does not
//! block: it creates a decision frame and yields control to the embedding
//! driver, resuming only after a decision is submitted through
//! `submit_decision`.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, info};

use society_events::{
    Action, InteractionRecord, Outcome, RunEndReason, SimTime, SocietyEventKind, SocietySnapshot,
};

use crate::coalition::CoalitionRegistry;
use crate::config::ScenarioConfig;
use crate::decision::{decide, DecisionContext, DecisionFrame, HumanSlot};
use crate::error::{SimError, StateError};
use crate::game;
use crate::lifecycle::{self, DeathResolution};
use crate::output::{self, RunCounters};
use crate::patterns::{Fingerprint, PatternStore};
use crate::recorder::EventRecorder;
use crate::registry::{AgentId, AgentRegistry};
use crate::setup;
use crate::trust::TrustGraph;

/// What the driver should do after a call to `run`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// The run is over; final state is available through the accessors.
    Finished(RunEndReason),
    /// The run is suspended awaiting a human decision for this frame.
    AwaitingHuman(DecisionFrame),
}

/// An interaction that was half-prepared when the human slot suspended.
///
/// Holds only derived, pre-interaction data; no shared state has been
/// mutated, so dropping this on cancellation is always safe.
#[derive(Debug, Clone)]
struct PendingInteraction {
    frame_id: String,
    human_id: AgentId,
    partner_id: AgentId,
    partner_action: Action,
    human_fingerprint: Fingerprint,
    partner_fingerprint: Fingerprint,
    /// Whether the human is the first participant in commit order.
    human_is_first: bool,
}

/// Drives the whole simulation. Owns the shared mutable resources (agent
/// registry and trust-edge table) plus every derived store.
pub struct Scheduler {
    config: ScenarioConfig,
    registry: AgentRegistry,
    trust: TrustGraph,
    patterns: PatternStore,
    coalitions: CoalitionRegistry,
    recorder: EventRecorder,
    human: HumanSlot,
    rng: SmallRng,
    time: SimTime,
    counters: RunCounters,
    interactions: Vec<InteractionRecord>,
    snapshots: Vec<SocietySnapshot>,
    snapshot_seq: u64,
    /// Last action each actor played against each target, for reciprocity.
    last_action: BTreeMap<(AgentId, AgentId), Action>,
    pending: Option<PendingInteraction>,
    /// Set when a pending interaction was cancelled and its slot must be
    /// skipped on the next drive.
    skip_current_slot: bool,
    finished: Option<RunEndReason>,
}

impl Scheduler {
    /// Builds a scheduler for a validated scenario with an in-memory
    /// event recorder.
    pub fn new(config: ScenarioConfig, seed: u64) -> Result<Self, SimError> {
        Self::with_recorder(config, seed, EventRecorder::new())
    }

    /// Builds a scheduler with a caller-provided recorder (e.g. one with a
    /// JSONL sink).
    pub fn with_recorder(
        config: ScenarioConfig,
        seed: u64,
        recorder: EventRecorder,
    ) -> Result<Self, SimError> {
        config.validate().map_err(SimError::Config)?;
        let (registry, summary) = setup::build_registry(&config).map_err(SimError::Config)?;
        info!(
            scenario = %config.name,
            seed,
            agents = summary.total_agents,
            "scheduler initialized"
        );
        let trust = TrustGraph::new(config.population.initial_trust);
        Ok(Self {
            config,
            registry,
            trust,
            patterns: PatternStore::new(),
            coalitions: CoalitionRegistry::new(),
            recorder,
            human: HumanSlot::new(),
            rng: SmallRng::seed_from_u64(seed),
            time: SimTime::start(),
            counters: RunCounters::default(),
            interactions: Vec::new(),
            snapshots: Vec::new(),
            snapshot_seq: 0,
            last_action: BTreeMap::new(),
            pending: None,
            skip_current_slot: false,
            finished: None,
        })
    }

    /// Drives the run until it finishes or suspends for a human decision.
    ///
    /// Never blocks: a pending human frame is returned to the caller, who
    /// submits through `submit_decision` and calls `run` again.
    pub fn run(&mut self) -> Result<RunState, SimError> {
        loop {
            if let Some(reason) = self.finished {
                return Ok(RunState::Finished(reason));
            }

            // Resume a resolved human decision before anything else.
            if let Some((frame_id, action)) = self.human.take_resolved() {
                self.execute_human_interaction(&frame_id, action)?;
                self.advance_interaction()?;
                continue;
            }
            if let Some(frame) = self.human.pending() {
                return Ok(RunState::AwaitingHuman(frame.clone()));
            }
            if self.skip_current_slot {
                self.skip_current_slot = false;
                self.advance_interaction()?;
                continue;
            }

            if self.time.epoch >= self.config.schedule.epochs {
                return self.finish(RunEndReason::Completed);
            }
            if self.registry.alive_count() < 2 {
                return self.finish(RunEndReason::PopulationExhausted);
            }

            match self.step_interaction()? {
                Some(frame) => return Ok(RunState::AwaitingHuman(frame)),
                None => self.advance_interaction()?,
            }
        }
    }

    /// Submission entry point for the pending human decision.
    ///
    /// Rejected as a no-op when no decision is pending or the frame is
    /// stale; nothing in shared state is mutated on rejection.
    pub fn submit_decision(&mut self, frame_id: &str, action: Action) -> Result<(), StateError> {
        self.human.submit(frame_id, action)?;
        self.recorder.record(
            self.time,
            SocietyEventKind::HumanDecisionSubmitted {
                frame_id: frame_id.to_string(),
            },
        );
        Ok(())
    }

    /// Cancels the pending human decision.
    ///
    /// The in-flight interaction has mutated nothing, so the agent
    /// registry and trust table are untouched; the interaction slot is
    /// skipped when the run is next driven.
    pub fn cancel_pending_decision(&mut self) -> Result<(), StateError> {
        let frame_id = self.human.cancel().ok_or(StateError::NoPendingDecision)?;
        self.pending = None;
        self.skip_current_slot = true;
        self.recorder.record(
            self.time,
            SocietyEventKind::HumanDecisionCancelled { frame_id },
        );
        Ok(())
    }

    /// The frame currently awaiting a human decision, if any.
    pub fn pending_decision(&self) -> Option<&DecisionFrame> {
        self.human.pending()
    }

    // --- accessors for external collaborators (read-only surfaces) ---

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn trust(&self) -> &TrustGraph {
        &self.trust
    }

    pub fn coalitions(&self) -> &CoalitionRegistry {
        &self.coalitions
    }

    /// Pattern corpus access for adaptive strategies and external
    /// assistants. Query/append only by construction of the store API.
    pub fn pattern_store(&self) -> &PatternStore {
        &self.patterns
    }

    pub fn pattern_store_mut(&mut self) -> &mut PatternStore {
        &mut self.patterns
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    pub fn interaction_log(&self) -> &[InteractionRecord] {
        &self.interactions
    }

    pub fn snapshots(&self) -> &[SocietySnapshot] {
        &self.snapshots
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Aggregate metrics over the current state.
    pub fn metrics(&self) -> society_events::SocietyMetrics {
        output::compute_metrics(
            self.time,
            &self.registry,
            &self.trust,
            &self.coalitions,
            &self.counters,
        )
    }

    // --- internals ---

    /// Runs one interaction slot. Returns a frame when the slot suspended
    /// for a human decision.
    fn step_interaction(&mut self) -> Result<Option<DecisionFrame>, SimError> {
        let (first, second) = self.select_pair()?;
        let first_ctx = self.context_for(&first, &second)?;
        let second_ctx = self.context_for(&second, &first)?;
        let first_strategy = self.strategy_of(&first)?;
        let second_strategy = self.strategy_of(&second)?;

        let first_decision = decide(first_strategy, &first_ctx, &self.config.decision);
        let second_decision = decide(second_strategy, &second_ctx, &self.config.decision);

        match (first_decision, second_decision) {
            (Some(a), Some(b)) => {
                self.commit_interaction(&first, a, &second, b)?;
                Ok(None)
            }
            (None, Some(partner_action)) => {
                Ok(Some(self.create_decision_frame(first_ctx, partner_action, true)))
            }
            (Some(partner_action), None) => {
                Ok(Some(self.create_decision_frame(second_ctx, partner_action, false)))
            }
            // Config validation caps the population at one human slot.
            (None, None) => Err(SimError::lifecycle(
                self.time,
                first.as_str(),
                "paired two human slots",
            )),
        }
    }

    /// First phase of the human protocol: derive the frame, park the
    /// prepared interaction, and suspend. No shared state is mutated.
    fn create_decision_frame(
        &mut self,
        human_ctx: DecisionContext,
        partner_action: Action,
        human_is_first: bool,
    ) -> DecisionFrame {
        let human_fingerprint = self.fingerprint_for(&human_ctx);
        let partner_fingerprint = Fingerprint::quantize(
            self.registry
                .get(&human_ctx.partner_id)
                .map(|a| a.atp)
                .unwrap_or(0.0),
            self.config.population.initial_atp,
            self.trust.effective_trust(
                &human_ctx.partner_id,
                &human_ctx.self_id,
                &self.config.trust,
            ),
        );

        let frame = DecisionFrame::from_context(self.time, &human_ctx);
        self.pending = Some(PendingInteraction {
            frame_id: frame.frame_id.clone(),
            human_id: human_ctx.self_id.clone(),
            partner_id: human_ctx.partner_id.clone(),
            partner_action,
            human_fingerprint,
            partner_fingerprint,
            human_is_first,
        });
        self.recorder.record(
            self.time,
            SocietyEventKind::HumanDecisionRequested {
                frame_id: frame.frame_id.clone(),
                agent_id: human_ctx.self_id.0.clone(),
                partner_id: human_ctx.partner_id.0.clone(),
            },
        );
        debug!(frame = %frame.frame_id, agent = %human_ctx.self_id, "awaiting human decision");
        self.human.begin(frame.clone());
        frame
    }

    /// Second phase of the human protocol: commit the parked interaction
    /// with the submitted action.
    fn execute_human_interaction(
        &mut self,
        frame_id: &str,
        human_action: Action,
    ) -> Result<(), SimError> {
        let pending = self
            .pending
            .take()
            .filter(|p| p.frame_id == frame_id)
            .ok_or(SimError::State(StateError::NoPendingDecision))?;

        let (first, first_action, second, second_action) = if pending.human_is_first {
            (
                pending.human_id.clone(),
                human_action,
                pending.partner_id.clone(),
                pending.partner_action,
            )
        } else {
            (
                pending.partner_id.clone(),
                pending.partner_action,
                pending.human_id.clone(),
                human_action,
            )
        };
        self.commit_prepared(
            &first,
            first_action,
            &second,
            second_action,
            if pending.human_is_first {
                (pending.human_fingerprint, pending.partner_fingerprint)
            } else {
                (pending.partner_fingerprint, pending.human_fingerprint)
            },
        )
    }

    /// Commits a fully scripted interaction.
    fn commit_interaction(
        &mut self,
        first: &AgentId,
        first_action: Action,
        second: &AgentId,
        second_action: Action,
    ) -> Result<(), SimError> {
        let first_ctx = self.context_for(first, second)?;
        let second_ctx = self.context_for(second, first)?;
        let fingerprints = (
            self.fingerprint_for(&first_ctx),
            self.fingerprint_for(&second_ctx),
        );
        self.commit_prepared(first, first_action, second, second_action, fingerprints)
    }

    /// The single commit path: payoff resolution, history, pattern
    /// recording, and same-step death processing.
    fn commit_prepared(
        &mut self,
        first: &AgentId,
        first_action: Action,
        second: &AgentId,
        second_action: Action,
        fingerprints: (Fingerprint, Fingerprint),
    ) -> Result<(), SimError> {
        let record = game::resolve(
            &mut self.registry,
            &mut self.trust,
            &mut self.recorder,
            &self.config.payoff,
            &self.config.trust,
            first,
            first_action,
            second,
            second_action,
            self.time,
        )?;

        self.last_action
            .insert((first.clone(), second.clone()), first_action);
        self.last_action
            .insert((second.clone(), first.clone()), second_action);

        self.counters.total_interactions += 1;
        for action in [first_action, second_action] {
            if action.is_cooperation() {
                self.counters.total_cooperations += 1;
            } else {
                self.counters.total_defections += 1;
            }
        }
        match (first_action, second_action) {
            (Action::Cooperate, Action::Cooperate) => {
                self.counters.outcome_mutual_cooperation += 1
            }
            (Action::Defect, Action::Defect) => self.counters.outcome_mutual_defection += 1,
            _ => self.counters.outcome_exploited += 1,
        }

        // Pattern learning: each lineage remembers its own side.
        for (id, fingerprint, action, partner_action) in [
            (first, fingerprints.0, first_action, second_action),
            (second, fingerprints.1, second_action, first_action),
        ] {
            if let Some(agent) = self.registry.get(id) {
                self.patterns.record_outcome(
                    agent.lineage,
                    fingerprint,
                    action,
                    Outcome::classify(action, partner_action),
                    self.time,
                );
            }
        }

        self.interactions.push(record);

        // Same-step death processing: a drained agent never reaches the
        // next pairing.
        for id in [first.clone(), second.clone()] {
            let dead = self
                .registry
                .get(&id)
                .map(|a| a.alive && a.atp <= 0.0)
                .unwrap_or(false);
            if dead {
                let resolution = lifecycle::process_death(
                    &mut self.registry,
                    &mut self.trust,
                    &self.config.lifecycle,
                    &id,
                    self.time,
                    &mut self.recorder,
                )?;
                if matches!(resolution, DeathResolution::Reborn(_)) {
                    self.counters.rebirths += 1;
                }
            }
        }
        Ok(())
    }

    /// Selects an unordered pair of distinct alive agents.
    fn select_pair(&mut self) -> Result<(AgentId, AgentId), SimError> {
        let alive = self.registry.alive_ids();
        debug_assert!(alive.len() >= 2);
        match self.config.pairing {
            crate::config::PairSelection::Uniform => {
                let i = self.rng.gen_range(0..alive.len());
                let mut j = self.rng.gen_range(0..alive.len() - 1);
                if j >= i {
                    j += 1;
                }
                Ok((alive[i].clone(), alive[j].clone()))
            }
            crate::config::PairSelection::TrustWeighted => {
                let mut pairs = Vec::new();
                let mut weights = Vec::new();
                for i in 0..alive.len() {
                    for j in (i + 1)..alive.len() {
                        let w = self.trust.trust(&alive[i], &alive[j])
                            + self.trust.trust(&alive[j], &alive[i]);
                        pairs.push((i, j));
                        weights.push(w.max(1e-6));
                    }
                }
                let index = weighted_select(&mut self.rng, &weights);
                let (i, j) = pairs[index];
                Ok((alive[i].clone(), alive[j].clone()))
            }
        }
    }

    /// Builds the decision context one agent sees for one interaction.
    fn context_for(
        &self,
        self_id: &AgentId,
        partner_id: &AgentId,
    ) -> Result<DecisionContext, SimError> {
        let agent = self
            .registry
            .get(self_id)
            .ok_or_else(|| SimError::lifecycle(self.time, self_id.as_str(), "unknown"))?;
        let partner = self
            .registry
            .get(partner_id)
            .ok_or_else(|| SimError::lifecycle(self.time, partner_id.as_str(), "unknown"))?;

        let trust_toward_partner =
            self.trust
                .effective_trust(self_id, partner_id, &self.config.trust);
        let fingerprint = Fingerprint::quantize(
            agent.atp,
            self.config.population.initial_atp,
            trust_toward_partner,
        );
        Ok(DecisionContext {
            self_id: self_id.clone(),
            partner_id: partner_id.clone(),
            self_atp: agent.atp,
            partner_reputation: partner.reputation,
            trust_toward_partner,
            trust_from_partner: self
                .trust
                .effective_trust(partner_id, self_id, &self.config.trust),
            partner_last_action: self
                .last_action
                .get(&(partner_id.clone(), self_id.clone()))
                .copied(),
            pattern_advice: self
                .patterns
                .query(agent.lineage, fingerprint, &self.config.patterns),
        })
    }

    fn fingerprint_for(&self, ctx: &DecisionContext) -> Fingerprint {
        Fingerprint::quantize(
            ctx.self_atp,
            self.config.population.initial_atp,
            ctx.trust_toward_partner,
        )
    }

    fn strategy_of(&self, id: &AgentId) -> Result<crate::decision::StrategyKind, SimError> {
        self.registry
            .get(id)
            .map(|a| a.strategy)
            .ok_or_else(|| SimError::lifecycle(self.time, id.as_str(), "unknown"))
    }

    /// Moves the clock forward one slot, running round- and epoch-boundary
    /// work as boundaries are crossed.
    fn advance_interaction(&mut self) -> Result<(), SimError> {
        self.time = self.time.next_interaction();
        if self.time.interaction < self.config.schedule.interactions_per_round {
            return Ok(());
        }

        // Round boundary: coalition support and optional trust decay.
        self.coalitions.grant_support(
            &mut self.registry,
            &self.config.coalition,
            self.time,
            &mut self.recorder,
        )?;
        self.trust.decay_idle(self.time.round, &self.config.trust);
        // Support can drain a donor only down to the critical threshold,
        // never to zero, so no death check is needed here.

        self.time = self.time.next_round();
        if self.time.round < self.config.schedule.rounds_per_epoch {
            return Ok(());
        }

        // Epoch boundary: wholesale coalition recompute, then snapshot.
        let completed_epoch = self.time.epoch;
        self.coalitions.recompute(
            &self.registry,
            &self.trust,
            &self.config.coalition,
            completed_epoch,
            self.time,
            &mut self.recorder,
        );
        self.take_snapshot("epoch_boundary");
        self.time = self.time.next_epoch();
        Ok(())
    }

    fn take_snapshot(&mut self, trigger: &str) {
        let metrics = self.metrics();
        let snapshot = output::build_snapshot(
            self.snapshot_seq,
            self.time,
            trigger,
            &self.registry,
            &self.trust,
            &self.coalitions,
            metrics,
        );
        self.snapshot_seq += 1;
        self.snapshots.push(snapshot);
    }

    fn finish(&mut self, reason: RunEndReason) -> Result<RunState, SimError> {
        self.finished = Some(reason);
        self.recorder
            .record(self.time, SocietyEventKind::RunEnded { reason });
        self.take_snapshot("run_end");
        info!(?reason, time = %self.time, "run finished");
        Ok(RunState::Finished(reason))
    }
}

/// Weighted index selection over non-negative weights.
fn weighted_select(rng: &mut SmallRng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let r: f64 = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if r < cumulative {
            return i;
        }
    }
    weights.len() - 1
}
