//! Scenario Configuration
//!
//! A scenario fully determines a run: population composition, payoff
//! matrix, trust dynamics, lifecycle/karma rules, coalition rules, and the
//! epoch/round/interaction schedule. Scenarios come from named presets or
//! from a TOML file, and are validated before any simulation step executes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::decision::StrategyKind;
use crate::error::ConfigError;

/// Complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name, echoed in logs and snapshots.
    #[serde(default = "default_name")]
    pub name: String,
    pub population: PopulationSpec,
    #[serde(default)]
    pub payoff: PayoffMatrix,
    #[serde(default)]
    pub trust: TrustParams,
    #[serde(default)]
    pub lifecycle: LifecycleParams,
    #[serde(default)]
    pub coalition: CoalitionParams,
    #[serde(default)]
    pub patterns: PatternParams,
    #[serde(default)]
    pub decision: DecisionParams,
    #[serde(default)]
    pub schedule: ScheduleParams,
    #[serde(default)]
    pub pairing: PairSelection,
}

fn default_name() -> String {
    "custom".to_string()
}

/// Starting population composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSpec {
    pub agents: Vec<AgentSpec>,
    /// ATP every first-generation agent starts with.
    #[serde(default = "default_initial_atp")]
    pub initial_atp: f64,
    /// Default value of a directed trust edge before any interaction.
    #[serde(default = "default_initial_trust")]
    pub initial_trust: f64,
}

fn default_initial_atp() -> f64 {
    100.0
}

fn default_initial_trust() -> f64 {
    0.5
}

/// One starting agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub strategy: StrategyKind,
}

/// The 2x2 payoff matrix, as ATP deltas per role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoffMatrix {
    /// Delta for each participant when both cooperate.
    pub reward: f64,
    /// Delta for each participant when both defect.
    pub punishment: f64,
    /// Delta for a cooperator whose partner defected.
    pub sucker: f64,
    /// Delta for a defector whose partner cooperated.
    pub temptation: f64,
}

impl Default for PayoffMatrix {
    fn default() -> Self {
        Self {
            reward: 3.0,
            punishment: -1.0,
            sucker: -2.0,
            temptation: 5.0,
        }
    }
}

impl PayoffMatrix {
    /// ATP delta for a participant who played `own` against `partner`.
    pub fn delta(&self, own: society_events::Action, partner: society_events::Action) -> f64 {
        use society_events::Action::*;
        match (own, partner) {
            (Cooperate, Cooperate) => self.reward,
            (Defect, Defect) => self.punishment,
            (Cooperate, Defect) => self.sucker,
            (Defect, Cooperate) => self.temptation,
        }
    }

    /// Matrix-defined net for the pair of actions, used by conservation checks.
    pub fn net(&self, a: society_events::Action, b: society_events::Action) -> f64 {
        self.delta(a, b) + self.delta(b, a)
    }
}

/// Trust dynamics parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustParams {
    /// Additive step toward 1.0 when the partner cooperated.
    pub gain_step: f64,
    /// Additive step toward 0.0 when the partner defected.
    pub loss_step: f64,
    /// Weight of inbound trust vs cooperation rate in reputation.
    pub reputation_trust_weight: f64,
    /// Smoothing factor for reputation updates (0 = frozen, 1 = no memory).
    pub reputation_smoothing: f64,
    /// Multiplicative per-round decay for pairs that did not interact.
    /// 1.0 disables decay.
    pub idle_decay: f64,
    /// Scale effective trust by the partner's behavioral consistency.
    pub coherence_modulation: bool,
}

impl Default for TrustParams {
    fn default() -> Self {
        Self {
            gain_step: 0.08,
            loss_step: 0.15,
            reputation_trust_weight: 0.6,
            reputation_smoothing: 0.3,
            idle_decay: 1.0,
            coherence_modulation: false,
        }
    }
}

/// Death, rebirth, and karma parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleParams {
    /// Minimum reputation at death for rebirth.
    pub rebirth_threshold: f64,
    /// Whether reputation exactly at the threshold qualifies.
    pub tie_break: RebirthTieBreak,
    /// Fraction of frozen final ATP carried into the successor.
    pub karma_atp_fraction: f64,
    /// Fraction of final trust edges and reputation carried over.
    pub karma_trust_fraction: f64,
    /// Minimum ATP a successor is seeded with. Death freezes ATP at or
    /// below zero, so the bare fraction alone would produce a stillborn
    /// successor; the floor keeps the lineage viable.
    pub rebirth_floor: f64,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self {
            rebirth_threshold: 0.5,
            tie_break: RebirthTieBreak::GreaterOrEqual,
            karma_atp_fraction: 0.5,
            karma_trust_fraction: 0.5,
            rebirth_floor: 20.0,
        }
    }
}

/// Boundary rule for the rebirth threshold comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebirthTieBreak {
    /// Reputation exactly at the threshold qualifies for rebirth.
    #[default]
    GreaterOrEqual,
    /// Reputation must exceed the threshold strictly.
    StrictlyGreater,
}

/// Coalition detection and mutual-support parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoalitionParams {
    /// Both directed trust edges must meet this floor for a support edge.
    pub trust_floor: f64,
    /// Members below this ATP level may receive support.
    pub critical_atp: f64,
    /// Maximum ATP a recipient may receive per round.
    pub transfer_cap_per_round: f64,
}

impl Default for CoalitionParams {
    fn default() -> Self {
        Self {
            trust_floor: 0.7,
            critical_atp: 25.0,
            transfer_cap_per_round: 10.0,
        }
    }
}

/// Pattern learning (EP) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    /// Per-entry multiplicative weight applied for each newer entry, so
    /// older evidence counts less. Must be in (0, 1].
    pub recency_weight: f64,
    /// Weight of entries from adjacent fingerprint buckets.
    pub neighbor_weight: f64,
    /// Upper bound on advisory confidence; confidence approaches this
    /// asymptotically as consistent evidence accumulates.
    pub max_confidence: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            recency_weight: 0.9,
            neighbor_weight: 0.4,
            max_confidence: 0.95,
        }
    }
}

/// Parameters consumed by scripted strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionParams {
    /// Cautious agents cooperate only above this trust-from-partner level.
    pub cautious_trust_threshold: f64,
    /// Adaptive agents blend trust with pattern advice at this weight.
    pub adaptive_trust_weight: f64,
}

impl Default for DecisionParams {
    fn default() -> Self {
        Self {
            cautious_trust_threshold: 0.4,
            adaptive_trust_weight: 0.6,
        }
    }
}

/// Run schedule: epochs, rounds per epoch, interactions per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleParams {
    pub epochs: u64,
    pub rounds_per_epoch: u64,
    pub interactions_per_round: u64,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            epochs: 5,
            rounds_per_epoch: 10,
            interactions_per_round: 8,
        }
    }
}

/// How the scheduler picks pairs within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSelection {
    /// Uniform over distinct alive pairs.
    #[default]
    Uniform,
    /// Pair probability scales with mutual trust.
    TrustWeighted,
}

impl ScenarioConfig {
    /// Loads a scenario from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the named built-in preset.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let config = match name {
            "friendly" => Self::friendly(),
            "harsh" => Self::harsh(),
            "mixed" => Self::mixed(),
            "human_mixed" => Self::human_mixed(),
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Names of all built-in presets.
    pub fn preset_names() -> &'static [&'static str] {
        &["friendly", "harsh", "mixed", "human_mixed"]
    }

    /// Cooperator-heavy population with generous payoffs. Expected to
    /// sustain a high cooperation rate with no permanent deaths.
    pub fn friendly() -> Self {
        Self {
            name: "friendly".to_string(),
            population: PopulationSpec {
                agents: spec_mix(&[
                    (StrategyKind::Cooperator, 5),
                    (StrategyKind::Reciprocator, 2),
                    (StrategyKind::Cautious, 1),
                ]),
                initial_atp: 100.0,
                initial_trust: 0.5,
            },
            payoff: PayoffMatrix {
                reward: 4.0,
                punishment: -0.5,
                sucker: -1.0,
                temptation: 5.0,
            },
            schedule: ScheduleParams {
                epochs: 4,
                rounds_per_epoch: 10,
                interactions_per_round: 8,
            },
            ..Self::base("friendly")
        }
    }

    /// Defector-heavy population with punishing payoffs.
    pub fn harsh() -> Self {
        Self {
            name: "harsh".to_string(),
            population: PopulationSpec {
                agents: spec_mix(&[
                    (StrategyKind::Defector, 4),
                    (StrategyKind::Cooperator, 2),
                    (StrategyKind::Reciprocator, 2),
                    (StrategyKind::Cautious, 2),
                ]),
                initial_atp: 60.0,
                initial_trust: 0.4,
            },
            payoff: PayoffMatrix {
                reward: 2.5,
                punishment: -2.0,
                sucker: -4.0,
                temptation: 5.0,
            },
            schedule: ScheduleParams {
                epochs: 6,
                rounds_per_epoch: 10,
                interactions_per_round: 10,
            },
            ..Self::base("harsh")
        }
    }

    /// One of every scripted strategy, default payoffs.
    pub fn mixed() -> Self {
        Self {
            name: "mixed".to_string(),
            population: PopulationSpec {
                agents: spec_mix(&[
                    (StrategyKind::Cooperator, 2),
                    (StrategyKind::Defector, 2),
                    (StrategyKind::Reciprocator, 2),
                    (StrategyKind::Cautious, 2),
                    (StrategyKind::Adaptive, 2),
                ]),
                initial_atp: 100.0,
                initial_trust: 0.5,
            },
            ..Self::base("mixed")
        }
    }

    /// The mixed population plus one human-controlled slot.
    pub fn human_mixed() -> Self {
        let mut config = Self::mixed();
        config.name = "human_mixed".to_string();
        config.population.agents.push(AgentSpec {
            name: "You".to_string(),
            strategy: StrategyKind::Human,
        });
        config
    }

    fn base(name: &str) -> Self {
        Self {
            name: name.to_string(),
            population: PopulationSpec {
                agents: Vec::new(),
                initial_atp: default_initial_atp(),
                initial_trust: default_initial_trust(),
            },
            payoff: PayoffMatrix::default(),
            trust: TrustParams::default(),
            lifecycle: LifecycleParams::default(),
            coalition: CoalitionParams::default(),
            patterns: PatternParams::default(),
            decision: DecisionParams::default(),
            schedule: ScheduleParams::default(),
            pairing: PairSelection::default(),
        }
    }

    /// Validates the scenario. Called before any simulation step executes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.agents.is_empty() {
            return Err(ConfigError::EmptyPopulation);
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.population.agents {
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateName(spec.name.clone()));
            }
        }
        if self.population.initial_atp <= 0.0 {
            return Err(ConfigError::NonPositiveAtp(self.population.initial_atp));
        }
        check_unit("initial_trust", self.population.initial_trust)?;
        check_unit("rebirth_threshold", self.lifecycle.rebirth_threshold)?;
        check_unit("karma_atp_fraction", self.lifecycle.karma_atp_fraction)?;
        check_unit("karma_trust_fraction", self.lifecycle.karma_trust_fraction)?;
        check_unit("coalition trust_floor", self.coalition.trust_floor)?;
        check_unit("cautious_trust_threshold", self.decision.cautious_trust_threshold)?;
        check_unit("adaptive_trust_weight", self.decision.adaptive_trust_weight)?;
        check_unit("reputation_trust_weight", self.trust.reputation_trust_weight)?;
        check_unit("reputation_smoothing", self.trust.reputation_smoothing)?;
        check_unit("idle_decay", self.trust.idle_decay)?;
        check_unit("max_confidence", self.patterns.max_confidence)?;
        let humans = self.human_slot_count();
        if humans > 1 {
            return Err(ConfigError::MultipleHumanSlots(humans));
        }
        let s = &self.schedule;
        if s.epochs == 0 || s.rounds_per_epoch == 0 || s.interactions_per_round == 0 {
            return Err(ConfigError::EmptySchedule {
                epochs: s.epochs,
                rounds: s.rounds_per_epoch,
                interactions: s.interactions_per_round,
            });
        }
        Ok(())
    }

    /// Number of human-controlled slots in the population.
    pub fn human_slot_count(&self) -> usize {
        self.population
            .agents
            .iter()
            .filter(|a| a.strategy == StrategyKind::Human)
            .count()
    }
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(ConfigError::ThresholdOutOfRange { name, value });
    }
    Ok(())
}

/// Expands (strategy, count) pairs into named agent specs.
fn spec_mix(mix: &[(StrategyKind, usize)]) -> Vec<AgentSpec> {
    const NAMES: &[&str] = &[
        "Ada", "Brook", "Cato", "Dara", "Eryn", "Finn", "Gale", "Hale", "Iris", "Joss", "Kiva",
        "Lior", "Mara", "Nico", "Orin", "Pax", "Quin", "Rue", "Sol", "Tess",
    ];
    let mut specs = Vec::new();
    for &(strategy, count) in mix {
        for _ in 0..count {
            let name = NAMES
                .get(specs.len())
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Agent{}", specs.len()));
            specs.push(AgentSpec { name, strategy });
        }
    }
    specs
}
