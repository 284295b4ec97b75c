//! Decision Provider
//!
//! Strategy dispatch for one interaction. The scripted variants are pure
//! functions of the decision context; the human variant alone suspends
//! through an explicit two-phase frame protocol instead of returning
//! synchronously, so the embedding driver keeps control of scheduling.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use society_events::{Action, SimTime};

use crate::config::DecisionParams;
use crate::error::StateError;
use crate::patterns::Recommendation;
use crate::registry::AgentId;

/// The closed set of strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Always cooperates.
    Cooperator,
    /// Always defects.
    Defector,
    /// Mirrors the partner's last action toward this agent.
    Reciprocator,
    /// Cooperates only above a trust threshold from the partner's side.
    Cautious,
    /// Blends trust level with pattern-store advice.
    Adaptive,
    /// Suspends for an external decision.
    Human,
}

impl StrategyKind {
    pub fn is_human(self) -> bool {
        matches!(self, StrategyKind::Human)
    }

    pub fn all_scripted() -> &'static [StrategyKind] {
        &[
            StrategyKind::Cooperator,
            StrategyKind::Defector,
            StrategyKind::Reciprocator,
            StrategyKind::Cautious,
            StrategyKind::Adaptive,
        ]
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Cooperator => "cooperator",
            StrategyKind::Defector => "defector",
            StrategyKind::Reciprocator => "reciprocator",
            StrategyKind::Cautious => "cautious",
            StrategyKind::Adaptive => "adaptive",
            StrategyKind::Human => "human",
        };
        write!(f, "{}", s)
    }
}

/// Everything a strategy may consult for one decision.
///
/// Built by the scheduler from the registry and trust table; strategies
/// never reach into shared state themselves.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub self_id: AgentId,
    pub partner_id: AgentId,
    pub self_atp: f64,
    pub partner_reputation: f64,
    /// Effective trust this agent holds toward the partner.
    pub trust_toward_partner: f64,
    /// Effective trust the partner holds toward this agent.
    pub trust_from_partner: f64,
    /// The partner's most recent action against this agent, if any.
    pub partner_last_action: Option<Action>,
    /// Advisory recommendation from the lineage's pattern corpus.
    pub pattern_advice: Option<Recommendation>,
}

/// Decides for a scripted strategy. Returns `None` for the human variant,
/// which must go through the frame protocol instead.
pub fn decide(
    strategy: StrategyKind,
    ctx: &DecisionContext,
    params: &DecisionParams,
) -> Option<Action> {
    let action = match strategy {
        StrategyKind::Cooperator => Action::Cooperate,
        StrategyKind::Defector => Action::Defect,
        StrategyKind::Reciprocator => ctx.partner_last_action.unwrap_or(Action::Cooperate),
        StrategyKind::Cautious => {
            if ctx.trust_from_partner > params.cautious_trust_threshold {
                Action::Cooperate
            } else {
                Action::Defect
            }
        }
        StrategyKind::Adaptive => adaptive_decision(ctx, params),
        StrategyKind::Human => return None,
    };
    Some(action)
}

/// Blends trust toward the partner with pattern advice.
///
/// The advice contributes its confidence as a pull toward its recommended
/// action; without advice the decision is trust alone.
fn adaptive_decision(ctx: &DecisionContext, params: &DecisionParams) -> Action {
    let w = params.adaptive_trust_weight;
    let advice_signal = match ctx.pattern_advice {
        Some(rec) => match rec.action {
            Action::Cooperate => 0.5 + rec.confidence / 2.0,
            Action::Defect => 0.5 - rec.confidence / 2.0,
        },
        None => 0.5,
    };
    let score = w * ctx.trust_toward_partner + (1.0 - w) * advice_signal;
    if score >= 0.5 {
        Action::Cooperate
    } else {
        Action::Defect
    }
}

/// The context handed to a human operator while the run is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionFrame {
    pub frame_id: String,
    pub time: SimTime,
    pub agent_id: AgentId,
    pub partner_id: AgentId,
    pub self_atp: f64,
    pub partner_reputation: f64,
    pub trust_toward_partner: f64,
    pub trust_from_partner: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_advice: Option<Recommendation>,
    pub available_actions: Vec<Action>,
}

impl DecisionFrame {
    pub fn from_context(time: SimTime, ctx: &DecisionContext) -> Self {
        Self {
            frame_id: format!("frame_{}", Uuid::new_v4()),
            time,
            agent_id: ctx.self_id.clone(),
            partner_id: ctx.partner_id.clone(),
            self_atp: ctx.self_atp,
            partner_reputation: ctx.partner_reputation,
            trust_toward_partner: ctx.trust_toward_partner,
            trust_from_partner: ctx.trust_from_partner,
            pattern_advice: ctx.pattern_advice,
            available_actions: vec![Action::Cooperate, Action::Defect],
        }
    }
}

/// Human slot state machine: idle -> awaiting_decision -> resolved -> idle.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HumanSlotState {
    #[default]
    Idle,
    AwaitingDecision(DecisionFrame),
    Resolved { frame_id: String, action: Action },
}

/// The suspend/resume channel for the human-controlled agent.
///
/// Nothing in shared state is mutated while a frame is pending, so
/// cancellation is always safe.
#[derive(Debug, Clone, Default)]
pub struct HumanSlot {
    state: HumanSlotState,
}

impl HumanSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, HumanSlotState::Idle)
    }

    /// The pending frame, if the slot is awaiting a decision.
    pub fn pending(&self) -> Option<&DecisionFrame> {
        match &self.state {
            HumanSlotState::AwaitingDecision(frame) => Some(frame),
            _ => None,
        }
    }

    /// Enters the awaiting state with a fresh frame.
    pub fn begin(&mut self, frame: DecisionFrame) -> &DecisionFrame {
        self.state = HumanSlotState::AwaitingDecision(frame);
        match &self.state {
            HumanSlotState::AwaitingDecision(frame) => frame,
            _ => unreachable!(),
        }
    }

    /// Submits a decision for the pending frame. Rejected as a no-op when
    /// no frame is pending, the frame id is stale, or the frame was
    /// already resolved.
    pub fn submit(&mut self, frame_id: &str, action: Action) -> Result<(), StateError> {
        match &self.state {
            HumanSlotState::Idle => Err(StateError::NoPendingDecision),
            HumanSlotState::Resolved { frame_id: id, .. } => {
                Err(StateError::AlreadyResolved(id.clone()))
            }
            HumanSlotState::AwaitingDecision(frame) => {
                if frame.frame_id != frame_id {
                    return Err(StateError::StaleFrame {
                        submitted: frame_id.to_string(),
                        pending: frame.frame_id.clone(),
                    });
                }
                self.state = HumanSlotState::Resolved {
                    frame_id: frame.frame_id.clone(),
                    action,
                };
                Ok(())
            }
        }
    }

    /// Takes a resolved decision and returns the slot to idle.
    pub fn take_resolved(&mut self) -> Option<(String, Action)> {
        if let HumanSlotState::Resolved { frame_id, action } = &self.state {
            let result = (frame_id.clone(), *action);
            self.state = HumanSlotState::Idle;
            Some(result)
        } else {
            None
        }
    }

    /// Cancels a pending frame, returning its id. Idempotent on idle.
    pub fn cancel(&mut self) -> Option<String> {
        if let HumanSlotState::AwaitingDecision(frame) = &self.state {
            let id = frame.frame_id.clone();
            self.state = HumanSlotState::Idle;
            Some(id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LineageId;

    fn ctx(trust_toward: f64, trust_from: f64) -> DecisionContext {
        DecisionContext {
            self_id: AgentId::new(LineageId(0), 0),
            partner_id: AgentId::new(LineageId(1), 0),
            self_atp: 100.0,
            partner_reputation: 0.5,
            trust_toward_partner: trust_toward,
            trust_from_partner: trust_from,
            partner_last_action: None,
            pattern_advice: None,
        }
    }

    fn params() -> DecisionParams {
        DecisionParams::default()
    }

    #[test]
    fn test_fixed_strategies() {
        assert_eq!(
            decide(StrategyKind::Cooperator, &ctx(0.0, 0.0), &params()),
            Some(Action::Cooperate)
        );
        assert_eq!(
            decide(StrategyKind::Defector, &ctx(1.0, 1.0), &params()),
            Some(Action::Defect)
        );
    }

    #[test]
    fn test_reciprocator_mirrors_and_opens_kindly() {
        let mut context = ctx(0.5, 0.5);
        assert_eq!(
            decide(StrategyKind::Reciprocator, &context, &params()),
            Some(Action::Cooperate)
        );
        context.partner_last_action = Some(Action::Defect);
        assert_eq!(
            decide(StrategyKind::Reciprocator, &context, &params()),
            Some(Action::Defect)
        );
    }

    #[test]
    fn test_cautious_needs_trust_from_partner() {
        assert_eq!(
            decide(StrategyKind::Cautious, &ctx(0.9, 0.2), &params()),
            Some(Action::Defect)
        );
        assert_eq!(
            decide(StrategyKind::Cautious, &ctx(0.1, 0.9), &params()),
            Some(Action::Cooperate)
        );
    }

    #[test]
    fn test_adaptive_follows_confident_advice() {
        let mut context = ctx(0.5, 0.5);
        context.pattern_advice = Some(Recommendation {
            action: Action::Defect,
            confidence: 0.9,
        });
        assert_eq!(
            decide(StrategyKind::Adaptive, &context, &params()),
            Some(Action::Defect)
        );

        context.pattern_advice = Some(Recommendation {
            action: Action::Cooperate,
            confidence: 0.9,
        });
        assert_eq!(
            decide(StrategyKind::Adaptive, &context, &params()),
            Some(Action::Cooperate)
        );
    }

    #[test]
    fn test_adaptive_without_advice_uses_trust() {
        assert_eq!(
            decide(StrategyKind::Adaptive, &ctx(0.9, 0.5), &params()),
            Some(Action::Cooperate)
        );
        assert_eq!(
            decide(StrategyKind::Adaptive, &ctx(0.1, 0.5), &params()),
            Some(Action::Defect)
        );
    }

    #[test]
    fn test_human_does_not_decide_synchronously() {
        assert_eq!(decide(StrategyKind::Human, &ctx(0.5, 0.5), &params()), None);
    }

    #[test]
    fn test_human_slot_happy_path() {
        let mut slot = HumanSlot::new();
        assert!(slot.is_idle());

        let frame = DecisionFrame::from_context(SimTime::start(), &ctx(0.5, 0.5));
        let frame_id = slot.begin(frame).frame_id.clone();
        assert!(slot.pending().is_some());

        slot.submit(&frame_id, Action::Cooperate).unwrap();
        let (resolved_id, action) = slot.take_resolved().unwrap();
        assert_eq!(resolved_id, frame_id);
        assert_eq!(action, Action::Cooperate);
        assert!(slot.is_idle());
    }

    #[test]
    fn test_submit_without_pending_is_rejected() {
        let mut slot = HumanSlot::new();
        assert_eq!(
            slot.submit("frame_x", Action::Defect),
            Err(StateError::NoPendingDecision)
        );
    }

    #[test]
    fn test_stale_frame_is_rejected() {
        let mut slot = HumanSlot::new();
        let frame = DecisionFrame::from_context(SimTime::start(), &ctx(0.5, 0.5));
        slot.begin(frame);
        assert!(matches!(
            slot.submit("frame_stale", Action::Defect),
            Err(StateError::StaleFrame { .. })
        ));
    }

    #[test]
    fn test_double_submit_is_rejected() {
        let mut slot = HumanSlot::new();
        let frame = DecisionFrame::from_context(SimTime::start(), &ctx(0.5, 0.5));
        let frame_id = slot.begin(frame).frame_id.clone();
        slot.submit(&frame_id, Action::Cooperate).unwrap();
        assert!(matches!(
            slot.submit(&frame_id, Action::Defect),
            Err(StateError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut slot = HumanSlot::new();
        assert!(slot.cancel().is_none());

        let frame = DecisionFrame::from_context(SimTime::start(), &ctx(0.5, 0.5));
        let frame_id = slot.begin(frame).frame_id.clone();
        assert_eq!(slot.cancel(), Some(frame_id));
        assert!(slot.is_idle());
    }
}
