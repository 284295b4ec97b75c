//! Simulation Clock Types
//!
//! Positions inside a run are addressed as epoch/round/interaction triples.
//! The textual form is used in event logs and error reports so a failing
//! step can be located without replaying the run.
//!
//! # Example
//!
//! ```
//! use society_events::SimTime;
//!
//! let t = SimTime::new(3, 12, 4);
//! assert_eq!(t.to_string(), "epoch_3.round_12.interaction_4");
//! assert_eq!("epoch_3.round_12.interaction_4".parse::<SimTime>().unwrap(), t);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in simulation time.
///
/// Ordering is lexicographic over (epoch, round, interaction), which matches
/// execution order because interactions within a round are fully serialized.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct SimTime {
    pub epoch: u64,
    pub round: u64,
    pub interaction: u64,
}

impl SimTime {
    pub fn new(epoch: u64, round: u64, interaction: u64) -> Self {
        Self {
            epoch,
            round,
            interaction,
        }
    }

    /// The first instant of a run.
    pub fn start() -> Self {
        Self::default()
    }

    /// Advance to the next interaction slot within the same round.
    pub fn next_interaction(self) -> Self {
        Self {
            interaction: self.interaction + 1,
            ..self
        }
    }

    /// Advance to the first interaction of the next round.
    pub fn next_round(self) -> Self {
        Self {
            epoch: self.epoch,
            round: self.round + 1,
            interaction: 0,
        }
    }

    /// Advance to the first interaction of the next epoch.
    pub fn next_epoch(self) -> Self {
        Self {
            epoch: self.epoch + 1,
            round: 0,
            interaction: 0,
        }
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch_{}.round_{}.interaction_{}",
            self.epoch, self.round, self.interaction
        )
    }
}

impl FromStr for SimTime {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let epoch = parse_field(parts.next(), "epoch_", s)?;
        let round = parse_field(parts.next(), "round_", s)?;
        let interaction = parse_field(parts.next(), "interaction_", s)?;
        if parts.next().is_some() {
            return Err(ParseTimeError::InvalidFormat(s.to_string()));
        }
        Ok(Self {
            epoch,
            round,
            interaction,
        })
    }
}

fn parse_field(part: Option<&str>, prefix: &str, whole: &str) -> Result<u64, ParseTimeError> {
    let part = part.ok_or_else(|| ParseTimeError::InvalidFormat(whole.to_string()))?;
    let digits = part
        .strip_prefix(prefix)
        .ok_or_else(|| ParseTimeError::InvalidFormat(whole.to_string()))?;
    digits
        .parse()
        .map_err(|_| ParseTimeError::InvalidNumber(part.to_string()))
}

/// Error type for parsing SimTime from strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTimeError {
    InvalidFormat(String),
    InvalidNumber(String),
}

impl fmt::Display for ParseTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseTimeError::InvalidFormat(s) => {
                write!(f, "invalid time format: '{}' (expected epoch_N.round_N.interaction_N)", s)
            }
            ParseTimeError::InvalidNumber(s) => write!(f, "invalid time component: '{}'", s),
        }
    }
}

impl std::error::Error for ParseTimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrip() {
        let t = SimTime::new(7, 0, 19);
        let parsed: SimTime = t.to_string().parse().unwrap();
        assert_eq!(parsed, t);
    }

    #[test]
    fn test_ordering_matches_execution_order() {
        let a = SimTime::new(1, 9, 9);
        let b = SimTime::new(2, 0, 0);
        assert!(a < b);
        assert!(a.next_interaction() > a);
        assert!(a.next_round() > a.next_interaction());
    }

    #[test]
    fn test_epoch_advance_resets_round_and_interaction() {
        let t = SimTime::new(4, 8, 3).next_epoch();
        assert_eq!(t, SimTime::new(5, 0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("epoch_1.round_2".parse::<SimTime>().is_err());
        assert!("epoch_x.round_2.interaction_3".parse::<SimTime>().is_err());
        assert!("round_1.epoch_2.interaction_3".parse::<SimTime>().is_err());
    }
}
