//! Acceptance rule applied to the engine's comparison result.

use serde::{Deserialize, Serialize};

use crate::engine::{MatchResult, NO_CANDIDATE};

/// Default minimum confidence for a positive identification.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 70.0;

/// Minimum `matchPercentage` (0–100, inclusive) to accept a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct MatchThreshold(f64);

impl MatchThreshold {
    /// `None` when `value` is outside `[0, 100]` or not a number.
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=100.0).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for MatchThreshold {
    fn default() -> Self {
        Self(DEFAULT_MATCH_THRESHOLD)
    }
}

impl TryFrom<f64> for MatchThreshold {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("match threshold {} is outside 0..=100", value))
    }
}

impl From<MatchThreshold> for f64 {
    fn from(threshold: MatchThreshold) -> Self {
        threshold.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Candidate at `index` of the list sent to the engine is accepted.
    Match { index: usize, percentage: f64 },
    NoMatch,
}

/// Accept iff the engine named a candidate and its score reaches the
/// threshold. The "no candidate" sentinel wins over any score.
pub fn decide(result: &MatchResult, threshold: MatchThreshold) -> Decision {
    if result.match_index == NO_CANDIDATE || result.match_index < 0 {
        return Decision::NoMatch;
    }
    let Some(percentage) = result.match_percentage else {
        return Decision::NoMatch;
    };
    if percentage.is_nan() || percentage < threshold.value() {
        return Decision::NoMatch;
    }
    match usize::try_from(result.match_index) {
        Ok(index) => Decision::Match { index, percentage },
        Err(_) => Decision::NoMatch,
    }
}
