use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Deserialize,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// One level up, saturating at critical.
    pub fn escalate(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }

    /// Base score of the severity rollup.
    pub fn base_score(self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 2.0,
            Severity::High => 3.0,
            Severity::Critical => 4.0,
        }
    }

    /// How much one error of this severity takes off the correctness score.
    pub fn penalty(self) -> f64 {
        match self {
            Severity::Low => 0.1,
            Severity::Medium => 0.5,
            Severity::High => 0.75,
            Severity::Critical => 1.0,
        }
    }

    /// Maps a rollup score back onto a level.
    pub fn from_score(score: f64) -> Self {
        if score >= 5.0 {
            Severity::Critical
        } else if score >= 3.5 {
            Severity::High
        } else if score >= 2.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_saturates() {
        assert_eq!(Severity::Low.escalate().escalate(), Severity::High);
        assert_eq!(Severity::Critical.escalate(), Severity::Critical);
    }

    #[test]
    fn test_score_buckets() {
        assert_eq!(Severity::from_score(5.2), Severity::Critical);
        assert_eq!(Severity::from_score(3.6), Severity::High);
        assert_eq!(Severity::from_score(3.0), Severity::Medium);
        assert_eq!(Severity::from_score(1.0), Severity::Low);
        assert!(Severity::Critical > Severity::High);
    }
}
