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
pub enum FlightPhase {
    Ground,
    Departure,
    Enroute,
    Approach,
    Landing,
    #[default]
    Unknown,
}

impl FlightPhase {
    pub fn is_safety_critical(self) -> bool {
        matches!(self, Self::Approach | Self::Landing | Self::Departure)
    }
}

/// Tag of the transcript corpus a dialogue was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum CorpusType {
    #[default]
    #[serde(rename = "APP/DEP")]
    #[strum(to_string = "APP/DEP", serialize = "APP", serialize = "DEP")]
    ApproachDeparture,
    #[serde(rename = "GND")]
    #[strum(to_string = "GND")]
    Ground,
    #[serde(rename = "RAMP")]
    #[strum(to_string = "RAMP")]
    Ramp,
}

impl CorpusType {
    /// Phase assumed when the transcript itself carries no phase indicator.
    pub fn fallback_phase(self) -> FlightPhase {
        match self {
            CorpusType::ApproachDeparture => FlightPhase::Approach,
            CorpusType::Ground | CorpusType::Ramp => FlightPhase::Ground,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_tags() {
        assert_eq!("APP/DEP".parse::<CorpusType>().unwrap(), CorpusType::ApproachDeparture);
        assert_eq!("RAMP".parse::<CorpusType>().unwrap().fallback_phase(), FlightPhase::Ground);
        assert_eq!(CorpusType::Ground.to_string(), "GND");
    }

    #[test]
    fn test_safety_critical_phases() {
        assert!(FlightPhase::Landing.is_safety_critical());
        assert!(!FlightPhase::Ground.is_safety_critical());
        assert_eq!(FlightPhase::default(), FlightPhase::Unknown);
    }
}
