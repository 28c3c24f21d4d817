use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// What an ATC transmission asks the pilot to do. The order of the variants is
/// the order the classifier tries them in.
#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InstructionType {
    Altitude,
    Heading,
    Speed,
    Altimeter,
    Squawk,
    Frequency,
    Approach,
    Takeoff,
    Landing,
    Taxi,
    Hold,
    Lineup,
    Direct,
    Information,
    Unknown,
}

impl InstructionType {
    pub fn is_safety_critical(self) -> bool {
        matches!(
            self,
            Self::Altitude | Self::Takeoff | Self::Landing | Self::Lineup | Self::Hold
        )
    }

    pub fn requires_readback(self) -> bool {
        self != Self::Information
    }

    /// Heading, altitude and speed carry a bare number that can be read back
    /// under the wrong keyword.
    pub fn is_numeric_parameter(self) -> bool {
        matches!(self, Self::Altitude | Self::Heading | Self::Speed)
    }
}
