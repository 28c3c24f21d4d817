use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{conversions::digits_only, errors::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum VerticalDirection {
    Climb,
    Descend,
}

impl VerticalDirection {
    /// Accepts the imperative and the present participle pilots use in readbacks.
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "climb" | "climbing" => Some(Self::Climb),
            "descend" | "descending" | "descent" => Some(Self::Descend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Altitude {
    Feet(u32),
    FlightLevel(u32),
}

impl Altitude {
    pub fn as_feet(self) -> u32 {
        match self {
            Altitude::Feet(f) => f,
            Altitude::FlightLevel(fl) => fl * 100,
        }
    }

    /// Digit string as it is spoken on frequency: flight levels are always three digits.
    pub fn digits(self) -> String {
        match self {
            Altitude::Feet(f) => f.to_string(),
            Altitude::FlightLevel(fl) => format!("{fl:03}"),
        }
    }

    pub fn parse_flight_level(val: &str) -> Result<Self, Error> {
        let level: u32 = digits_only(val)
            .parse()
            .map_err(|_| Error::InvalidAltitude(val.to_owned()))?;
        match level {
            1..=660 => Ok(Self::FlightLevel(level)),
            _ => Err(Error::InvalidAltitude(val.to_owned())),
        }
    }

    pub fn parse_feet(val: &str) -> Result<Self, Error> {
        let feet: u32 = digits_only(val)
            .parse()
            .map_err(|_| Error::InvalidAltitude(val.to_owned()))?;
        match feet {
            0..=66_000 => Ok(Self::Feet(feet)),
            _ => Err(Error::InvalidAltitude(val.to_owned())),
        }
    }
}

impl FromStr for Altitude {
    type Err = Error;
    fn from_str(val: &str) -> Result<Self, Self::Err> {
        let lower = val.trim().to_lowercase();
        if let Some(level) = lower
            .strip_prefix("flight level")
            .or_else(|| lower.strip_prefix("fl"))
        {
            return Self::parse_flight_level(level.trim());
        }
        let feet = lower
            .trim_end_matches("feet")
            .trim_end_matches("ft")
            .trim();
        Self::parse_feet(feet)
    }
}

impl Display for Altitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Altitude::Feet(feet) => write!(f, "{feet} feet"),
            Altitude::FlightLevel(fl) => write!(f, "flight level {fl:03}"),
        }
    }
}
