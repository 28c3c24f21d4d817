use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{conversions::digits_only, errors::Error};

/// Magnetic heading in whole degrees, `1..=360`. North is 360, never 000.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Heading(u16);

impl Heading {
    pub fn new(val: u16) -> Result<Self, Error> {
        match val {
            0 => Ok(Heading(360)),
            1..=360 => Ok(Heading(val)),
            _ => Err(Error::InvalidHeading(val.to_string())),
        }
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl FromStr for Heading {
    type Err = Error;
    fn from_str(val: &str) -> Result<Self, Self::Err> {
        let degrees: u16 = digits_only(val)
            .parse()
            .map_err(|_| Error::InvalidHeading(val.to_owned()))?;
        Heading::new(degrees)
    }
}

impl Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl Display for TurnDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnDirection::Left => write!(f, "left"),
            TurnDirection::Right => write!(f, "right"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_display_is_three_digits() {
        assert_eq!("090".parse::<Heading>().unwrap().to_string(), "090");
        assert_eq!("0".parse::<Heading>().unwrap().to_string(), "360");
        assert!("361".parse::<Heading>().is_err());
    }

    #[test]
    fn test_turn_direction_words() {
        assert_eq!(TurnDirection::from_word("Left"), Some(TurnDirection::Left));
        assert_eq!(TurnDirection::from_word("straight"), None);
    }
}
