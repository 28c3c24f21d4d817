use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// VHF frequency kept in kHz so `121.5` and `121.50` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Frequency {
    pub khz: u32,
}

impl FromStr for Frequency {
    type Err = Error;
    fn from_str(val: &str) -> Result<Self, Self::Err> {
        let mut split = val.trim().split('.');
        match (split.next(), split.next(), split.next()) {
            (Some(num), dec, None) => {
                let num: u32 = num
                    .parse()
                    .map_err(|_| Error::InvalidFrequency(val.to_owned()))?;
                let dec = dec.unwrap_or_default();
                if dec.len() > 3 || !dec.chars().all(|c| c.is_ascii_digit()) {
                    return Err(Error::InvalidFrequency(val.to_owned()));
                }
                let dec: u32 = format!("{dec:0<3}")
                    .parse()
                    .map_err(|_| Error::InvalidFrequency(val.to_owned()))?;
                if !(108..=137).contains(&num) {
                    return Err(Error::InvalidFrequency(val.to_owned()));
                }
                Ok(Self {
                    khz: num * 1000 + dec,
                })
            }
            _ => Err(Error::InvalidFrequency(val.to_owned())),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dec = format!("{:03}", self.khz % 1000);
        let dec = match dec.trim_end_matches('0') {
            "" => "0",
            trimmed => trimmed,
        };
        write!(f, "{}.{}", self.khz / 1000, dec)
    }
}
