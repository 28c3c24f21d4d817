//! Text normalization, instruction classification and value extraction.
//!
//! Extraction never fails: a pattern that does not match means the element is
//! absent from the transmission.

use std::fmt;

use aviation_helper_rs::{
    clearance::instruction::InstructionType,
    conversions::{digits_only, normalize_spoken_numbers},
    types::{
        altitude::Altitude,
        frequency::Frequency,
        heading::{Heading, TurnDirection},
    },
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    errors::Error,
    rules::{RuleTable, compile},
};

const QUOTE_CHARS: &str = r#"[\x{22}\x{AB}\x{BB}\x{201C}-\x{201F}\x{2033}\x{301D}-\x{301F}\x{FF02}]"#;

/// Brings a transmission into the form every extractor expects.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    label: Regex,
    quotes: Regex,
    flight_level_shorthand: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            label: compile(
                r"^\s*(?:atc|tower|twr|ground|gnd|approach|app|departure|dep|control|ctl|center|ctr|pilot|pil|plt)\s*:\s*",
            )?,
            quotes: Regex::new(QUOTE_CHARS)?,
            flight_level_shorthand: compile(r"\bFL\s?(\d{2,3})\b")?,
        })
    }

    /// Strips speaker labels and quotes, collapses whitespace, folds spelled
    /// numbers and expands `FL250` to `flight level 250`. Case is kept.
    pub fn normalize(&self, text: &str) -> String {
        let without_label = self.label.replace(text, "");
        let without_quotes = self.quotes.replace_all(&without_label, " ");
        let collapsed = without_quotes.split_whitespace().collect::<Vec<_>>().join(" ");
        let numbers = normalize_spoken_numbers(&collapsed);
        self.flight_level_shorthand
            .replace_all(&numbers, "flight level $1")
            .into_owned()
    }
}

/// Ordered instruction table. Wind reports are removed first so that
/// `wind 240 at 10 knots` never reads as a speed instruction.
#[derive(Debug, Clone)]
pub struct InstructionClassifier {
    table: RuleTable<InstructionType>,
    wind: Regex,
}

impl InstructionClassifier {
    pub fn new() -> Result<Self, Error> {
        use InstructionType::*;
        let table = RuleTable::new()
            .with(
                r"\bflight level\s*\d{2,3}\b|\b\d{3,5}\s*(?:feet|ft)\b|\b(?:climb|descend)\b",
                Altitude,
                0.9,
            )
            .and_then(|t| t.with(r"\bheading\s*\d{1,3}\b|\bturn\s+(?:left|right)\b", Heading, 0.9))
            .and_then(|t| {
                t.with(
                    r"\bspeed\b|\b\d{2,3}\s*(?:knots|kts|kt)\b|\bmach\b",
                    Speed,
                    0.85,
                )
            })
            .and_then(|t| t.with(r"\b(?:qnh|altimeter|hpa)\b", Altimeter, 0.9))
            .and_then(|t| t.with(r"\b(?:squawk|transponder)\b", Squawk, 0.9))
            .and_then(|t| {
                t.with(
                    r"\b(?:contact|frequency|monitor)\b|\b1\d{2}\.\d{1,3}\b",
                    Frequency,
                    0.85,
                )
            })
            .and_then(|t| {
                t.with(
                    r"\bcleared\b.*\bapproach\b|\b(?:ils|rnav|vor|visual|ndb|gps)\s+approach\b",
                    Approach,
                    0.85,
                )
            })
            .and_then(|t| t.with(r"\btake ?-?off\b", Takeoff, 0.95))
            .and_then(|t| t.with(r"\bcleared to land\b|\bland\b", Landing, 0.95))
            .and_then(|t| t.with(r"\btaxi\b", Taxi, 0.85))
            .and_then(|t| {
                t.with(
                    r"\bhold\s+short\b|\bhold\s+(?:at|over)\b|\bhold\s+position\b",
                    Hold,
                    0.9,
                )
            })
            .and_then(|t| t.with(r"\bline\s+up\b", Lineup, 0.9))
            .and_then(|t| t.with(r"\bdirect\b", Direct, 0.8))
            .and_then(|t| {
                t.with(
                    r"\b(?:traffic|information|wind|report|advise|caution)\b",
                    Information,
                    0.6,
                )
            })?;
        Ok(Self {
            table,
            wind: compile(r"\bwind\s+\d{3}(?:\s+degrees)?\s+(?:at\s+)?\d{1,2}(?:\s*(?:knots|kts))?\b")?,
        })
    }

    pub fn strip_wind(&self, text: &str) -> String {
        self.wind.replace_all(text, " ").into_owned()
    }

    pub fn classify(&self, text: &str) -> InstructionType {
        let text = self.strip_wind(text);
        self.table
            .first_match(&text)
            .map(|rule| rule.tag)
            .unwrap_or(InstructionType::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Runway {
    pub number: u8,
    pub designator: Option<char>,
}

impl fmt::Display for Runway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.number)?;
        if let Some(designator) = self.designator {
            write!(f, "{designator}")?;
        }
        Ok(())
    }
}

/// A value read out of a transmission, kept as a digit string for comparison
/// and as display text for feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedValue {
    pub digits: String,
    pub display: String,
}

impl ExtractedValue {
    fn new(digits: String, display: String) -> Self {
        Self { digits, display }
    }

    fn from_digits(digits: &str) -> Self {
        Self::new(digits.to_string(), digits.to_string())
    }

    /// Equal once leading zeros are ignored (`090` and `90`).
    pub fn same_value(&self, other: &ExtractedValue) -> bool {
        self.digits.trim_start_matches('0') == other.digits.trim_start_matches('0')
    }
}

#[derive(Debug, Clone)]
pub struct ValueExtractor {
    flight_level: Regex,
    feet: Regex,
    vertical_bare: Regex,
    heading: Regex,
    direction: Regex,
    speed: Regex,
    altimeter: Regex,
    squawk: Regex,
    squawk_bare: Regex,
    frequency: Regex,
    runway: Regex,
    approach_type: Regex,
    direct: Regex,
    bare_number: Regex,
}

impl ValueExtractor {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            flight_level: compile(r"\bflight level\s*(\d{2,3})\b")?,
            feet: compile(r"\b(\d{1,2},\d{3}|\d{3,5})\s*(?:feet|ft)\b")?,
            vertical_bare: compile(
                r"\b(?:climb|descend|maintain)\w*(?:\s+and\s+maintain\w*)?\s+(?:to\s+)?(\d{1,2},\d{3}|\d{3,5})\b",
            )?,
            heading: compile(r"\bheading\s*(\d{1,3})\b")?,
            direction: compile(r"\b(left|right)\b")?,
            speed: compile(
                r"\b(\d{2,3})\s*(?:knots|kts|kt)\b|\bspeed\s*(\d{2,3})\b|\bmach\s*(?:0?\.)?(\d{2})\b",
            )?,
            altimeter: compile(r"\b(?:qnh|altimeter)\s*(\d{3,4}(?:\.\d{1,2})?)\b")?,
            squawk: compile(r"\b(?:squawk(?:ing)?|transponder|code)\s*([0-7]{4})\b")?,
            squawk_bare: Regex::new(r"\b([0-7]{4})\b")?,
            frequency: Regex::new(r"\b(1(?:0[89]|[1-3]\d)\.\d{1,3})\b")?,
            runway: compile(r"\brunway\s*(\d{1,2})\s*(left|right|center|centre|[lrc])?\b")?,
            approach_type: compile(r"\b(ils|rnav|vor|visual|ndb|gps)\b")?,
            direct: compile(r"\bdirect(?:\s+to)?\s+([a-z]{5})\b")?,
            bare_number: Regex::new(r"\b(\d{2,5})\b")?,
        })
    }

    pub fn altitude(&self, text: &str) -> Option<Altitude> {
        if let Some(level) = first_capture(&self.flight_level, text) {
            return Altitude::parse_flight_level(level).ok();
        }
        first_capture(&self.feet, text)
            .or_else(|| first_capture(&self.vertical_bare, text))
            .and_then(|feet| Altitude::parse_feet(&digits_only(feet)).ok())
    }

    pub fn heading(&self, text: &str) -> Option<Heading> {
        first_capture(&self.heading, text).and_then(|h| h.parse().ok())
    }

    pub fn turn_direction(&self, text: &str) -> Option<TurnDirection> {
        let without_runways = self.runway.replace_all(text, " ");
        first_capture(&self.direction, &without_runways).and_then(TurnDirection::from_word)
    }

    pub fn speed(&self, text: &str) -> Option<String> {
        let caps = self.speed.captures(text)?;
        (1..=3)
            .find_map(|i| caps.get(i))
            .map(|m| m.as_str().to_string())
    }

    pub fn altimeter(&self, text: &str) -> Option<String> {
        first_capture(&self.altimeter, text).map(String::from)
    }

    pub fn squawk(&self, text: &str) -> Option<String> {
        first_capture(&self.squawk, text).map(String::from)
    }

    pub fn frequency(&self, text: &str) -> Option<Frequency> {
        first_capture(&self.frequency, text).and_then(|f| f.parse().ok())
    }

    pub fn runway(&self, text: &str) -> Option<Runway> {
        let caps = self.runway.captures(text)?;
        let number = caps.get(1)?.as_str().parse().ok()?;
        let designator = caps
            .get(2)
            .and_then(|m| m.as_str().chars().next())
            .map(|c| c.to_ascii_uppercase());
        Some(Runway { number, designator })
    }

    pub fn approach_type(&self, text: &str) -> Option<String> {
        first_capture(&self.approach_type, text).map(|t| t.to_lowercase())
    }

    pub fn direct_waypoint(&self, text: &str) -> Option<String> {
        first_capture(&self.direct, text).map(|w| w.to_uppercase())
    }

    /// The controller's value for a numeric or coded instruction.
    pub fn instruction_value(
        &self,
        instruction: InstructionType,
        text: &str,
    ) -> Option<ExtractedValue> {
        match instruction {
            InstructionType::Altitude => self
                .altitude(text)
                .map(|a| ExtractedValue::from_digits(&a.digits())),
            InstructionType::Heading => self
                .heading(text)
                .map(|h| ExtractedValue::new(h.to_string(), h.to_string())),
            InstructionType::Speed => self.speed(text).map(|s| ExtractedValue::from_digits(&s)),
            InstructionType::Altimeter => self
                .altimeter(text)
                .map(|q| ExtractedValue::new(digits_only(&q), q)),
            InstructionType::Squawk => self.squawk(text).map(|s| ExtractedValue::from_digits(&s)),
            InstructionType::Frequency => self
                .frequency(text)
                .map(|f| ExtractedValue::new(digits_only(&f.to_string()), f.to_string())),
            _ => None,
        }
    }

    /// The pilot's value. Falls back to bare numbers when the keyword was
    /// dropped (`descending 150`), so `text` must already be free of callsigns.
    pub fn readback_value(
        &self,
        instruction: InstructionType,
        text: &str,
        expected: &ExtractedValue,
    ) -> Option<ExtractedValue> {
        if let Some(value) = self.instruction_value(instruction, text) {
            return Some(value);
        }
        match instruction {
            InstructionType::Squawk => {
                first_capture(&self.squawk_bare, text).map(ExtractedValue::from_digits)
            }
            InstructionType::Altitude | InstructionType::Heading | InstructionType::Speed => {
                let numbers: Vec<&str> = self
                    .bare_number
                    .captures_iter(text)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .collect();
                let candidate = numbers
                    .iter()
                    .find(|n| n.len() == expected.digits.len())
                    .or_else(|| numbers.first())?;
                Some(ExtractedValue::from_digits(candidate))
            }
            _ => None,
        }
    }

    /// Numeric values the pilot tied to a parameter keyword.
    pub fn keyword_values(&self, text: &str) -> Vec<(InstructionType, ExtractedValue)> {
        let mut values = Vec::new();
        for caps in self.flight_level.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                values.push((InstructionType::Altitude, ExtractedValue::from_digits(m.as_str())));
            }
        }
        for caps in self.feet.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                values.push((
                    InstructionType::Altitude,
                    ExtractedValue::from_digits(&digits_only(m.as_str())),
                ));
            }
        }
        for caps in self.heading.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                values.push((InstructionType::Heading, ExtractedValue::from_digits(m.as_str())));
            }
        }
        for caps in self.speed.captures_iter(text) {
            if let Some(m) = (1..=3).find_map(|i| caps.get(i)) {
                values.push((InstructionType::Speed, ExtractedValue::from_digits(m.as_str())));
            }
        }
        values
    }
}

fn first_capture<'t>(regex: &Regex, text: &'t str) -> Option<&'t str> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
