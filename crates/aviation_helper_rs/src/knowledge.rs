//! Read-only phraseology knowledge base.
//!
//! Everything the readback engine knows about correct phraseology lives here as
//! plain data. Patterns are stored as regex source strings; the engine compiles
//! them once when it is built, so a different table can be swapped in without
//! touching engine code.

use serde::{Deserialize, Serialize};

use crate::{
    clearance::{callsigns::CallsignTable, instruction::InstructionType},
    errors::Error,
};

/// A phrase students commonly use instead of standard phraseology.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NonStandardPhrase {
    /// Suffix of the reported error type, `non_native_<kind>`.
    pub kind: String,
    pub pattern: String,
    /// What should have been said instead.
    pub standard: String,
}

/// A digit spoken with its everyday pronunciation instead of the ICAO one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NumberPronunciation {
    pub word: String,
    pub icao: String,
    pub digit: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReadbackRequirement {
    pub instruction: InstructionType,
    /// Human readable list of what a full readback contains.
    pub elements: Vec<String>,
    /// Phrase the pilot has to repeat verbatim whenever the controller used it.
    #[serde(default)]
    pub required_phrase: Option<String>,
    /// Companion element (action verb, direction) that has to accompany the
    /// value whenever the controller's transmission contains one.
    #[serde(default)]
    pub companion: Option<String>,
    #[serde(default)]
    pub requires_runway: bool,
}

/// A safety-critical instruction together with the readbacks that would invert
/// its meaning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SafetyCriticalPattern {
    pub pattern: String,
    pub description: String,
    pub conflicts_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnowledgeBase {
    pub non_standard_phrases: Vec<NonStandardPhrase>,
    pub number_pronunciation: Vec<NumberPronunciation>,
    pub readback_requirements: Vec<ReadbackRequirement>,
    pub safety_critical_patterns: Vec<SafetyCriticalPattern>,
    pub callsigns: CallsignTable,
    #[serde(default)]
    pub waypoints: Vec<String>,
    #[serde(default)]
    pub sids: Vec<String>,
    #[serde(default)]
    pub stars: Vec<String>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KnowledgeBase {
    pub fn from_ron_str(contents: &str) -> Result<Self, Error> {
        let kb: KnowledgeBase = ron::from_str(contents)?;
        Ok(kb)
    }

    pub fn load_from_reader<R>(mut reader: R) -> Result<Self, Error>
    where
        R: std::io::Read,
    {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        Self::from_ron_str(&contents)
    }

    /// Load a knowledge base from a RON file
    #[cfg(feature = "fs")]
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn requirement_for(&self, instruction: InstructionType) -> Option<&ReadbackRequirement> {
        self.readback_requirements
            .iter()
            .find(|r| r.instruction == instruction)
    }

    pub fn builtin() -> Self {
        Self {
            non_standard_phrases: builtin_non_standard_phrases(),
            number_pronunciation: vec![
                pronunciation("three", "tree", '3'),
                pronunciation("four", "fower", '4'),
                pronunciation("five", "fife", '5'),
                pronunciation("nine", "niner", '9'),
            ],
            readback_requirements: builtin_requirements(),
            safety_critical_patterns: builtin_safety_patterns(),
            callsigns: CallsignTable::builtin(),
            waypoints: [
                "ALBAT", "CAVIT", "DOMIS", "KABAY", "LUBOG", "MIGUN", "PINAS", "SABAY", "TALIM",
                "BATAN",
            ]
            .map(String::from)
            .to_vec(),
            sids: ["LUBOG 1A", "ALBAT 1C", "PINAS 2B"].map(String::from).to_vec(),
            stars: ["TALIM 1B", "CAVIT 2A", "MIGUN 1D"].map(String::from).to_vec(),
        }
    }
}

fn pronunciation(word: &str, icao: &str, digit: char) -> NumberPronunciation {
    NumberPronunciation {
        word: word.to_owned(),
        icao: icao.to_owned(),
        digit,
    }
}

fn builtin_non_standard_phrases() -> Vec<NonStandardPhrase> {
    [
        ("plain_language", r"\bgoing (?:up|down) to\b", "climbing / descending"),
        ("plain_language", r"\b(?:i|we) will\b", "wilco"),
        ("plain_language", r"\bover and out\b", "out"),
        ("affirmation", r"\b(?:yes|yeah|yep)\b", "affirm"),
        ("negation", r"\b(?:nope|no sir)\b", "negative"),
        ("courtesy", r"\b(?:please|thank you|thanks)\b", "omit courtesy words from readbacks"),
        ("filler", r"\b(?:uh|uhm|um|erm)\b", "pause silently instead of using fillers"),
        ("repeat_request", r"\b(?:repeat|come again|pardon)\b", "say again"),
    ]
    .into_iter()
    .map(|(kind, pattern, standard)| NonStandardPhrase {
        kind: kind.to_owned(),
        pattern: pattern.to_owned(),
        standard: standard.to_owned(),
    })
    .collect()
}

fn requirement(
    instruction: InstructionType,
    elements: &[&str],
    required_phrase: Option<&str>,
    companion: Option<&str>,
    requires_runway: bool,
) -> ReadbackRequirement {
    ReadbackRequirement {
        instruction,
        elements: elements.iter().map(|e| e.to_string()).collect(),
        required_phrase: required_phrase.map(String::from),
        companion: companion.map(String::from),
        requires_runway,
    }
}

fn builtin_requirements() -> Vec<ReadbackRequirement> {
    use InstructionType::*;
    vec![
        requirement(
            Altitude,
            &["vertical action", "altitude or flight level"],
            None,
            Some(r"\b(?:climb(?:ing)?|descend(?:ing)?|maintain(?:ing)?|leaving)\b"),
            false,
        ),
        requirement(
            Heading,
            &["turn direction", "heading"],
            None,
            Some(r"\b(?:left|right)\b"),
            false,
        ),
        requirement(
            Speed,
            &["speed action", "speed"],
            None,
            Some(r"\b(?:reduc(?:e|ing)|increas(?:e|ing))\b"),
            false,
        ),
        requirement(Altimeter, &["QNH"], None, None, false),
        requirement(Squawk, &["transponder code"], None, None, false),
        requirement(Frequency, &["frequency"], None, None, false),
        requirement(Approach, &["approach type", "runway"], None, None, true),
        requirement(
            Takeoff,
            &["cleared for takeoff", "runway"],
            Some(r"\bcleared for take ?-?off\b"),
            None,
            true,
        ),
        requirement(
            Landing,
            &["cleared to land", "runway"],
            Some(r"\bcleared to land\b"),
            None,
            true,
        ),
        requirement(
            Lineup,
            &["line up and wait", "runway"],
            Some(r"\blin(?:e|ing) up and wait(?:ing)?\b"),
            None,
            true,
        ),
        requirement(
            Hold,
            &["hold short", "runway"],
            Some(r"\bhold(?:ing)? short\b"),
            None,
            true,
        ),
        requirement(
            Taxi,
            &["taxi route", "holding point or runway"],
            None,
            Some(r"\btaxi(?:ing)?\b"),
            true,
        ),
        requirement(Direct, &["direct", "waypoint"], None, Some(r"\bdirect\b"), false),
    ]
}

fn builtin_safety_patterns() -> Vec<SafetyCriticalPattern> {
    [
        (
            r"\bline up and wait\b",
            "line up and wait is not a takeoff clearance",
            &[r"\bcleared for take ?-?off\b", r"\btaking off\b", r"\brolling\b"][..],
        ),
        (
            r"\bhold short\b",
            "hold short must never be read back as a crossing",
            &[r"\bcross(?:ing)?\b", r"\benter(?:ing)?\b"][..],
        ),
        (
            r"\bgo around\b",
            "go around cancels the landing clearance",
            &[r"\bcleared to land\b", r"\blanding\b", r"\bcontinu(?:e|ing)\b"][..],
        ),
        (
            r"\bhold position\b",
            "hold position forbids any movement",
            &[r"\bcleared for take ?-?off\b", r"\btaxiing\b", r"\brolling\b"][..],
        ),
        (
            r"\bstop immediately\b",
            "stop immediately must be acknowledged as stopping",
            &[r"\brolling\b", r"\bcontinu(?:e|ing)\b"][..],
        ),
    ]
    .into_iter()
    .map(|(pattern, description, conflicts)| SafetyCriticalPattern {
        pattern: pattern.to_owned(),
        description: description.to_owned(),
        conflicts_with: conflicts.iter().map(|c| c.to_string()).collect(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_builtin_covers_every_readback_instruction() {
        let kb = KnowledgeBase::builtin();
        for instruction in InstructionType::iter() {
            let expected = !matches!(
                instruction,
                InstructionType::Information | InstructionType::Unknown
            );
            assert_eq!(
                kb.requirement_for(instruction).is_some(),
                expected,
                "requirement for {instruction}"
            );
        }
    }

    #[test]
    fn test_ron_round_trip() {
        let kb = KnowledgeBase::builtin();
        let text = ron::ser::to_string_pretty(&kb, ron::ser::PrettyConfig::default()).unwrap();
        let loaded = KnowledgeBase::load_from_reader(text.as_bytes()).unwrap();
        assert_eq!(kb, loaded);
    }

    #[test]
    fn test_malformed_ron_is_an_error() {
        assert!(matches!(
            KnowledgeBase::from_ron_str("(non_standard_phrases: ["),
            Err(Error::Ron(_))
        ));
    }
}
