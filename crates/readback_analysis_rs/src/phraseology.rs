//! Knowledge base tables compiled into regexes.
//!
//! The knowledge base stores pattern sources only; everything here is built
//! once per engine so a malformed table fails at construction time.

use aviation_helper_rs::{KnowledgeBase, clearance::instruction::InstructionType};
use regex::Regex;

use crate::{errors::Error, rules::compile};

#[derive(Debug, Clone)]
pub struct CompiledRequirement {
    pub instruction: InstructionType,
    pub elements: Vec<String>,
    pub required_phrase: Option<Regex>,
    pub companion: Option<Regex>,
    pub requires_runway: bool,
}

#[derive(Debug, Clone)]
pub struct SafetyPair {
    pub pattern: Regex,
    pub description: String,
    pub conflicts: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct NonNativeRule {
    pub kind: String,
    pub pattern: Regex,
    pub standard: String,
}

#[derive(Debug, Clone)]
pub struct PronunciationRule {
    pub word: String,
    pub icao: String,
    pattern: Regex,
}

/// A confusion found in a readback: the controller's phrase and the
/// conflicting phrase the pilot used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confusion<'a> {
    pub expected: String,
    pub actual: String,
    pub description: &'a str,
}

/// A non-standard phrase found in a readback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonNativeHit<'a> {
    pub kind: &'a str,
    pub found: String,
    pub standard: &'a str,
}

#[derive(Debug, Clone)]
pub struct Phraseology {
    requirements: Vec<CompiledRequirement>,
    safety: Vec<SafetyPair>,
    non_native: Vec<NonNativeRule>,
    pronunciation: Vec<PronunciationRule>,
}

fn compile_optional(pattern: Option<&String>) -> Result<Option<Regex>, Error> {
    pattern.map(|p| compile(p)).transpose()
}

impl Phraseology {
    pub fn compile(kb: &KnowledgeBase) -> Result<Self, Error> {
        let requirements = kb
            .readback_requirements
            .iter()
            .map(|r| {
                Ok(CompiledRequirement {
                    instruction: r.instruction,
                    elements: r.elements.clone(),
                    required_phrase: compile_optional(r.required_phrase.as_ref())?,
                    companion: compile_optional(r.companion.as_ref())?,
                    requires_runway: r.requires_runway,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let safety = kb
            .safety_critical_patterns
            .iter()
            .map(|p| {
                Ok(SafetyPair {
                    pattern: compile(&p.pattern)?,
                    description: p.description.clone(),
                    conflicts: p
                        .conflicts_with
                        .iter()
                        .map(|c| compile(c))
                        .collect::<Result<Vec<_>, Error>>()?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let non_native = kb
            .non_standard_phrases
            .iter()
            .map(|p| {
                Ok(NonNativeRule {
                    kind: p.kind.clone(),
                    pattern: compile(&p.pattern)?,
                    standard: p.standard.clone(),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let pronunciation = kb
            .number_pronunciation
            .iter()
            .filter(|p| !p.word.eq_ignore_ascii_case(&p.icao))
            .map(|p| {
                Ok(PronunciationRule {
                    word: p.word.clone(),
                    icao: p.icao.clone(),
                    pattern: compile(&format!(r"\b{}\b", regex::escape(&p.word)))?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            requirements,
            safety,
            non_native,
            pronunciation,
        })
    }

    pub fn requirement(&self, instruction: InstructionType) -> Option<&CompiledRequirement> {
        self.requirements
            .iter()
            .find(|r| r.instruction == instruction)
    }

    /// The pilot used a phrase that inverts a safety-critical instruction.
    /// Conflicts the controller used as well are ignored.
    pub fn critical_confusion(&self, atc: &str, pilot: &str) -> Option<Confusion<'_>> {
        self.safety.iter().find_map(|pair| {
            let expected = pair.pattern.find(atc)?;
            let actual = pair
                .conflicts
                .iter()
                .filter(|c| !c.is_match(atc))
                .find_map(|c| c.find(pilot))?;
            Some(Confusion {
                expected: expected.as_str().to_lowercase(),
                actual: actual.as_str().to_lowercase(),
                description: &pair.description,
            })
        })
    }

    pub fn non_native_phrases(&self, pilot: &str) -> Vec<NonNativeHit<'_>> {
        self.non_native
            .iter()
            .filter_map(|rule| {
                rule.pattern.find(pilot).map(|m| NonNativeHit {
                    kind: &rule.kind,
                    found: m.as_str().to_lowercase(),
                    standard: &rule.standard,
                })
            })
            .collect()
    }

    /// Digits spoken with their everyday pronunciation (`nine` for `niner`).
    pub fn non_icao_numbers(&self, pilot: &str) -> Vec<&PronunciationRule> {
        self.pronunciation
            .iter()
            .filter(|rule| rule.pattern.is_match(pilot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phraseology() -> Phraseology {
        Phraseology::compile(&KnowledgeBase::builtin()).unwrap()
    }

    #[test]
    fn test_lineup_read_back_as_takeoff() {
        let p = phraseology();
        let confusion = p
            .critical_confusion(
                "PAL456, line up and wait runway 24",
                "Cleared for takeoff runway 24, PAL456",
            )
            .unwrap();
        assert_eq!(confusion.expected, "line up and wait");
        assert_eq!(confusion.actual, "cleared for takeoff");
        assert!(
            p.critical_confusion("line up and wait runway 24", "line up and wait runway 24")
                .is_none()
        );
    }

    #[test]
    fn test_conflicts_used_by_controller_are_ignored() {
        let p = phraseology();
        assert!(
            p.critical_confusion(
                "cross runway 06, hold short runway 24",
                "crossing 06, holding short 24"
            )
            .is_none()
        );
    }

    #[test]
    fn test_non_native_phrasing() {
        let p = phraseology();
        let hits = p.non_native_phrases("Yes, going up to flight level 350 thank you");
        let kinds: Vec<_> = hits.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec!["plain_language", "affirmation", "courtesy"]);

        let numbers = p.non_icao_numbers("squawk two four nine one");
        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].icao, "niner");
        assert!(p.non_icao_numbers("squawk two four niner one").is_empty());
    }

    #[test]
    fn test_requirements_are_compiled() {
        let p = phraseology();
        let takeoff = p.requirement(InstructionType::Takeoff).unwrap();
        assert!(takeoff.requires_runway);
        assert!(takeoff.required_phrase.as_ref().unwrap().is_match("Cleared for take-off"));
        assert!(p.requirement(InstructionType::Information).is_none());
    }
}
