//! Exchange pairing and readback evaluation.
//!
//! Every ATC line that needs a readback is paired with the next pilot line
//! inside the response window. The pilot line is then checked against the
//! controller's instruction in a fixed order: bare acknowledgments first, then
//! parameter confusion, then the per-type checks.

use aviation_helper_rs::clearance::{instruction::InstructionType, phase::FlightPhase};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    callsign::CallsignMatcher,
    config::EngineConfig,
    context::ConversationContext,
    detection::{ErrorKind, classify_value_mismatch},
    dialogue::{ParsedLine, Speaker},
    errors::Error,
    extraction::{InstructionClassifier, ValueExtractor},
    phraseology::Phraseology,
    rules::compile,
    severity::Severity,
};

#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReadbackQuality {
    Complete,
    Partial,
    Missing,
    Incorrect,
}

/// What made a readback less than complete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReadbackIssue {
    pub kind: ErrorKind,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl ReadbackIssue {
    pub fn new(kind: ErrorKind, expected: Option<String>, actual: Option<String>) -> Self {
        Self {
            kind,
            expected,
            actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReadbackVerdict {
    pub quality: ReadbackQuality,
    pub issue: Option<ReadbackIssue>,
    /// How sure the evaluator is of its own verdict.
    pub evaluation_confidence: f64,
}

impl ReadbackVerdict {
    fn complete(evaluation_confidence: f64) -> Self {
        Self {
            quality: ReadbackQuality::Complete,
            issue: None,
            evaluation_confidence,
        }
    }

    fn with_issue(
        quality: ReadbackQuality,
        issue: ReadbackIssue,
        evaluation_confidence: f64,
    ) -> Self {
        Self {
            quality,
            issue: Some(issue),
            evaluation_confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExchangePair {
    pub atc_line: ParsedLine,
    pub pilot_line: Option<ParsedLine>,
    pub instruction_type: InstructionType,
    pub readback_quality: ReadbackQuality,
    /// Lines between the instruction and the response.
    pub response_delay: Option<usize>,
    pub contextual_severity: Severity,
    pub issue: Option<ReadbackIssue>,
    pub evaluation_confidence: f64,
}

/// Severity of a readback given where in the flight it happened.
pub fn contextual_severity(
    instruction: InstructionType,
    quality: ReadbackQuality,
    phase: FlightPhase,
    emergency: bool,
) -> Severity {
    if emergency {
        return match quality {
            ReadbackQuality::Missing | ReadbackQuality::Incorrect => Severity::Critical,
            _ => Severity::High,
        };
    }
    let base = match quality {
        ReadbackQuality::Incorrect => return Severity::Critical,
        ReadbackQuality::Complete => return Severity::Low,
        ReadbackQuality::Missing => Severity::Medium,
        ReadbackQuality::Partial => Severity::Low,
    };
    let mut severity = base;
    if instruction.is_safety_critical() {
        severity = severity.escalate();
    }
    if phase.is_safety_critical() {
        severity = severity.escalate();
    }
    severity
}

#[derive(Debug, Clone)]
pub struct ReadbackEvaluator {
    extractor: ValueExtractor,
    phraseology: Phraseology,
    callsigns: CallsignMatcher,
    acknowledgment: Regex,
    condition: Regex,
    condition_violation: Regex,
    constraint: Regex,
    ack_max_words: usize,
}

impl ReadbackEvaluator {
    pub fn new(
        phraseology: Phraseology,
        callsigns: CallsignMatcher,
        config: &EngineConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            extractor: ValueExtractor::new()?,
            phraseology,
            callsigns,
            acknowledgment: compile(
                r"^[\s,.!]*(?:(?:roger|copy|copied|wilco|ok|okay|understood|got it)[\s,.!]*)+$",
            )?,
            condition: compile(r"\b(after|behind|until|when)\b")?,
            condition_violation: compile(r"\b(?:now|immediately)\b")?,
            constraint: compile(r"\b(at or above|at or below|expedite|not below|not above)\b")?,
            ack_max_words: config.ack_max_words,
        })
    }

    pub fn extractor(&self) -> &ValueExtractor {
        &self.extractor
    }

    /// `roger`, `copy`, `wilco` and friends with nothing but a callsign.
    pub fn is_bare_acknowledgment(&self, pilot: &str) -> bool {
        if pilot.split_whitespace().count() > self.ack_max_words {
            return false;
        }
        let stripped = self.callsigns.strip(pilot);
        self.acknowledgment.is_match(stripped.trim())
    }

    fn summary(&self, instruction: InstructionType, atc: &str) -> String {
        match self.extractor.instruction_value(instruction, atc) {
            Some(value) => format!("{instruction} {}", value.display),
            None => self
                .callsigns
                .strip(atc)
                .trim_matches(|c: char| c.is_whitespace() || c == ',')
                .to_string(),
        }
    }

    fn parameter_confusion(
        &self,
        instruction: InstructionType,
        atc: &str,
        pilot: &str,
    ) -> Option<ReadbackIssue> {
        if !instruction.is_numeric_parameter() {
            return None;
        }
        let expected = self.extractor.instruction_value(instruction, atc)?;
        let keyword_values = self.extractor.keyword_values(pilot);
        if keyword_values
            .iter()
            .any(|(kind, value)| *kind == instruction && value.same_value(&expected))
        {
            return None;
        }
        keyword_values
            .into_iter()
            .find(|(kind, value)| *kind != instruction && value.same_value(&expected))
            .map(|(kind, value)| {
                ReadbackIssue::new(
                    ErrorKind::ParameterConfusion,
                    Some(format!("{instruction} {}", expected.display)),
                    Some(format!("{kind} {}", value.display)),
                )
            })
    }

    /// Judges `pilot` as a readback of `atc`. Both are normalized text.
    pub fn evaluate(
        &self,
        instruction: InstructionType,
        atc: &str,
        pilot: &str,
    ) -> ReadbackVerdict {
        use ReadbackQuality::*;

        if instruction == InstructionType::Unknown {
            return self.evaluate_generic(pilot);
        }

        if self.is_bare_acknowledgment(pilot) {
            return ReadbackVerdict::with_issue(
                Missing,
                ReadbackIssue::new(
                    ErrorKind::RogerSubstitution,
                    Some(self.summary(instruction, atc)),
                    Some(pilot.trim().to_string()),
                ),
                0.95,
            );
        }

        if let Some(issue) = self.parameter_confusion(instruction, atc, pilot) {
            return ReadbackVerdict::with_issue(Incorrect, issue, 0.85);
        }

        if let Some(confusion) = self.phraseology.critical_confusion(atc, pilot) {
            return ReadbackVerdict::with_issue(
                Incorrect,
                ReadbackIssue::new(
                    ErrorKind::CriticalConfusion,
                    Some(confusion.expected),
                    Some(confusion.actual),
                ),
                0.95,
            );
        }

        let mut checked = false;
        let mut partial: Option<ReadbackIssue> = None;
        let mut note = |issue: ReadbackIssue| {
            partial.get_or_insert(issue);
        };

        if let Some(expected) = self.extractor.instruction_value(instruction, atc) {
            checked = true;
            // Callsign digits must not stand in for a dropped value.
            let pilot_values = self.callsigns.strip(pilot);
            match self.extractor.readback_value(instruction, &pilot_values, &expected) {
                None => {
                    return ReadbackVerdict::with_issue(
                        Missing,
                        ReadbackIssue::new(
                            ErrorKind::IncompleteReadback,
                            Some(expected.display),
                            None,
                        ),
                        0.8,
                    );
                }
                Some(actual) if !actual.same_value(&expected) => {
                    return ReadbackVerdict::with_issue(
                        Incorrect,
                        ReadbackIssue::new(
                            classify_value_mismatch(&expected.digits, &actual.digits),
                            Some(expected.display),
                            Some(actual.display),
                        ),
                        0.95,
                    );
                }
                Some(_) => {}
            }
        }

        if instruction == InstructionType::Heading {
            if let (Some(expected), Some(actual)) = (
                self.extractor.turn_direction(atc),
                self.extractor.turn_direction(pilot),
            ) {
                if expected != actual {
                    return ReadbackVerdict::with_issue(
                        Incorrect,
                        ReadbackIssue::new(
                            ErrorKind::WrongDirection,
                            Some(expected.to_string()),
                            Some(actual.to_string()),
                        ),
                        0.95,
                    );
                }
            }
        }

        let requirement = self.phraseology.requirement(instruction);

        if requirement.is_some_and(|r| r.requires_runway) {
            if let Some(expected) = self.extractor.runway(atc) {
                checked = true;
                match self.extractor.runway(pilot) {
                    None => note(ReadbackIssue::new(
                        ErrorKind::MissingElement,
                        Some(format!("runway {expected}")),
                        None,
                    )),
                    Some(actual) if actual.number != expected.number => {
                        return ReadbackVerdict::with_issue(
                            Incorrect,
                            ReadbackIssue::new(
                                ErrorKind::WrongRunway,
                                Some(expected.to_string()),
                                Some(actual.to_string()),
                            ),
                            0.9,
                        );
                    }
                    Some(actual)
                        if expected.designator.is_some()
                            && actual.designator != expected.designator =>
                    {
                        if actual.designator.is_none() {
                            note(ReadbackIssue::new(
                                ErrorKind::MissingDesignator,
                                Some(expected.to_string()),
                                Some(actual.to_string()),
                            ));
                        } else {
                            return ReadbackVerdict::with_issue(
                                Incorrect,
                                ReadbackIssue::new(
                                    ErrorKind::WrongRunway,
                                    Some(expected.to_string()),
                                    Some(actual.to_string()),
                                ),
                                0.9,
                            );
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(requirement) = requirement {
            for pattern in [&requirement.companion, &requirement.required_phrase]
                .into_iter()
                .flatten()
            {
                if let Some(found) = pattern.find(atc) {
                    checked = true;
                    if !pattern.is_match(pilot) {
                        note(ReadbackIssue::new(
                            ErrorKind::MissingElement,
                            Some(found.as_str().to_lowercase()),
                            None,
                        ));
                    }
                }
            }
        }

        if let Some(condition) = self.condition.find(atc) {
            let word = condition.as_str().to_lowercase();
            let repeated = self
                .condition
                .find_iter(pilot)
                .any(|m| m.as_str().eq_ignore_ascii_case(&word));
            if !repeated {
                if let Some(violation) = self.condition_violation.find(pilot) {
                    return ReadbackVerdict::with_issue(
                        Incorrect,
                        ReadbackIssue::new(
                            ErrorKind::ConditionViolated,
                            Some(word),
                            Some(violation.as_str().to_lowercase()),
                        ),
                        0.85,
                    );
                }
                note(ReadbackIssue::new(ErrorKind::ConditionOmitted, Some(word), None));
            }
        }

        if let Some(constraint) = self.constraint.find(atc) {
            let phrase = constraint.as_str().to_lowercase();
            let repeated = self
                .constraint
                .find_iter(pilot)
                .any(|m| m.as_str().eq_ignore_ascii_case(&phrase));
            if !repeated {
                note(ReadbackIssue::new(ErrorKind::ConstraintMissing, Some(phrase), None));
            }
        }

        let named = match instruction {
            InstructionType::Approach => Some((
                self.extractor.approach_type(atc),
                self.extractor.approach_type(pilot),
            )),
            InstructionType::Direct => Some((
                self.extractor.direct_waypoint(atc),
                self.extractor.direct_waypoint(pilot),
            )),
            _ => None,
        };
        if let Some((Some(expected), actual)) = named {
            checked = true;
            match actual {
                None => note(ReadbackIssue::new(ErrorKind::MissingElement, Some(expected), None)),
                Some(actual) if actual != expected => {
                    return ReadbackVerdict::with_issue(
                        Incorrect,
                        ReadbackIssue::new(ErrorKind::WrongValue, Some(expected), Some(actual)),
                        0.9,
                    );
                }
                Some(_) => {}
            }
        }

        match partial {
            Some(issue) => ReadbackVerdict::with_issue(Partial, issue, 0.8),
            None if checked => ReadbackVerdict::complete(0.9),
            None => ReadbackVerdict::complete(0.7),
        }
    }

    /// Instructions the classifier could not place: any response of three or
    /// more words counts.
    fn evaluate_generic(&self, pilot: &str) -> ReadbackVerdict {
        if pilot.split_whitespace().count() >= 3 {
            ReadbackVerdict::complete(0.5)
        } else {
            ReadbackVerdict::with_issue(
                ReadbackQuality::Partial,
                ReadbackIssue::new(
                    ErrorKind::IncompleteReadback,
                    None,
                    Some(pilot.trim().to_string()),
                ),
                0.5,
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangePairer {
    classifier: InstructionClassifier,
    evaluator: ReadbackEvaluator,
    response_window: usize,
}

impl ExchangePairer {
    pub fn new(evaluator: ReadbackEvaluator, config: &EngineConfig) -> Result<Self, Error> {
        Ok(Self {
            classifier: InstructionClassifier::new()?,
            evaluator,
            response_window: config.response_window,
        })
    }

    pub fn classifier(&self) -> &InstructionClassifier {
        &self.classifier
    }

    pub fn evaluator(&self) -> &ReadbackEvaluator {
        &self.evaluator
    }

    /// Pairs every ATC instruction with its readback. Non-complete readbacks
    /// are recorded in the context's issue accumulator.
    pub fn pair(
        &self,
        lines: &[ParsedLine],
        context: &mut ConversationContext,
    ) -> Vec<ExchangePair> {
        let mut pairs = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            if line.speaker != Speaker::Atc {
                continue;
            }
            let instruction = self.classifier.classify(&line.text);
            if !instruction.requires_readback() {
                debug!("Line {} is information only", line.line_number);
                continue;
            }

            let response = lines
                .iter()
                .enumerate()
                .skip(i + 1)
                .take(self.response_window)
                .find(|(_, l)| l.speaker == Speaker::Pilot);

            let (verdict, pilot_line, response_delay) = match response {
                Some((j, pilot)) => (
                    self.evaluator.evaluate(instruction, &line.text, &pilot.text),
                    Some(pilot.clone()),
                    Some(j - i),
                ),
                None => (
                    ReadbackVerdict::with_issue(
                        ReadbackQuality::Missing,
                        ReadbackIssue::new(
                            ErrorKind::IncompleteReadback,
                            Some(self.evaluator.summary(instruction, &line.text)),
                            None,
                        ),
                        0.6,
                    ),
                    None,
                    None,
                ),
            };

            let severity = contextual_severity(
                instruction,
                verdict.quality,
                context.flight_phase,
                context.escalates_severity(),
            );
            if verdict.quality != ReadbackQuality::Complete {
                let level = context.issue_accumulator.record(line.line_number, severity);
                debug!(
                    "Line {}: {} readback of {instruction}, {severity}, escalation {level}",
                    line.line_number, verdict.quality
                );
            }

            pairs.push(ExchangePair {
                atc_line: line.clone(),
                pilot_line,
                instruction_type: instruction,
                readback_quality: verdict.quality,
                response_delay,
                contextual_severity: severity,
                issue: verdict.issue,
                evaluation_confidence: verdict.evaluation_confidence,
            });
        }
        pairs
    }
}
