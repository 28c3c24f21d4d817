//! Weighted error detection and severity rollup.
//!
//! Turns an evaluated exchange into concrete [`DetectedError`]s, weighs them
//! with the adaptive model's current weights and rolls them up into a single
//! severity, confidence and correctness score.

use std::{fmt, str::FromStr};

use aviation_helper_rs::clearance::{instruction::InstructionType, phase::FlightPhase};
use serde::{Deserialize, Serialize};

use crate::{
    callsign::CallsignMatcher,
    errors::Error,
    extraction::ValueExtractor,
    model::weights::ModelWeights,
    pairing::{ExchangePair, ReadbackIssue},
    phraseology::Phraseology,
    severity::Severity,
};

const NON_NATIVE_PREFIX: &str = "non_native_";

#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(into = "String", try_from = "String")]
pub enum ErrorKind {
    WrongValue,
    Transposition,
    MissingElement,
    IncompleteReadback,
    WrongDirection,
    MissingCallsign,
    ParameterConfusion,
    ConditionOmitted,
    ConditionViolated,
    ConstraintMissing,
    RogerSubstitution,
    CriticalConfusion,
    WrongRunway,
    MissingDesignator,
    /// `non_native_<kind>`, one per knowledge base phrase family.
    NonNative(String),
}

impl ErrorKind {
    /// Every kind with a fixed name.
    pub const FIXED: [ErrorKind; 14] = [
        ErrorKind::WrongValue,
        ErrorKind::Transposition,
        ErrorKind::MissingElement,
        ErrorKind::IncompleteReadback,
        ErrorKind::WrongDirection,
        ErrorKind::MissingCallsign,
        ErrorKind::ParameterConfusion,
        ErrorKind::ConditionOmitted,
        ErrorKind::ConditionViolated,
        ErrorKind::ConstraintMissing,
        ErrorKind::RogerSubstitution,
        ErrorKind::CriticalConfusion,
        ErrorKind::WrongRunway,
        ErrorKind::MissingDesignator,
    ];

    fn fixed_name(&self) -> Option<&'static str> {
        Some(match self {
            ErrorKind::WrongValue => "wrong_value",
            ErrorKind::Transposition => "transposition",
            ErrorKind::MissingElement => "missing_element",
            ErrorKind::IncompleteReadback => "incomplete_readback",
            ErrorKind::WrongDirection => "wrong_direction",
            ErrorKind::MissingCallsign => "missing_callsign",
            ErrorKind::ParameterConfusion => "parameter_confusion",
            ErrorKind::ConditionOmitted => "condition_omitted",
            ErrorKind::ConditionViolated => "condition_violated",
            ErrorKind::ConstraintMissing => "constraint_missing",
            ErrorKind::RogerSubstitution => "roger_substitution",
            ErrorKind::CriticalConfusion => "critical_confusion",
            ErrorKind::WrongRunway => "wrong_runway",
            ErrorKind::MissingDesignator => "missing_designator",
            ErrorKind::NonNative(_) => return None,
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NonNative(kind) => write!(f, "{NON_NATIVE_PREFIX}{kind}"),
            fixed => f.write_str(fixed.fixed_name().unwrap_or_default()),
        }
    }
}

impl FromStr for ErrorKind {
    type Err = Error;
    fn from_str(val: &str) -> Result<Self, Self::Err> {
        let val = val.trim();
        if let Some(kind) = val.strip_prefix(NON_NATIVE_PREFIX) {
            if !kind.is_empty() {
                return Ok(ErrorKind::NonNative(kind.to_string()));
            }
        }
        ErrorKind::FIXED
            .iter()
            .find(|k| k.fixed_name() == Some(val))
            .cloned()
            .ok_or_else(|| Error::UnknownErrorKind(val.to_string()))
    }
}

impl From<ErrorKind> for String {
    fn from(kind: ErrorKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for ErrorKind {
    type Error = Error;
    fn try_from(val: String) -> Result<Self, Self::Error> {
        val.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DetectedError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub description: String,
    pub severity: Severity,
    /// 0..=1
    pub confidence: f64,
    pub weight: f64,
    pub correction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl DetectedError {
    fn new(kind: ErrorKind, description: String, severity: Severity, confidence: f64) -> Self {
        Self {
            kind,
            description,
            severity,
            confidence,
            weight: 1.0,
            correction: None,
            expected: None,
            actual: None,
        }
    }

    fn with_correction(mut self, correction: impl Into<String>) -> Self {
        self.correction = Some(correction.into());
        self
    }

    fn with_values(mut self, expected: Option<String>, actual: Option<String>) -> Self {
        self.expected = expected;
        self.actual = actual;
        self
    }

    /// What this error takes off the correctness score.
    pub fn penalty(&self) -> f64 {
        self.confidence * self.weight * self.severity.penalty()
    }
}

fn numeric(val: &str) -> bool {
    !val.is_empty() && val.chars().all(|c| c.is_ascii_digit())
}

/// Two adjacent or near-adjacent digits swapped: `2461` read back as `2416`.
pub fn is_transposition(expected: &str, actual: &str) -> bool {
    if !numeric(expected) || !numeric(actual) {
        return false;
    }
    let a = expected.as_bytes();
    let b = actual.as_bytes();
    if a.len() != b.len() || a.len() < 2 {
        return false;
    }
    let diffs: Vec<usize> = (0..a.len()).filter(|&i| a[i] != b[i]).collect();
    match diffs[..] {
        [i, j] => a[i] == b[j] && a[j] == b[i] && j - i <= 2,
        _ => false,
    }
}

/// Off by a factor of ten or a hundred: `15000` read back as `1500`.
pub fn is_magnitude_error(expected: &str, actual: &str) -> bool {
    if is_transposition(expected, actual) || !numeric(expected) || !numeric(actual) {
        return false;
    }
    let (Ok(a), Ok(b)) = (expected.parse::<u64>(), actual.parse::<u64>()) else {
        return false;
    };
    let (min, max) = (a.min(b), a.max(b));
    min > 0 && max % min == 0 && matches!(max / min, 10 | 100)
}

pub fn classify_value_mismatch(expected: &str, actual: &str) -> ErrorKind {
    if is_transposition(expected, actual) {
        ErrorKind::Transposition
    } else {
        ErrorKind::WrongValue
    }
}

#[derive(Debug, Clone)]
pub struct ErrorDetector {
    extractor: ValueExtractor,
    phraseology: Phraseology,
    callsigns: CallsignMatcher,
}

impl ErrorDetector {
    pub fn new(phraseology: Phraseology, callsigns: CallsignMatcher) -> Result<Self, Error> {
        Ok(Self {
            extractor: ValueExtractor::new()?,
            phraseology,
            callsigns,
        })
    }

    /// Concrete errors in one exchange, weighted with the model's current
    /// error weights. When `expected_callsign` is given the pilot has to use
    /// exactly that callsign.
    pub fn detect_errors(
        &self,
        exchange: &ExchangePair,
        weights: &ModelWeights,
        expected_callsign: Option<&str>,
    ) -> Vec<DetectedError> {
        let instruction = exchange.instruction_type;
        let mut errors: Vec<DetectedError> = Vec::new();

        if let Some(issue) = &exchange.issue {
            errors.push(self.from_issue(instruction, issue, exchange.pilot_line.is_some()));
        }

        if let Some(pilot_line) = &exchange.pilot_line {
            let atc = exchange.atc_line.text.as_str();
            let pilot = pilot_line.text.as_str();

            if let (Some(expected), Some(actual)) = (
                self.extractor.turn_direction(atc),
                self.extractor.turn_direction(pilot),
            ) {
                if expected != actual && !contains(&errors, &ErrorKind::WrongDirection) {
                    errors.push(
                        DetectedError::new(
                            ErrorKind::WrongDirection,
                            format!("Turn {expected} was read back as {actual}"),
                            Severity::Critical,
                            0.95,
                        )
                        .with_correction(format!("Turn {expected}"))
                        .with_values(Some(expected.to_string()), Some(actual.to_string())),
                    );
                }
            }

            if !contains(&errors, &ErrorKind::CriticalConfusion) {
                if let Some(confusion) = self.phraseology.critical_confusion(atc, pilot) {
                    errors.push(critical_confusion(
                        confusion.expected,
                        confusion.actual,
                        confusion.description,
                    ));
                }
            }

            if !self.has_callsign(pilot, expected_callsign) {
                let description = match expected_callsign {
                    Some(callsign) => format!("Readback does not end with the callsign {callsign}"),
                    None => "Readback carries no callsign".to_string(),
                };
                let mut error =
                    DetectedError::new(ErrorKind::MissingCallsign, description, Severity::Low, 0.7)
                        .with_correction("End every readback with your callsign");
                if let Some(callsign) = expected_callsign {
                    error = error.with_values(Some(callsign.to_uppercase()), None);
                }
                errors.push(error);
            }

            for hit in self.phraseology.non_native_phrases(&pilot_line.raw_text) {
                errors.push(
                    DetectedError::new(
                        ErrorKind::NonNative(hit.kind.to_string()),
                        format!("Non-standard phrase \"{}\"", hit.found),
                        Severity::Low,
                        0.6,
                    )
                    .with_correction(hit.standard)
                    .with_values(None, Some(hit.found)),
                );
            }
            for rule in self.phraseology.non_icao_numbers(&pilot_line.raw_text) {
                errors.push(
                    DetectedError::new(
                        ErrorKind::NonNative("pronunciation".to_string()),
                        format!("\"{}\" is not ICAO pronunciation", rule.word),
                        Severity::Low,
                        0.6,
                    )
                    .with_correction(format!("say \"{}\"", rule.icao))
                    .with_values(Some(rule.icao.clone()), Some(rule.word.clone())),
                );
            }
        }

        for error in &mut errors {
            error.weight = weights.error_weight(&error.kind);
            if error.kind == ErrorKind::MissingCallsign {
                error.weight *= 0.8;
            }
        }
        errors
    }

    fn has_callsign(&self, pilot: &str, expected: Option<&str>) -> bool {
        match expected {
            Some(expected) => {
                let expected: String = expected
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_uppercase();
                self.callsigns
                    .find_all(pilot)
                    .iter()
                    .any(|m| m.normalized == expected)
            }
            None => self.callsigns.contains_callsign(pilot),
        }
    }

    fn from_issue(
        &self,
        instruction: InstructionType,
        issue: &ReadbackIssue,
        answered: bool,
    ) -> DetectedError {
        let expected = issue.expected.clone().unwrap_or_default();
        let actual = issue.actual.clone().unwrap_or_default();
        let safety = instruction.is_safety_critical();
        let elevated = if safety { Severity::High } else { Severity::Medium };

        let error = match &issue.kind {
            ErrorKind::WrongValue if is_magnitude_error(&expected, &actual) => DetectedError::new(
                ErrorKind::WrongValue,
                format!(
                    "{instruction} {expected} read back as {actual}, off by a factor of ten or more"
                ),
                if safety { Severity::Critical } else { Severity::High },
                0.9,
            )
            .with_correction(format!("Read back {expected}")),
            ErrorKind::WrongValue => DetectedError::new(
                ErrorKind::WrongValue,
                format!("{instruction} {expected} read back as {actual}"),
                if safety { Severity::Critical } else { Severity::High },
                0.9,
            )
            .with_correction(format!("Read back {expected}")),
            ErrorKind::Transposition => DetectedError::new(
                ErrorKind::Transposition,
                format!("Digits of {expected} transposed to {actual}"),
                Severity::High,
                0.9,
            )
            .with_correction(format!("Read back {expected}")),
            ErrorKind::ParameterConfusion => DetectedError::new(
                ErrorKind::ParameterConfusion,
                format!("{expected} read back as {actual}"),
                Severity::High,
                0.85,
            )
            .with_correction(format!("Read back {expected}")),
            ErrorKind::RogerSubstitution => DetectedError::new(
                ErrorKind::RogerSubstitution,
                format!(
                    "\"{actual}\" acknowledges but does not read back the {instruction} instruction"
                ),
                elevated,
                0.9,
            )
            .with_correction(format!("Read back {expected}")),
            ErrorKind::IncompleteReadback if !answered => DetectedError::new(
                ErrorKind::IncompleteReadback,
                format!("No readback of the {instruction} instruction"),
                elevated,
                0.8,
            ),
            ErrorKind::IncompleteReadback => DetectedError::new(
                ErrorKind::IncompleteReadback,
                if expected.is_empty() {
                    "Readback is too short to confirm the instruction".to_string()
                } else {
                    format!("{instruction} {expected} missing from the readback")
                },
                elevated,
                0.8,
            ),
            ErrorKind::MissingElement => DetectedError::new(
                ErrorKind::MissingElement,
                format!("\"{expected}\" missing from the {instruction} readback"),
                Severity::Medium,
                0.75,
            )
            .with_correction(format!("Include \"{expected}\"")),
            ErrorKind::WrongDirection => DetectedError::new(
                ErrorKind::WrongDirection,
                format!("Turn {expected} was read back as {actual}"),
                Severity::Critical,
                0.95,
            )
            .with_correction(format!("Turn {expected}")),
            ErrorKind::CriticalConfusion => {
                return critical_confusion(expected, actual, "safety-critical phrase inverted");
            }
            ErrorKind::WrongRunway => DetectedError::new(
                ErrorKind::WrongRunway,
                format!("Runway {expected} read back as {actual}"),
                Severity::Critical,
                0.9,
            )
            .with_correction(format!("Runway {expected}")),
            ErrorKind::MissingDesignator => DetectedError::new(
                ErrorKind::MissingDesignator,
                format!("Runway designator missing: {expected} read back as {actual}"),
                Severity::High,
                0.8,
            )
            .with_correction(format!("Runway {expected}")),
            ErrorKind::ConditionOmitted => DetectedError::new(
                ErrorKind::ConditionOmitted,
                format!("Conditional clearance read back without its \"{expected}\" condition"),
                Severity::High,
                0.8,
            )
            .with_correction("Repeat the condition before the clearance"),
            ErrorKind::ConditionViolated => DetectedError::new(
                ErrorKind::ConditionViolated,
                format!("Conditional clearance (\"{expected}\") read back as \"{actual}\""),
                Severity::Critical,
                0.85,
            )
            .with_correction("Wait for the condition; do not act now"),
            ErrorKind::ConstraintMissing => DetectedError::new(
                ErrorKind::ConstraintMissing,
                format!("Constraint \"{expected}\" missing from the readback"),
                Severity::Medium,
                0.75,
            )
            .with_correction(format!("Include \"{expected}\"")),
            other => DetectedError::new(
                other.clone(),
                format!("{other} in the {instruction} readback"),
                Severity::Low,
                0.6,
            ),
        };
        error.with_values(issue.expected.clone(), issue.actual.clone())
    }
}

fn critical_confusion(expected: String, actual: String, description: &str) -> DetectedError {
    DetectedError::new(
        ErrorKind::CriticalConfusion,
        format!("\"{expected}\" read back as \"{actual}\": {description}"),
        Severity::Critical,
        0.95,
    )
    .with_correction(format!("Read back \"{expected}\" exactly"))
    .with_values(Some(expected), Some(actual))
}

fn contains(errors: &[DetectedError], kind: &ErrorKind) -> bool {
    errors.iter().any(|e| &e.kind == kind)
}

/// Weighted average of the phase, readback and remaining factors.
pub fn overall_confidence(
    phase_confidence: f64,
    readback_confidence: f64,
    pattern_weight: f64,
    errors: &[DetectedError],
) -> f64 {
    let readback = (readback_confidence * pattern_weight).min(1.0);
    let other = if errors.is_empty() {
        0.9
    } else {
        errors.iter().map(|e| e.confidence).sum::<f64>() / errors.len() as f64
    };
    (0.2 * phase_confidence + 0.5 * readback + 0.3 * other).clamp(0.0, 1.0)
}

pub fn severity_score(error: &DetectedError, weights: &ModelWeights, phase: FlightPhase) -> f64 {
    error.severity.base_score()
        * weights.severity_weight(error.severity)
        * error.weight
        * weights.phase_weight(phase)
}

/// Highest weighted score over all errors; low when there are none.
pub fn rollup_severity(
    errors: &[DetectedError],
    weights: &ModelWeights,
    phase: FlightPhase,
) -> Severity {
    errors
        .iter()
        .map(|e| severity_score(e, weights, phase))
        .fold(None, |best: Option<f64>, score| Some(best.map_or(score, |b| b.max(score))))
        .map(Severity::from_score)
        .unwrap_or(Severity::Low)
}

/// `max(0, 1 - sum of penalties)`.
pub fn correctness(errors: &[DetectedError]) -> f64 {
    (1.0 - errors.iter().map(DetectedError::penalty).sum::<f64>()).max(0.0)
}

/// One guidance line per error, recurring errors from earlier attempts marked.
pub fn suggestions(
    errors: &[DetectedError],
    previous_errors: &[String],
    systematic: bool,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for error in errors {
        let expected = error.expected.as_deref().unwrap_or("the instruction");
        let actual = error.actual.as_deref().unwrap_or_default();
        let mut line = match &error.kind {
            ErrorKind::Transposition => format!(
                "Digits swapped: say {expected} digit by digit in the order it was given"
            ),
            ErrorKind::WrongValue if is_magnitude_error(expected, actual) => format!(
                "Check the magnitude: {expected} is not {actual}, count the zeros"
            ),
            ErrorKind::WrongValue => format!("Read back the exact value {expected}"),
            ErrorKind::RogerSubstitution => {
                "\"Roger\" is not a readback: repeat the instruction in full".to_string()
            }
            ErrorKind::ParameterConfusion => {
                format!("Keep the parameter and the value together: {expected}")
            }
            ErrorKind::WrongDirection => format!("Confirm the turn direction: {expected}"),
            ErrorKind::CriticalConfusion => {
                format!("Never paraphrase safety-critical clearances: say \"{expected}\"")
            }
            ErrorKind::MissingCallsign => "End the readback with your callsign".to_string(),
            ErrorKind::NonNative(_) => match &error.correction {
                Some(standard) => format!("Use standard phraseology: {standard}"),
                None => "Use standard phraseology".to_string(),
            },
            _ => match &error.correction {
                Some(correction) => correction.clone(),
                None => error.description.clone(),
            },
        };
        let name = error.kind.to_string();
        if previous_errors.iter().any(|p| p.trim() == name) {
            line.push_str(" (recurring)");
        }
        if !out.contains(&line) {
            out.push(line);
        }
    }
    if systematic {
        out.push(
            "Several readbacks in a row had issues: slow down and read back every element"
                .to_string(),
        );
    }
    out
}
