use std::collections::BTreeMap;

use aviation_helper_rs::clearance::{instruction::InstructionType, phase::FlightPhase};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{detection::ErrorKind, errors::Error, severity::Severity};

pub const ERROR_WEIGHT_MIN: f64 = 0.1;
pub const ERROR_WEIGHT_MAX: f64 = 3.0;
pub const PHASE_WEIGHT_MIN: f64 = 0.3;
pub const PHASE_WEIGHT_MAX: f64 = 2.0;
pub const PATTERN_WEIGHT_MIN: f64 = 0.5;
pub const PATTERN_WEIGHT_MAX: f64 = 1.5;
pub const ERROR_DETECTION_MIN: f64 = 0.4;
pub const ERROR_DETECTION_MAX: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeverityWeights {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 1.3,
            high: 1.2,
            medium: 1.0,
            low: 1.0,
        }
    }
}

impl SeverityWeights {
    pub fn get(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    /// Minimum correctness score for a readback to count as correct.
    pub error_detection: f64,
    /// Minimum indicator score for a detected phase to be used.
    pub phase_confidence: f64,
    /// Minimum share of complete readbacks for a dialogue to pass.
    pub readback_accuracy: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            error_detection: 0.7,
            phase_confidence: 0.5,
            readback_accuracy: 0.8,
        }
    }
}

/// Everything the analysis reads from the adaptive model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelWeights {
    /// Per instruction type, scales the readback confidence factor.
    pub pattern_weights: BTreeMap<String, f64>,
    pub error_weights: BTreeMap<String, f64>,
    pub phase_weights: BTreeMap<String, f64>,
    pub severity_weights: SeverityWeights,
    pub thresholds: Thresholds,
}

impl Default for ModelWeights {
    fn default() -> Self {
        let pattern_weights = InstructionType::iter()
            .map(|i| (i.to_string(), 1.0))
            .collect();
        let error_weights = ErrorKind::FIXED
            .iter()
            .map(|k| (k.to_string(), 1.0))
            .collect();
        let phase_weights = FlightPhase::iter()
            .map(|phase| {
                let weight = match phase {
                    FlightPhase::Landing => 1.2,
                    FlightPhase::Approach => 1.15,
                    FlightPhase::Departure => 1.1,
                    FlightPhase::Ground => 0.9,
                    FlightPhase::Enroute | FlightPhase::Unknown => 1.0,
                };
                (phase.to_string(), weight)
            })
            .collect();
        Self {
            pattern_weights,
            error_weights,
            phase_weights,
            severity_weights: SeverityWeights::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl ModelWeights {
    pub fn error_weight(&self, kind: &ErrorKind) -> f64 {
        self.error_weights
            .get(&kind.to_string())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn phase_weight(&self, phase: FlightPhase) -> f64 {
        self.phase_weights
            .get(phase.as_ref())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn pattern_weight(&self, instruction: InstructionType) -> f64 {
        self.pattern_weights
            .get(instruction.as_ref())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn severity_weight(&self, severity: Severity) -> f64 {
        self.severity_weights.get(severity)
    }

    /// Every value of the pattern, error and phase maps.
    pub fn all_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.pattern_weights
            .values()
            .chain(self.error_weights.values())
            .chain(self.phase_weights.values())
            .copied()
    }

    /// Checks every bound the learning rules maintain.
    pub fn validate(&self) -> Result<(), Error> {
        check_map("pattern", &self.pattern_weights, PATTERN_WEIGHT_MIN, PATTERN_WEIGHT_MAX)?;
        check_map("error", &self.error_weights, ERROR_WEIGHT_MIN, ERROR_WEIGHT_MAX)?;
        check_map("phase", &self.phase_weights, PHASE_WEIGHT_MIN, PHASE_WEIGHT_MAX)?;

        let t = &self.thresholds;
        if !(ERROR_DETECTION_MIN..=ERROR_DETECTION_MAX).contains(&t.error_detection) {
            return Err(Error::InvalidState(format!(
                "error_detection threshold {} outside [{ERROR_DETECTION_MIN}, {ERROR_DETECTION_MAX}]",
                t.error_detection
            )));
        }
        for (name, value) in [
            ("phase_confidence", t.phase_confidence),
            ("readback_accuracy", t.readback_accuracy),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(Error::InvalidState(format!("{name} threshold {value} outside (0, 1)")));
            }
        }

        let s = &self.severity_weights;
        if [s.critical, s.high, s.medium, s.low]
            .iter()
            .any(|w| !w.is_finite() || *w <= 0.0)
        {
            return Err(Error::InvalidState("severity weights must be positive".to_string()));
        }
        Ok(())
    }
}

fn check_map(name: &str, map: &BTreeMap<String, f64>, min: f64, max: f64) -> Result<(), Error> {
    match map.iter().find(|(_, w)| !(min..=max).contains(*w)) {
        Some((key, w)) => Err(Error::InvalidState(format!(
            "{name} weight {key} = {w} outside [{min}, {max}]"
        ))),
        None => Ok(()),
    }
}
