//! Bounded online learning rules.
//!
//! Every rule computes its result on a copy of the weights and commits the
//! copy, the history entries and the counters together at the end.

use std::collections::BTreeSet;

use aviation_helper_rs::clearance::{instruction::InstructionType, phase::FlightPhase};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
    detection::ErrorKind,
    errors::Error,
    model::{
        AdaptiveModelState,
        history::{AccuracySample, MAX_CORRECTIONS_LIMIT, UserCorrection},
        weights::*,
    },
};

/// Samples `recent_accuracy` averages over.
pub const RECENT_WINDOW: usize = 50;

const REINFORCE_PHASE_MIN: f64 = 0.5;
const REINFORCE_PHASE_MAX: f64 = 2.0;
const REINFORCE_ERROR_CAP: f64 = 2.5;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    /// Detected errors below this confidence are dropped from results.
    pub min_confidence: f64,
    pub adaptive_rate_enabled: bool,
    pub reinforcement_enabled: bool,
    pub max_corrections: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            momentum: 0.5,
            min_confidence: 0.3,
            adaptive_rate_enabled: true,
            reinforcement_enabled: true,
            max_corrections: 500,
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> Result<(), Error> {
        check_range("learning_rate", self.learning_rate, 0.01, 0.5)?;
        check_range("momentum", self.momentum, 0.0, 0.9)?;
        check_range("min_confidence", self.min_confidence, 0.0, 1.0)?;
        if !(1..=MAX_CORRECTIONS_LIMIT).contains(&self.max_corrections) {
            return Err(Error::InvalidConfig(format!(
                "max_corrections must be within 1..={MAX_CORRECTIONS_LIMIT}"
            )));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), Error> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} = {value} outside [{min}, {max}]")))
    }
}

/// Partial update of a [`LearningConfig`]; unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LearningConfigPatch {
    pub learning_rate: Option<f64>,
    pub momentum: Option<f64>,
    pub min_confidence: Option<f64>,
    pub adaptive_rate_enabled: Option<bool>,
    pub reinforcement_enabled: Option<bool>,
    pub max_corrections: Option<usize>,
}

impl LearningConfigPatch {
    /// The patched config, or `InvalidConfig` if any value is out of range.
    pub fn apply_to(&self, config: &LearningConfig) -> Result<LearningConfig, Error> {
        let mut next = config.clone();
        if let Some(v) = self.learning_rate {
            next.learning_rate = v;
        }
        if let Some(v) = self.momentum {
            next.momentum = v;
        }
        if let Some(v) = self.min_confidence {
            next.min_confidence = v;
        }
        if let Some(v) = self.adaptive_rate_enabled {
            next.adaptive_rate_enabled = v;
        }
        if let Some(v) = self.reinforcement_enabled {
            next.reinforcement_enabled = v;
        }
        if let Some(v) = self.max_corrections {
            next.max_corrections = v;
        }
        next.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WeightTarget {
    Pattern,
    Error,
    Phase,
    Threshold,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WeightUpdate {
    pub timestamp: DateTime<Utc>,
    pub target: WeightTarget,
    pub name: String,
    pub old: f64,
    pub new: f64,
    pub reason: String,
}

/// Summary of a finished training session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ReinforcementSession {
    pub total_readbacks: u64,
    pub correct_readbacks: u64,
    #[serde(default)]
    pub common_errors: Vec<ErrorKind>,
    #[serde(default)]
    pub phases: Vec<FlightPhase>,
}

impl ReinforcementSession {
    pub fn accuracy(&self) -> Option<f64> {
        (self.total_readbacks > 0).then(|| {
            self.correct_readbacks.min(self.total_readbacks) as f64 / self.total_readbacks as f64
        })
    }
}

/// Collects weight changes on a working copy of the weights.
struct UpdateLog {
    timestamp: DateTime<Utc>,
    updates: Vec<WeightUpdate>,
}

impl UpdateLog {
    fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            updates: Vec::new(),
        }
    }

    /// Sets `map[name] = f(old)` and records the change if there was one.
    fn adjust(
        &mut self,
        map: &mut std::collections::BTreeMap<String, f64>,
        target: WeightTarget,
        name: &str,
        reason: &str,
        f: impl FnOnce(f64) -> f64,
    ) {
        let old = map.get(name).copied().unwrap_or(1.0);
        let new = f(old);
        map.insert(name.to_string(), new);
        self.record(target, name, old, new, reason);
    }

    fn record(&mut self, target: WeightTarget, name: &str, old: f64, new: f64, reason: &str) {
        if (new - old).abs() > f64::EPSILON {
            self.updates.push(WeightUpdate {
                timestamp: self.timestamp,
                target,
                name: name.to_string(),
                old,
                new,
                reason: reason.to_string(),
            });
        }
    }
}

/// `recent_accuracy`: mean of the newest samples, 0.5 without any.
pub fn recent_accuracy(state: &AdaptiveModelState) -> f64 {
    state.history.mean_accuracy(RECENT_WINDOW).unwrap_or(0.5)
}

/// Learns faster while the model is doing badly.
pub fn effective_learning_rate(state: &AdaptiveModelState) -> f64 {
    let config = &state.config;
    if config.adaptive_rate_enabled {
        config.learning_rate * (1.5 - recent_accuracy(state))
    } else {
        config.learning_rate
    }
}

/// Folds a user correction into the weights. `instruction` is the type the
/// corrected exchange was classified as, if known.
pub fn apply_correction(
    state: &mut AdaptiveModelState,
    mut correction: UserCorrection,
    instruction: Option<InstructionType>,
) -> Vec<WeightUpdate> {
    let lr = effective_learning_rate(state);
    let mut weights = state.weights.clone();
    let mut log = UpdateLog::new();

    let predicted: BTreeSet<String> = correction
        .original
        .predicted_errors
        .iter()
        .map(ToString::to_string)
        .collect();
    let actual: BTreeSet<String> = correction
        .corrected
        .actual_errors
        .iter()
        .map(ToString::to_string)
        .collect();

    for name in predicted.difference(&actual) {
        log.adjust(&mut weights.error_weights, WeightTarget::Error, name, "false positive", |w| {
            (w * (1.0 - lr * 0.5)).max(ERROR_WEIGHT_MIN)
        });
    }
    for name in actual.difference(&predicted) {
        log.adjust(&mut weights.error_weights, WeightTarget::Error, name, "false negative", |w| {
            (w * (1.0 + lr * 0.5)).min(ERROR_WEIGHT_MAX)
        });
    }

    let predicted_phase = correction.original.predicted_phase;
    let actual_phase = correction.corrected.actual_phase;
    if predicted_phase != actual_phase {
        log.adjust(
            &mut weights.phase_weights,
            WeightTarget::Phase,
            predicted_phase.as_ref(),
            "phase predicted wrongly",
            |w| (w * (1.0 - lr)).max(PHASE_WEIGHT_MIN),
        );
        log.adjust(
            &mut weights.phase_weights,
            WeightTarget::Phase,
            actual_phase.as_ref(),
            "phase missed",
            |w| (w * (1.0 + lr)).min(PHASE_WEIGHT_MAX),
        );
    }

    let right = correction.prediction_was_right();
    if !right {
        let old = weights.thresholds.error_detection;
        // Too lenient means errors slipped through: demand a higher score.
        let (delta, reason) = if correction.original.predicted_correct {
            (lr * 0.05, "too lenient")
        } else {
            (-lr * 0.05, "too strict")
        };
        let new = (old + delta).clamp(ERROR_DETECTION_MIN, ERROR_DETECTION_MAX);
        weights.thresholds.error_detection = new;
        log.record(WeightTarget::Threshold, "error_detection", old, new, reason);
    }

    if let Some(instruction) = instruction {
        let (factor, reason) = if right {
            (1.0 + lr * 0.1, "prediction confirmed")
        } else {
            (1.0 - lr * 0.2, "prediction corrected")
        };
        log.adjust(
            &mut weights.pattern_weights,
            WeightTarget::Pattern,
            instruction.as_ref(),
            reason,
            |w| (w * factor).clamp(PATTERN_WEIGHT_MIN, PATTERN_WEIGHT_MAX),
        );
    }

    let previous = state
        .history
        .accuracy_over_time
        .last(1)
        .next()
        .map(|s| s.accuracy)
        .unwrap_or(0.5);
    let momentum = state.config.momentum;
    let outcome = if right { 1.0 } else { 0.0 };
    let sample = (momentum * previous + (1.0 - momentum) * outcome).clamp(0.0, 1.0);

    correction.applied = true;
    let timestamp = log.timestamp;
    let updates = log.updates;

    state.weights = weights;
    state.history.record_outcome(right);
    state.history.accuracy_over_time.push(AccuracySample {
        timestamp,
        accuracy: sample,
    });
    for update in &updates {
        state.history.weight_updates.push(update.clone());
    }
    info!(
        "Applied correction {} (prediction {}), {} weight updates, lr {lr:.4}",
        correction.id,
        if right { "right" } else { "wrong" },
        updates.len()
    );
    state.history.user_corrections.push(correction);
    state.updated_at = timestamp;
    updates
}

/// Session-level reinforcement of phase and error weights.
pub fn reinforce(
    state: &mut AdaptiveModelState,
    session: &ReinforcementSession,
) -> Vec<WeightUpdate> {
    if !state.config.reinforcement_enabled {
        return Vec::new();
    }
    let mut weights = state.weights.clone();
    let mut log = UpdateLog::new();

    let reward = match session.accuracy() {
        Some(accuracy) if accuracy > 0.8 => 0.02,
        Some(accuracy) if accuracy < 0.5 => -0.02,
        _ => 0.0,
    };
    if reward != 0.0 {
        let phases: BTreeSet<FlightPhase> = session.phases.iter().copied().collect();
        for phase in phases {
            log.adjust(
                &mut weights.phase_weights,
                WeightTarget::Phase,
                phase.as_ref(),
                "session reward",
                // A negative reward never lifts a weight that already sits below the floor.
                |w| (w + reward).clamp(REINFORCE_PHASE_MIN.min(w), REINFORCE_PHASE_MAX),
            );
        }
    }

    let lr = state.config.learning_rate;
    let errors: BTreeSet<String> = session.common_errors.iter().map(ToString::to_string).collect();
    for name in &errors {
        log.adjust(
            &mut weights.error_weights,
            WeightTarget::Error,
            name,
            "common in session",
            |w| {
                if w >= REINFORCE_ERROR_CAP {
                    w
                } else {
                    (w * (1.0 + lr * 0.3)).min(REINFORCE_ERROR_CAP)
                }
            },
        );
    }

    let updates = log.updates;
    state.weights = weights;
    for update in &updates {
        state.history.weight_updates.push(update.clone());
    }
    state.updated_at = log.timestamp;
    info!(
        "Reinforced session {}/{} (reward {reward:+.2}), {} weight updates",
        session.correct_readbacks,
        session.total_readbacks,
        updates.len()
    );
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::history::{CorrectedOutcome, PredictedOutcome};

    fn correction(
        predicted_correct: bool,
        actually_correct: bool,
        predicted: &[ErrorKind],
        actual: &[ErrorKind],
        phases: (FlightPhase, FlightPhase),
    ) -> UserCorrection {
        UserCorrection::new(
            PredictedOutcome {
                atc: "PAL456, descend and maintain flight level 250".to_string(),
                pilot: "Descend and maintain flight level 150, PAL456".to_string(),
                predicted_correct,
                predicted_errors: predicted.to_vec(),
                predicted_phase: phases.0,
            },
            CorrectedOutcome {
                is_actually_correct: actually_correct,
                actual_errors: actual.to_vec(),
                actual_phase: phases.1,
                user_feedback: None,
            },
        )
    }

    #[test]
    fn test_patch_validation() {
        let config = LearningConfig::default();
        let patch = LearningConfigPatch {
            learning_rate: Some(0.2),
            reinforcement_enabled: Some(false),
            ..Default::default()
        };
        let next = patch.apply_to(&config).unwrap();
        assert_eq!(next.learning_rate, 0.2);
        assert!(!next.reinforcement_enabled);
        assert_eq!(next.momentum, 0.5);

        for bad in [
            LearningConfigPatch { learning_rate: Some(0.6), ..Default::default() },
            LearningConfigPatch { momentum: Some(0.95), ..Default::default() },
            LearningConfigPatch { min_confidence: Some(-0.1), ..Default::default() },
            LearningConfigPatch { max_corrections: Some(0), ..Default::default() },
            LearningConfigPatch { max_corrections: Some(usize::MAX), ..Default::default() },
        ] {
            assert!(matches!(bad.apply_to(&config), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_effective_learning_rate() {
        let mut state = AdaptiveModelState::default();
        // No samples: recent accuracy 0.5.
        assert!((effective_learning_rate(&state) - 0.1).abs() < 1e-12);
        state.config.adaptive_rate_enabled = false;
        assert_eq!(effective_learning_rate(&state), 0.1);
    }

    #[test]
    fn test_false_positive_and_negative() {
        let mut state = AdaptiveModelState::default();
        let updates = apply_correction(
            &mut state,
            correction(
                false,
                false,
                &[ErrorKind::Transposition],
                &[ErrorKind::WrongValue],
                (FlightPhase::Enroute, FlightPhase::Enroute),
            ),
            None,
        );
        assert_eq!(updates.len(), 2);
        let weights = &state.weights;
        assert!((weights.error_weight(&ErrorKind::Transposition) - 0.95).abs() < 1e-12);
        assert!((weights.error_weight(&ErrorKind::WrongValue) - 1.05).abs() < 1e-12);
        assert_eq!(state.history.total_interactions, 1);
        assert_eq!(state.history.correct_predictions, 1);
        assert!(state.history.user_corrections.iter().all(|c| c.applied));
        // 0.5 * 0.5 + 0.5 * 1.0
        let sample = state.history.accuracy_over_time.last(1).next().unwrap().accuracy;
        assert!((sample - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_phase_and_threshold_updates() {
        let mut state = AdaptiveModelState::default();
        apply_correction(
            &mut state,
            correction(
                true,
                false,
                &[],
                &[ErrorKind::WrongValue],
                (FlightPhase::Enroute, FlightPhase::Approach),
            ),
            Some(InstructionType::Altitude),
        );
        let w = &state.weights;
        assert!((w.phase_weight(FlightPhase::Enroute) - 0.9).abs() < 1e-12);
        assert!((w.phase_weight(FlightPhase::Approach) - 1.265).abs() < 1e-12);
        // Too lenient: threshold goes up by lr * 0.05.
        assert!((w.thresholds.error_detection - 0.705).abs() < 1e-12);
        assert!((w.pattern_weight(InstructionType::Altitude) - 0.98).abs() < 1e-12);
        assert_eq!(state.history.incorrect_predictions, 1);
    }

    #[test]
    fn test_reinforcement() {
        let mut state = AdaptiveModelState::default();
        let session = ReinforcementSession {
            total_readbacks: 10,
            correct_readbacks: 9,
            common_errors: vec![ErrorKind::MissingCallsign],
            phases: vec![FlightPhase::Approach, FlightPhase::Approach],
        };
        let updates = reinforce(&mut state, &session);
        assert_eq!(updates.len(), 2);
        assert!((state.weights.phase_weight(FlightPhase::Approach) - 1.17).abs() < 1e-12);
        assert!((state.weights.error_weight(&ErrorKind::MissingCallsign) - 1.03).abs() < 1e-12);
        assert_eq!(state.history.total_interactions, 0);

        state.config.reinforcement_enabled = false;
        assert!(reinforce(&mut state, &session).is_empty());
    }

    #[test]
    fn test_reinforcement_respects_caps() {
        let mut state = AdaptiveModelState::default();
        state
            .weights
            .error_weights
            .insert("wrong_value".to_string(), 2.8);
        state
            .weights
            .phase_weights
            .insert("ground".to_string(), 0.4);
        let session = ReinforcementSession {
            total_readbacks: 10,
            correct_readbacks: 2,
            common_errors: vec![ErrorKind::WrongValue],
            phases: vec![FlightPhase::Ground],
        };
        let updates = reinforce(&mut state, &session);
        assert!(updates.is_empty());
        assert_eq!(state.weights.error_weight(&ErrorKind::WrongValue), 2.8);
        assert_eq!(state.weights.phase_weight(FlightPhase::Ground), 0.4);

        // Empty session: phases untouched.
        let empty = ReinforcementSession {
            phases: vec![FlightPhase::Ground],
            ..Default::default()
        };
        assert!(reinforce(&mut state, &empty).is_empty());
    }
}
