use std::fmt;

use aviation_helper_rs::clearance::phase::FlightPhase;
use chrono::{DateTime, Utc};
use ringbuf::{
    HeapRb,
    traits::{Consumer, Observer, RingBuffer},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::{detection::ErrorKind, errors::Error, model::learning::WeightUpdate};

pub const ACCURACY_SAMPLES: usize = 1000;
/// Upper bound for `LearningConfig::max_corrections`.
pub const MAX_CORRECTIONS_LIMIT: usize = 10_000;
/// Largest capacity a stored log may claim. Weight updates hold twice
/// `max_corrections`.
pub const MAX_LOG_CAPACITY: usize = max_usize(ACCURACY_SAMPLES, MAX_CORRECTIONS_LIMIT * 2);

const fn max_usize(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

/// FIFO that keeps the newest `capacity` items.
pub struct BoundedLog<T> {
    ring: HeapRb<T>,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
        }
    }

    /// Appends `item`, dropping the oldest entry when full.
    pub fn push(&mut self, item: T) {
        self.ring.push_overwrite(item);
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.ring.iter()
    }

    /// The newest `n` items, oldest first.
    pub fn last(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        self.iter().skip(self.len().saturating_sub(n))
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<T: Clone> BoundedLog<T> {
    /// A log with a new capacity holding the newest items that fit.
    pub fn resized(&self, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        for item in self.iter() {
            log.push(item.clone());
        }
        log
    }
}

impl<T: Clone> Clone for BoundedLog<T> {
    fn clone(&self) -> Self {
        self.resized(self.capacity())
    }
}

impl<T: PartialEq> PartialEq for BoundedLog<T> {
    fn eq(&self, other: &Self) -> bool {
        self.capacity() == other.capacity() && self.iter().eq(other.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for BoundedLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedLog")
            .field("capacity", &self.capacity())
            .field("items", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Serialize)]
struct BoundedLogRef<'a, T> {
    capacity: usize,
    items: Vec<&'a T>,
}

#[derive(Deserialize)]
struct BoundedLogOwned<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T: Serialize> Serialize for BoundedLog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BoundedLogRef {
            capacity: self.capacity(),
            items: self.iter().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for BoundedLog<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let owned = BoundedLogOwned::<T>::deserialize(deserializer)?;
        if owned.capacity == 0 || owned.capacity > MAX_LOG_CAPACITY {
            return Err(serde::de::Error::custom(format!(
                "log capacity {} outside 1..={MAX_LOG_CAPACITY}",
                owned.capacity
            )));
        }
        let mut log = BoundedLog::new(owned.capacity);
        for item in owned.items {
            log.push(item);
        }
        Ok(log)
    }
}

/// The model's prediction for one exchange.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PredictedOutcome {
    pub atc: String,
    pub pilot: String,
    pub predicted_correct: bool,
    pub predicted_errors: Vec<ErrorKind>,
    pub predicted_phase: FlightPhase,
}

/// What the user says the right answer was.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CorrectedOutcome {
    pub is_actually_correct: bool,
    pub actual_errors: Vec<ErrorKind>,
    pub actual_phase: FlightPhase,
    #[serde(default)]
    pub user_feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserCorrection {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub original: PredictedOutcome,
    pub corrected: CorrectedOutcome,
    /// Set once the correction has been folded into the weights.
    pub applied: bool,
}

impl UserCorrection {
    pub fn new(original: PredictedOutcome, corrected: CorrectedOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            original,
            corrected,
            applied: false,
        }
    }

    pub fn prediction_was_right(&self) -> bool {
        self.original.predicted_correct == self.corrected.is_actually_correct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AccuracySample {
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LearningHistory {
    pub total_interactions: u64,
    pub correct_predictions: u64,
    pub incorrect_predictions: u64,
    pub user_corrections: BoundedLog<UserCorrection>,
    pub weight_updates: BoundedLog<WeightUpdate>,
    pub accuracy_over_time: BoundedLog<AccuracySample>,
}

impl LearningHistory {
    /// `max_corrections` corrections and twice as many weight updates.
    pub fn new(max_corrections: usize) -> Self {
        Self {
            total_interactions: 0,
            correct_predictions: 0,
            incorrect_predictions: 0,
            user_corrections: BoundedLog::new(max_corrections),
            weight_updates: BoundedLog::new(max_corrections.saturating_mul(2)),
            accuracy_over_time: BoundedLog::new(ACCURACY_SAMPLES),
        }
    }

    pub fn record_outcome(&mut self, correct: bool) {
        self.total_interactions += 1;
        if correct {
            self.correct_predictions += 1;
        } else {
            self.incorrect_predictions += 1;
        }
    }

    /// Mean of the newest `n` accuracy samples.
    pub fn mean_accuracy(&self, n: usize) -> Option<f64> {
        mean(self.accuracy_over_time.last(n).map(|s| s.accuracy))
    }

    /// Re-bounds the correction and update logs to a new correction limit.
    pub fn set_max_corrections(&mut self, max_corrections: usize) {
        self.user_corrections = self.user_corrections.resized(max_corrections);
        self.weight_updates = self.weight_updates.resized(max_corrections.saturating_mul(2));
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.correct_predictions + self.incorrect_predictions != self.total_interactions {
            return Err(Error::InvalidState(format!(
                "{} correct + {} incorrect != {} interactions",
                self.correct_predictions, self.incorrect_predictions, self.total_interactions
            )));
        }
        if self.weight_updates.capacity() != self.user_corrections.capacity() * 2 {
            return Err(Error::InvalidState(
                "weight update log must hold twice the corrections".to_string(),
            ));
        }
        if self.accuracy_over_time.capacity() != ACCURACY_SAMPLES {
            return Err(Error::InvalidState(format!(
                "accuracy log must hold {ACCURACY_SAMPLES} samples"
            )));
        }
        if self
            .accuracy_over_time
            .iter()
            .any(|s| !(0.0..=1.0).contains(&s.accuracy))
        {
            return Err(Error::InvalidState("accuracy sample outside [0, 1]".to_string()));
        }
        Ok(())
    }

    /// The most frequent corrected error types, most frequent first. Ties are
    /// broken by name.
    pub fn top_errors(&self, n: usize) -> Vec<(ErrorKind, usize)> {
        let mut counts: Vec<(ErrorKind, usize)> = Vec::new();
        for correction in self.user_corrections.iter() {
            for kind in &correction.corrected.actual_errors {
                match counts.iter_mut().find(|(k, _)| k == kind) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((kind.clone(), 1)),
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_log_keeps_newest() {
        let mut log = BoundedLog::new(3);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(log.last(2).copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(log.last(10).count(), 3);
    }

    #[test]
    fn test_bounded_log_serde() {
        let mut log = BoundedLog::new(2);
        log.push("a".to_string());
        log.push("b".to_string());
        let json = serde_json::to_string(&log).unwrap();
        assert_eq!(json, r#"{"capacity":2,"items":["a","b"]}"#);
        let back: BoundedLog<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);

        // Oversized input keeps the newest items.
        let back: BoundedLog<u8> =
            serde_json::from_str(r#"{"capacity":2,"items":[1,2,3]}"#).unwrap();
        assert_eq!(back.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_bounded_log_rejects_unreasonable_capacity() {
        let huge = format!(r#"{{"capacity":{},"items":[]}}"#, 1u64 << 60);
        assert!(serde_json::from_str::<BoundedLog<u8>>(&huge).is_err());
        assert!(serde_json::from_str::<BoundedLog<u8>>(r#"{"capacity":0,"items":[]}"#).is_err());
        let largest = format!(r#"{{"capacity":{MAX_LOG_CAPACITY},"items":[1]}}"#);
        assert!(serde_json::from_str::<BoundedLog<u8>>(&largest).is_ok());
    }

    #[test]
    fn test_resize_and_counters() {
        let mut history = LearningHistory::new(4);
        assert_eq!(history.weight_updates.capacity(), 8);
        history.record_outcome(true);
        history.record_outcome(false);
        history.validate().unwrap();
        assert_eq!(history.total_interactions, 2);

        history.set_max_corrections(2);
        assert_eq!(history.user_corrections.capacity(), 2);
        assert_eq!(history.weight_updates.capacity(), 4);
        history.validate().unwrap();

        history.correct_predictions += 1;
        assert!(history.validate().is_err());
    }

    #[test]
    fn test_mean_accuracy() {
        let mut history = LearningHistory::new(4);
        assert_eq!(history.mean_accuracy(50), None);
        for accuracy in [0.2, 0.4, 0.6] {
            history.accuracy_over_time.push(AccuracySample {
                timestamp: Utc::now(),
                accuracy,
            });
        }
        let recent = history.mean_accuracy(2).unwrap();
        assert!((recent - 0.5).abs() < 1e-9);
    }
}
