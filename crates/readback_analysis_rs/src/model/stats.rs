use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    detection::ErrorKind,
    model::{
        AdaptiveModelState,
        history::mean,
        learning::{effective_learning_rate, recent_accuracy},
    },
};

const PROGRESS_WINDOW: usize = 100;
const TOP_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorCount {
    pub error_type: ErrorKind,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct WeightDistribution {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// The newest accuracy samples compared with the window before them.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LearningProgress {
    pub recent: Option<f64>,
    pub older: Option<f64>,
    pub improved: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelStats {
    pub total_interactions: u64,
    pub correct_predictions: u64,
    pub incorrect_predictions: u64,
    pub accuracy: f64,
    pub recent_accuracy: f64,
    pub effective_learning_rate: f64,
    pub top_errors: Vec<ErrorCount>,
    pub weight_distribution: WeightDistribution,
    pub learning_progress: LearningProgress,
    pub corrections_stored: usize,
    pub updated_at: DateTime<Utc>,
}

impl ModelStats {
    pub fn from_state(state: &AdaptiveModelState) -> Self {
        let history = &state.history;
        let accuracy = if history.total_interactions == 0 {
            0.0
        } else {
            history.correct_predictions as f64 / history.total_interactions as f64
        };
        Self {
            total_interactions: history.total_interactions,
            correct_predictions: history.correct_predictions,
            incorrect_predictions: history.incorrect_predictions,
            accuracy,
            recent_accuracy: recent_accuracy(state),
            effective_learning_rate: effective_learning_rate(state),
            top_errors: history
                .top_errors(TOP_ERRORS)
                .into_iter()
                .map(|(error_type, count)| ErrorCount { error_type, count })
                .collect(),
            weight_distribution: weight_distribution(state),
            learning_progress: learning_progress(state),
            corrections_stored: history.user_corrections.len(),
            updated_at: state.updated_at,
        }
    }
}

fn weight_distribution(state: &AdaptiveModelState) -> WeightDistribution {
    let (min, max, sum, count) = state.weights.all_values().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize),
        |(min, max, sum, count), w| (min.min(w), max.max(w), sum + w, count + 1),
    );
    if count == 0 {
        return WeightDistribution {
            min: 0.0,
            max: 0.0,
            avg: 0.0,
        };
    }
    WeightDistribution {
        min,
        max,
        avg: sum / count as f64,
    }
}

fn learning_progress(state: &AdaptiveModelState) -> LearningProgress {
    let samples: Vec<f64> = state
        .history
        .accuracy_over_time
        .iter()
        .map(|s| s.accuracy)
        .collect();
    let split = samples.len().saturating_sub(PROGRESS_WINDOW);
    let recent = mean(samples[split..].iter().copied());
    let older = mean(samples[split.saturating_sub(PROGRESS_WINDOW)..split].iter().copied());
    let improved = matches!((recent, older), (Some(r), Some(o)) if r > o);
    LearningProgress {
        recent,
        older,
        improved,
    }
}
