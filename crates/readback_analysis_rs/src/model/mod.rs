//! The adaptive model: weights, learning history and the rules that update
//! them from user corrections.

pub mod history;
pub mod learning;
pub mod stats;
pub mod store;
pub mod weights;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::Error,
    model::{history::LearningHistory, learning::LearningConfig, weights::ModelWeights},
};

pub const MODEL_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdaptiveModelState {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub weights: ModelWeights,
    pub history: LearningHistory,
    pub config: LearningConfig,
}

impl Default for AdaptiveModelState {
    fn default() -> Self {
        Self::with_config(LearningConfig::default())
    }
}

impl AdaptiveModelState {
    pub fn with_config(config: LearningConfig) -> Self {
        let now = Utc::now();
        Self {
            version: MODEL_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            weights: ModelWeights::default(),
            history: LearningHistory::new(config.max_corrections),
            config,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.config.validate()?;
        self.weights.validate()?;
        self.history.validate()?;
        if self.history.user_corrections.capacity() != self.config.max_corrections {
            return Err(Error::InvalidState(format!(
                "correction log holds {} entries, config says {}",
                self.history.user_corrections.capacity(),
                self.config.max_corrections
            )));
        }
        if self.updated_at < self.created_at {
            return Err(Error::InvalidState("updated before created".to_string()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a serialized state.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let state: Self = serde_json::from_str(json)?;
        state.validate()?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_roundtrips() {
        let state = AdaptiveModelState::default();
        state.validate().unwrap();
        let json = state.to_json().unwrap();
        let back = AdaptiveModelState::from_json(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_invalid_state_is_rejected() {
        let mut state = AdaptiveModelState::default();
        state.history.total_interactions = 3;
        let json = state.to_json().unwrap();
        assert!(matches!(
            AdaptiveModelState::from_json(&json),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            AdaptiveModelState::from_json("{ not json"),
            Err(Error::SerdeJson(_))
        ));
    }
}
