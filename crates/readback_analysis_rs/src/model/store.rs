//! Model persistence and the shared handle the engine reads weights through.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use aviation_helper_rs::clearance::instruction::InstructionType;
use log::{info, warn};

use crate::{
    errors::Error,
    model::{
        AdaptiveModelState,
        history::UserCorrection,
        learning::{self, LearningConfig, LearningConfigPatch, ReinforcementSession, WeightUpdate},
        stats::ModelStats,
        weights::ModelWeights,
    },
};

pub trait ModelPersistence {
    /// The stored state, or a fresh default if nothing was stored yet.
    fn load(&self) -> Result<AdaptiveModelState, Error>;
    fn save(&self, state: &AdaptiveModelState) -> Result<(), Error>;
}

/// Keeps the serialized state in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    json: Mutex<Option<String>>,
}

impl ModelPersistence for MemoryStore {
    fn load(&self) -> Result<AdaptiveModelState, Error> {
        let Ok(json) = self.json.lock() else {
            return Err(Error::Persistence("memory store lock poisoned".to_string()));
        };
        match json.as_deref() {
            Some(json) => AdaptiveModelState::from_json(json),
            None => Ok(AdaptiveModelState::default()),
        }
    }

    fn save(&self, state: &AdaptiveModelState) -> Result<(), Error> {
        let serialized = state.to_json()?;
        let Ok(mut json) = self.json.lock() else {
            return Err(Error::Persistence("memory store lock poisoned".to_string()));
        };
        *json = Some(serialized);
        Ok(())
    }
}

/// One JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, err: std::io::Error) -> Error {
        Error::Persistence(format!("{}: {err}", self.path.display()))
    }
}

impl ModelPersistence for JsonFileStore {
    fn load(&self) -> Result<AdaptiveModelState, Error> {
        if !self.path.exists() {
            info!("No model state at {}, starting fresh", self.path.display());
            return Ok(AdaptiveModelState::default());
        }
        let json = fs::read_to_string(&self.path).map_err(|e| self.persistence_error(e))?;
        AdaptiveModelState::from_json(&json)
    }

    fn save(&self, state: &AdaptiveModelState) -> Result<(), Error> {
        let json = state.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.persistence_error(e))?;
        }
        // Write aside and rename so a crash never leaves half a document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.persistence_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.persistence_error(e))?;
        Ok(())
    }
}

/// Shared, lock-protected model state. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    state: Arc<Mutex<AdaptiveModelState>>,
}

impl ModelHandle {
    pub fn new(state: AdaptiveModelState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Loads from `store`, falling back to a default state on failure. The
    /// failure is handed back so callers can report it.
    pub fn load_or_default(store: &dyn ModelPersistence) -> (Self, Option<Error>) {
        match store.load() {
            Ok(state) => (Self::new(state), None),
            Err(err) => {
                warn!("Could not load model state, using defaults: {err}");
                let err = match err {
                    Error::Persistence(_) | Error::InvalidState(_) => err,
                    other => Error::Persistence(other.to_string()),
                };
                (Self::default(), Some(err))
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, AdaptiveModelState>, Error> {
        let Ok(state) = self.state.lock() else {
            return Err(Error::ModelLockPoisoned);
        };
        Ok(state)
    }

    pub fn snapshot(&self) -> Result<AdaptiveModelState, Error> {
        Ok(self.lock()?.clone())
    }

    pub fn weights(&self) -> Result<ModelWeights, Error> {
        Ok(self.lock()?.weights.clone())
    }

    pub fn config(&self) -> Result<LearningConfig, Error> {
        Ok(self.lock()?.config.clone())
    }

    pub fn apply_correction(
        &self,
        correction: UserCorrection,
        instruction: Option<InstructionType>,
    ) -> Result<Vec<WeightUpdate>, Error> {
        let mut state = self.lock()?;
        Ok(learning::apply_correction(&mut state, correction, instruction))
    }

    pub fn reinforce(&self, session: &ReinforcementSession) -> Result<Vec<WeightUpdate>, Error> {
        let mut state = self.lock()?;
        Ok(learning::reinforce(&mut state, session))
    }

    /// Applies a validated config patch. Nothing changes if validation fails.
    pub fn update_config(&self, patch: &LearningConfigPatch) -> Result<LearningConfig, Error> {
        let mut state = self.lock()?;
        let next = patch.apply_to(&state.config)?;
        if next.max_corrections != state.config.max_corrections {
            state.history.set_max_corrections(next.max_corrections);
        }
        state.config = next.clone();
        info!("Learning config updated: {next:?}");
        Ok(next)
    }

    pub fn stats(&self) -> Result<ModelStats, Error> {
        Ok(ModelStats::from_state(&*self.lock()?))
    }

    /// Back to default weights and an empty history.
    pub fn reset(&self) -> Result<(), Error> {
        let mut state = self.lock()?;
        *state = AdaptiveModelState::default();
        info!("Model state reset");
        Ok(())
    }

    pub fn export(&self) -> Result<String, Error> {
        self.lock()?.to_json()
    }

    /// Replaces the state with an imported one. An invalid document leaves
    /// the model on fresh defaults and returns the parse or validation error.
    pub fn import(&self, json: &str) -> Result<(), Error> {
        let imported = AdaptiveModelState::from_json(json);
        let mut state = self.lock()?;
        match imported {
            Ok(imported) => {
                *state = imported;
                info!("Model state imported");
                Ok(())
            }
            Err(err) => {
                warn!("Rejected model import, resetting to defaults: {err}");
                *state = AdaptiveModelState::default();
                Err(err)
            }
        }
    }

    pub fn save_to(&self, store: &dyn ModelPersistence) -> Result<(), Error> {
        let state = self.snapshot()?;
        store.save(&state)
    }
}

#[cfg(test)]
mod tests {
    use aviation_helper_rs::clearance::phase::FlightPhase;

    use super::*;
    use crate::{
        detection::ErrorKind,
        model::history::{CorrectedOutcome, PredictedOutcome},
    };

    fn wrong_prediction() -> UserCorrection {
        UserCorrection::new(
            PredictedOutcome {
                atc: "squawk 4721".to_string(),
                pilot: "squawk 4712".to_string(),
                predicted_correct: true,
                predicted_errors: vec![],
                predicted_phase: FlightPhase::Enroute,
            },
            CorrectedOutcome {
                is_actually_correct: false,
                actual_errors: vec![ErrorKind::Transposition],
                actual_phase: FlightPhase::Enroute,
                user_feedback: Some("digits swapped".to_string()),
            },
        )
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::default();
        let handle = ModelHandle::load_or_default(&store).0;
        handle
            .apply_correction(wrong_prediction(), Some(InstructionType::Squawk))
            .unwrap();
        handle.save_to(&store).unwrap();

        let (loaded, err) = ModelHandle::load_or_default(&store);
        assert!(err.is_none());
        assert_eq!(loaded.snapshot().unwrap(), handle.snapshot().unwrap());
        assert_eq!(loaded.stats().unwrap().incorrect_predictions, 1);
    }

    #[test]
    fn test_file_store_missing_and_corrupt() {
        let dir = std::env::temp_dir().join(format!("readback-store-{}", uuid::Uuid::new_v4()));
        let store = JsonFileStore::new(dir.join("model.json"));
        assert_eq!(store.load().unwrap().history.total_interactions, 0);

        let handle = ModelHandle::default();
        handle.save_to(&store).unwrap();
        assert!(store.path().exists());

        fs::write(store.path(), "{ truncated").unwrap();
        let (fallback, err) = ModelHandle::load_or_default(&store);
        assert!(err.is_some_and(|e| e.is_recoverable()));
        assert_eq!(fallback.snapshot().unwrap().history.total_interactions, 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_import_fails_closed() {
        let handle = ModelHandle::default();
        handle.apply_correction(wrong_prediction(), None).unwrap();
        let exported = handle.export().unwrap();

        let mut tampered = handle.snapshot().unwrap();
        tampered.weights.error_weights.insert("wrong_value".to_string(), 9.0);
        let tampered = serde_json::to_string(&tampered).unwrap();
        assert!(matches!(handle.import(&tampered), Err(Error::InvalidState(_))));
        assert_eq!(handle.stats().unwrap().total_interactions, 0);

        handle.import(&exported).unwrap();
        assert_eq!(handle.stats().unwrap().total_interactions, 1);
    }

    #[test]
    fn test_import_rejects_oversized_log() {
        let handle = ModelHandle::default();
        handle.apply_correction(wrong_prediction(), None).unwrap();

        let mut doc: serde_json::Value = serde_json::from_str(&handle.export().unwrap()).unwrap();
        doc["history"]["weight_updates"]["capacity"] = serde_json::json!(1u64 << 60);
        let result = handle.import(&doc.to_string());
        assert!(matches!(result, Err(Error::SerdeJson(_))));
        let state = handle.snapshot().unwrap();
        assert_eq!(state.history.total_interactions, 0);
        assert_eq!(state.weights, ModelWeights::default());
        state.validate().unwrap();
    }

    #[test]
    fn test_update_config_resizes_history() {
        let handle = ModelHandle::default();
        let patch = LearningConfigPatch {
            max_corrections: Some(10),
            ..Default::default()
        };
        handle.update_config(&patch).unwrap();
        let state = handle.snapshot().unwrap();
        assert_eq!(state.history.user_corrections.capacity(), 10);
        state.validate().unwrap();

        let bad = LearningConfigPatch {
            learning_rate: Some(0.0),
            ..Default::default()
        };
        assert!(handle.update_config(&bad).is_err());
        assert_eq!(handle.config().unwrap().learning_rate, 0.1);
    }
}
