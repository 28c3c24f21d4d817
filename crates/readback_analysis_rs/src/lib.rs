//! Readback Analysis Library
//!
//! Parses free-form ATC/pilot dialogue, pairs every ATC instruction with the
//! pilot's readback and judges it against ICAO phraseology. Detected errors
//! are weighted by an adaptive model that learns from user corrections.

pub mod accumulator;
pub mod callsign;
pub mod config;
pub mod context;
pub mod detection;
pub mod dialogue;
pub mod engine;
pub mod errors;
pub mod extraction;
pub mod model;
pub mod pairing;
pub mod phraseology;
pub mod rules;
pub mod severity;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use context::{ContextBuilder, ConversationContext};
pub use detection::{DetectedError, ErrorDetector, ErrorKind};
pub use dialogue::{DialogueParser, ParsedLine, Speaker};
pub use engine::{AnalysisRequest, AnalysisResult, DialogueAnalysis, ReadbackEngine};
pub use errors::Error;
pub use model::{
    AdaptiveModelState,
    history::{CorrectedOutcome, PredictedOutcome, UserCorrection},
    learning::{LearningConfig, LearningConfigPatch, ReinforcementSession, WeightUpdate},
    stats::ModelStats,
    store::{JsonFileStore, MemoryStore, ModelHandle, ModelPersistence},
    weights::ModelWeights,
};
pub use pairing::{ExchangePair, ReadbackQuality};
pub use severity::Severity;

// Re-export the knowledge base types callers configure the engine with
pub use aviation_helper_rs::{
    KnowledgeBase,
    clearance::{
        instruction::InstructionType,
        phase::{CorpusType, FlightPhase},
    },
};
