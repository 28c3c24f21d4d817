//! Builders shared by unit and integration tests
//! Available only when testing feature is enabled
use aviation_helper_rs::clearance::phase::FlightPhase;

use super::*;

/// An engine over the built-in knowledge base and a fresh model.
pub fn engine() -> Result<ReadbackEngine, Error> {
    engine_with_model(ModelHandle::default())
}

pub fn engine_with_model(model: ModelHandle) -> Result<ReadbackEngine, Error> {
    ReadbackEngine::new(&KnowledgeBase::builtin(), EngineConfig::default(), model)
}

/// A line whose normalized and raw text are the same.
pub fn line(line_number: usize, speaker: Speaker, text: &str) -> ParsedLine {
    ParsedLine::new(line_number, text.to_string(), text.to_string(), speaker)
}

/// A correction saying what the exchange really contained.
pub fn correction(
    prediction: PredictedOutcome,
    is_actually_correct: bool,
    actual_errors: Vec<ErrorKind>,
    actual_phase: FlightPhase,
) -> UserCorrection {
    UserCorrection::new(
        prediction,
        CorrectedOutcome {
            is_actually_correct,
            actual_errors,
            actual_phase,
            user_feedback: None,
        },
    )
}

/// A prediction for an exchange the tests do not analyze first.
pub fn prediction(
    predicted_correct: bool,
    predicted_errors: Vec<ErrorKind>,
    predicted_phase: FlightPhase,
) -> PredictedOutcome {
    PredictedOutcome {
        atc: "PAL456, climb and maintain flight level 350".to_string(),
        pilot: "Climb and maintain flight level 350, PAL456".to_string(),
        predicted_correct,
        predicted_errors,
        predicted_phase,
    }
}
