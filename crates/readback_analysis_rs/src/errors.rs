use thiserror::Error;
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),
    #[error("Invalid pattern in rule table: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Invalid learning config: {0}")]
    InvalidConfig(String),
    #[error("Unknown error type: {0}")]
    UnknownErrorKind(String),
    #[error("Invalid model state: {0}")]
    InvalidState(String),
    #[error("Model store unavailable: {0}")]
    Persistence(String),
    #[error("Model state lock poisoned!")]
    ModelLockPoisoned,
    #[error("Serde Json (de)serialization failed!")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Ron deserialization failed: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Std Io Error!")]
    StdIo(#[from] std::io::Error),
    #[error("Aviation Helper")]
    AviationHelper(#[from] aviation_helper_rs::errors::Error),
}

impl Error {
    /// Errors after which the engine keeps working on in-memory state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Persistence(_) | Error::InvalidState(_))
    }
}
