use thiserror::Error;
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid altitude: {}",.0)]
    InvalidAltitude(String),
    #[error("Invalid heading: {}",.0)]
    InvalidHeading(String),
    #[error("Invalid frequency: {}",.0)]
    InvalidFrequency(String),
    #[error("Unknown instruction type: {}",.0)]
    UnknownInstructionType(String),
    #[error("Unknown flight phase: {}",.0)]
    UnknownFlightPhase(String),
    #[error("Serde Json (de)serialization failed!")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Ron deserialization failed: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Std Io Error!")]
    StdIo(#[from] std::io::Error),
}
