//! Aviation helper library
//!
//! Value types for the numbers that appear in clearances and the read-only
//! phraseology knowledge base the readback engine is driven by.

pub mod clearance {
    pub mod callsigns;
    pub mod instruction;
    pub mod phase;
}
pub mod conversions;
pub mod errors;
pub mod knowledge;
pub mod types {
    pub mod altitude;
    pub mod frequency;
    pub mod heading;
}

pub use errors::Error;
pub use knowledge::KnowledgeBase;
