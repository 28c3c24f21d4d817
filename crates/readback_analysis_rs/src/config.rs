//! Engine tunables.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Segments this short (in characters) are dropped as noise.
    pub min_segment_len: usize,
    /// How many lines after an ATC line a pilot response may appear.
    pub response_window: usize,
    /// Width in lines of the issue accumulator's sliding window.
    pub issue_window: usize,
    /// Longest pilot line still treated as a bare acknowledgment.
    pub ack_max_words: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_segment_len: 5,
            response_window: 3,
            issue_window: 5,
            ack_max_words: 4,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, Error> {
        let config: EngineConfig = ron::from_str(contents)?;
        Ok(config)
    }

    /// Load engine configuration from a RON file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = EngineConfig::from_ron_str("(response_window: 2)").unwrap();
        assert_eq!(config.response_window, 2);
        assert_eq!(config.issue_window, 5);
        assert_eq!(config.ack_max_words, 4);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::load_from_file("/nonexistent/engine.ron"),
            Err(Error::StdIo(_))
        ));
    }
}
