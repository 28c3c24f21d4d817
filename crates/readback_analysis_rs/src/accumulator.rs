//! Sliding-window issue accumulator.
//!
//! Counts non-complete readbacks over the last few lines of a dialogue and
//! raises an escalation level when they cluster. The level is an annotation
//! for the trainee; it never feeds back into severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::severity::Severity;

pub const SYSTEMATIC_ISSUES: &str = "systematic readback issues";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecentIssue {
    pub line: usize,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IssueAccumulator {
    window: usize,
    pub recent_issues: Vec<RecentIssue>,
    /// 0..=3
    pub escalation_level: u8,
    /// Set once the window fills up with issues and kept for the rest of the
    /// dialogue.
    pub pattern_detected: Option<String>,
}

impl Default for IssueAccumulator {
    fn default() -> Self {
        Self::new(5)
    }
}

impl IssueAccumulator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            recent_issues: Vec::new(),
            escalation_level: 0,
            pattern_detected: None,
        }
    }

    /// Records an issue on `line` and returns the new escalation level.
    pub fn record(&mut self, line: usize, severity: Severity) -> u8 {
        self.recent_issues.push(RecentIssue {
            line,
            severity,
            timestamp: Utc::now(),
        });
        let window = self.window;
        self.recent_issues
            .retain(|issue| issue.line + window > line);

        self.escalation_level = match self.recent_issues.len() {
            n if n >= 4 => 3,
            3 => 2,
            2 => 1,
            _ => 0,
        };
        if self.escalation_level == 3 && self.pattern_detected.is_none() {
            self.pattern_detected = Some(SYSTEMATIC_ISSUES.to_string());
        }
        self.escalation_level
    }

    pub fn issues_in_window(&self) -> usize {
        self.recent_issues.len()
    }

    pub fn is_systematic(&self) -> bool {
        self.pattern_detected.is_some()
    }
}
