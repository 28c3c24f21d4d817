//! Ordered `(pattern, tag, score)` rule tables.
//!
//! Instruction classification and phase detection are both "walk a table of
//! regexes in order" problems. Keeping them as data lets each table be tested
//! on its own.

use regex::{Regex, RegexBuilder};

use crate::errors::Error;

#[derive(Debug, Clone)]
pub struct Rule<T> {
    pub pattern: Regex,
    pub tag: T,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct RuleTable<T> {
    rules: Vec<Rule<T>>,
}

impl<T> Default for RuleTable<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

/// Compiles a case-insensitive pattern; every table in the engine matches
/// regardless of case.
pub fn compile(pattern: &str) -> Result<Regex, Error> {
    let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok(regex)
}

impl<T: Copy> RuleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pattern: &str, tag: T, score: f64) -> Result<(), Error> {
        self.rules.push(Rule {
            pattern: compile(pattern)?,
            tag,
            score,
        });
        Ok(())
    }

    pub fn with(mut self, pattern: &str, tag: T, score: f64) -> Result<Self, Error> {
        self.push(pattern, tag, score)?;
        Ok(self)
    }

    /// Rules that fire on `text`, in table order.
    pub fn matching<'a, 't>(&'a self, text: &'t str) -> impl Iterator<Item = &'a Rule<T>> {
        self.rules.iter().filter(move |rule| rule.pattern.is_match(text))
    }

    pub fn first_match(&self, text: &str) -> Option<&Rule<T>> {
        self.rules.iter().find(|rule| rule.pattern.is_match(text))
    }

    /// Strongest score among the rules for `tag` that fire on `text`.
    pub fn max_score_for(&self, text: &str, tag: T) -> Option<f64>
    where
        T: PartialEq,
    {
        self.matching(text)
            .filter(|rule| rule.tag == tag)
            .map(|rule| rule.score)
            .reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable<&'static str> {
        RuleTable::new()
            .with(r"\bclimb\b", "climb", 0.6)
            .unwrap()
            .with(r"\bflight level\b", "level", 0.9)
            .unwrap()
            .with(r"\bclimb\b", "climb-again", 0.9)
            .unwrap()
    }

    #[test]
    fn test_first_match_respects_order() {
        let table = table();
        let rule = table.first_match("CLIMB flight level 350").unwrap();
        assert_eq!(rule.tag, "climb");
    }

    #[test]
    fn test_max_score_for_tag() {
        let table = table();
        assert_eq!(table.max_score_for("climb flight level 350", "climb-again"), Some(0.9));
        assert_eq!(table.max_score_for("climb to 5000 feet", "level"), None);
    }

    #[test]
    fn test_first_match_outlives_text() {
        let table = table();
        let rule = {
            let text = String::from("climb now");
            table.first_match(&text)
        };
        assert_eq!(rule.map(|r| r.tag), Some("climb"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = RuleTable::<u8>::new().with(r"(unclosed", 1, 1.0);
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
    }
}
