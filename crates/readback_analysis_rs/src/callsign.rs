//! Callsign recognition.
//!
//! Three ordered pattern families: known operator prefixes (ICAO designator or
//! spoken telephony), the Philippine `RP-C` registration format and a generic
//! three-letter-plus-digits fallback that only matches upper case text.

use std::collections::HashMap;

use aviation_helper_rs::clearance::callsigns::CallsignTable;
use regex::Regex;

use crate::{errors::Error, rules::compile};

/// Upper case tokens shaped like callsigns that are really phraseology.
const NOT_CALLSIGNS: &[&str] = &[
    "QNH", "QFE", "RWY", "ILS", "VOR", "DME", "NDB", "ATC", "TWR", "APP", "GND", "DEP", "HDG",
    "SQK", "KTS", "FLT", "ALT", "SID", "RNP", "GPS", "UTC",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallsignMatch {
    pub start: usize,
    pub end: usize,
    /// Upper case, no whitespace: `PAL456`, `RP-C1234`.
    pub normalized: String,
}

#[derive(Debug, Clone)]
pub struct CallsignMatcher {
    known_prefix: Option<Regex>,
    telephony: Option<Regex>,
    telephony_to_icao: HashMap<String, String>,
    registration: Regex,
    generic: Regex,
}

impl CallsignMatcher {
    pub fn new(table: &CallsignTable) -> Result<Self, Error> {
        let mut prefixes = table.prefixes();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let known_prefix = if prefixes.is_empty() {
            None
        } else {
            Some(compile(&format!(
                r"\b({})[\s-]?(\d{{1,4}}[a-z]?)\b",
                prefixes.join("|")
            ))?)
        };

        let mut telephony_to_icao = HashMap::new();
        let mut names: Vec<String> = Vec::new();
        for entry in table.active() {
            if let Some(telephony) = &entry.telephony {
                telephony_to_icao.insert(telephony.to_lowercase(), entry.icao.to_uppercase());
                names.push(regex::escape(telephony).replace(' ', r"\s+"));
            }
        }
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        let telephony = if names.is_empty() {
            None
        } else {
            Some(compile(&format!(
                r"\b({})\s+(\d{{1,4}}[a-z]?)\b",
                names.join("|")
            ))?)
        };

        Ok(Self {
            known_prefix,
            telephony,
            telephony_to_icao,
            registration: compile(r"\bRP-?C\s?(\d{3,4})\b")?,
            generic: Regex::new(r"\b([A-Z]{3})(\d{1,4}[A-Z]?)\b")?,
        })
    }

    /// All callsigns in `text`, left to right. Where families overlap the
    /// earlier family wins.
    pub fn find_all(&self, text: &str) -> Vec<CallsignMatch> {
        let mut found: Vec<CallsignMatch> = Vec::new();

        if let Some(known_prefix) = &self.known_prefix {
            for caps in known_prefix.captures_iter(text) {
                let (Some(whole), Some(prefix), Some(number)) =
                    (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                push_unique(
                    &mut found,
                    whole.start(),
                    whole.end(),
                    format!("{}{}", prefix.as_str(), number.as_str()).to_uppercase(),
                );
            }
        }

        if let Some(telephony) = &self.telephony {
            for caps in telephony.captures_iter(text) {
                let (Some(whole), Some(name), Some(number)) =
                    (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                let key = name
                    .as_str()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                let Some(icao) = self.telephony_to_icao.get(&key) else {
                    continue;
                };
                push_unique(
                    &mut found,
                    whole.start(),
                    whole.end(),
                    format!("{icao}{}", number.as_str().to_uppercase()),
                );
            }
        }

        for caps in self.registration.captures_iter(text) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_unique(
                &mut found,
                whole.start(),
                whole.end(),
                format!("RP-C{}", number.as_str()),
            );
        }

        for caps in self.generic.captures_iter(text) {
            let (Some(whole), Some(prefix)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if NOT_CALLSIGNS.contains(&prefix.as_str()) {
                continue;
            }
            push_unique(
                &mut found,
                whole.start(),
                whole.end(),
                whole.as_str().to_string(),
            );
        }

        found.sort_by_key(|m| m.start);
        found
    }

    pub fn contains_callsign(&self, text: &str) -> bool {
        !self.find_all(text).is_empty()
    }

    /// Callsign that opens the transmission, ignoring leading punctuation.
    pub fn leading(&self, text: &str) -> Option<CallsignMatch> {
        let start = text.len() - text.trim_start_matches(is_edge_noise).len();
        self.find_all(text).into_iter().find(|m| m.start == start)
    }

    /// Callsign that closes the transmission, ignoring trailing punctuation.
    pub fn trailing(&self, text: &str) -> Option<CallsignMatch> {
        let end = text.trim_end_matches(is_edge_noise).len();
        self.find_all(text).into_iter().rev().find(|m| m.end == end)
    }

    /// `text` with every callsign removed.
    pub fn strip(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for m in self.find_all(text) {
            out.push_str(&text[cursor..m.start]);
            cursor = m.end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

fn is_edge_noise(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '"' | '\'')
}

fn push_unique(found: &mut Vec<CallsignMatch>, start: usize, end: usize, normalized: String) {
    if found.iter().any(|m| start < m.end && m.start < end) {
        return;
    }
    found.push(CallsignMatch {
        start,
        end,
        normalized,
    });
}

fn split_callsign(callsign: &str) -> (&str, &str) {
    let split = callsign
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(callsign.len());
    let (prefix, rest) = callsign.split_at(split);
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    (prefix, &rest[..digits_end])
}

/// Two callsigns are confusable when they share the alphabetic prefix and their
/// numeric parts differ in exactly one position (`PAL456` / `PAL457`).
pub fn are_confusable(a: &str, b: &str) -> bool {
    let a = a.to_uppercase();
    let b = b.to_uppercase();
    if a == b {
        return false;
    }
    let (prefix_a, digits_a) = split_callsign(&a);
    let (prefix_b, digits_b) = split_callsign(&b);
    if prefix_a.is_empty() || prefix_a != prefix_b {
        return false;
    }
    if digits_a.is_empty() || digits_a.len() != digits_b.len() {
        return false;
    }
    let differing = digits_a
        .chars()
        .zip(digits_b.chars())
        .filter(|(x, y)| x != y)
        .count();
    differing == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> CallsignMatcher {
        CallsignMatcher::new(&CallsignTable::builtin()).unwrap()
    }

    #[test]
    fn test_known_prefix_is_case_insensitive() {
        let found = matcher().find_all("Descend and maintain flight level 150, pal 456");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].normalized, "PAL456");
    }

    #[test]
    fn test_telephony_and_registration() {
        let found = matcher().find_all("Philippine 123 follow RP-C 1234");
        let names: Vec<_> = found.iter().map(|m| m.normalized.as_str()).collect();
        assert_eq!(names, vec!["PAL123", "RP-C1234"]);
    }

    #[test]
    fn test_generic_skips_phraseology() {
        let m = matcher();
        assert!(m.find_all("QNH1013").is_empty());
        assert_eq!(m.find_all("XYZ42 ready")[0].normalized, "XYZ42");
        assert!(m.find_all("xyz42 ready").is_empty());
    }

    #[test]
    fn test_leading_and_trailing() {
        let m = matcher();
        assert!(m.leading("PAL456, descend and maintain flight level 250").is_some());
        assert!(m.trailing("PAL456, descend and maintain flight level 250").is_none());
        assert!(m.trailing("Descend and maintain flight level 150, PAL456.").is_some());
        assert_eq!(m.strip("Roger, CEB789").trim(), "Roger,");
    }

    #[test]
    fn test_confusable_callsigns() {
        assert!(are_confusable("PAL456", "PAL457"));
        assert!(are_confusable("CEB789", "ceb769"));
        assert!(!are_confusable("PAL456", "PAL456"));
        assert!(!are_confusable("PAL456", "CEB456"));
        assert!(!are_confusable("PAL456", "PAL465"));
        assert!(!are_confusable("PAL45", "PAL456"));
    }
}
