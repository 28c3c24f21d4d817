//! Conversation context builder.
//!
//! Derives the flight phase, the callsigns in play and the emergency and TCAS
//! flags from a parsed dialogue. The context lives for one analysis only.

use std::collections::BTreeSet;

use aviation_helper_rs::{KnowledgeBase, clearance::phase::FlightPhase};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    accumulator::IssueAccumulator,
    callsign::{CallsignMatcher, are_confusable},
    config::EngineConfig,
    dialogue::ParsedLine,
    errors::Error,
    pairing::ExchangePair,
    rules::{RuleTable, compile},
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConversationContext {
    pub flight_phase: FlightPhase,
    /// Score of the strongest indicator of the detected phase, 0 when none fired.
    pub phase_confidence: f64,
    pub detected_callsigns: BTreeSet<String>,
    pub primary_callsign: Option<String>,
    pub confusable_callsigns: Vec<(String, String)>,
    pub emergency_declared: bool,
    pub tcas_active: bool,
    pub exchange_pairs: Vec<ExchangePair>,
    pub issue_accumulator: IssueAccumulator,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            flight_phase: FlightPhase::Unknown,
            phase_confidence: 0.0,
            detected_callsigns: BTreeSet::new(),
            primary_callsign: None,
            confusable_callsigns: Vec::new(),
            emergency_declared: false,
            tcas_active: false,
            exchange_pairs: Vec::new(),
            issue_accumulator: IssueAccumulator::default(),
        }
    }
}

impl ConversationContext {
    /// Emergencies and TCAS resolution advisories raise every severity.
    pub fn escalates_severity(&self) -> bool {
        self.emergency_declared || self.tcas_active
    }

    /// The detected phase if its indicator was strong enough, otherwise
    /// `fallback`.
    pub fn effective_phase(&self, min_confidence: f64, fallback: FlightPhase) -> FlightPhase {
        if self.flight_phase != FlightPhase::Unknown && self.phase_confidence >= min_confidence {
            self.flight_phase
        } else {
            fallback
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    phases: RuleTable<FlightPhase>,
    callsigns: CallsignMatcher,
    emergency: Regex,
    tcas: Regex,
    issue_window: usize,
}

impl ContextBuilder {
    pub fn new(
        kb: &KnowledgeBase,
        callsigns: CallsignMatcher,
        config: &EngineConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            phases: phase_table(kb)?,
            callsigns,
            emergency: compile(r"\b(?:mayday|pan[\s-]?pan|emergency)\b")?,
            tcas: compile(r"\btcas\b.*\b(?:ra|resolution)\b")?,
            issue_window: config.issue_window,
        })
    }

    pub fn build_context(&self, lines: &[ParsedLine]) -> ConversationContext {
        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let (flight_phase, phase_confidence) =
            self.detect_phase(&text).unwrap_or((FlightPhase::Unknown, 0.0));

        // Counted in first-seen order so ties go to the earliest callsign.
        let mut counts: Vec<(String, usize)> = Vec::new();
        for line in lines {
            for found in self.callsigns.find_all(&line.text) {
                match counts.iter_mut().find(|(c, _)| *c == found.normalized) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((found.normalized, 1)),
                }
            }
        }
        let primary_callsign = counts
            .iter()
            .fold(None, |best: Option<&(String, usize)>, entry| match best {
                Some(current) if current.1 >= entry.1 => Some(current),
                _ => Some(entry),
            })
            .map(|(c, _)| c.clone());
        let detected_callsigns: BTreeSet<String> = counts.into_iter().map(|(c, _)| c).collect();

        let mut confusable_callsigns = Vec::new();
        let all: Vec<&String> = detected_callsigns.iter().collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                if are_confusable(a, b) {
                    confusable_callsigns.push(((*a).clone(), (*b).clone()));
                }
            }
        }

        let context = ConversationContext {
            flight_phase,
            phase_confidence,
            detected_callsigns,
            primary_callsign,
            confusable_callsigns,
            emergency_declared: self.emergency.is_match(&text),
            tcas_active: self.tcas.is_match(&text),
            exchange_pairs: Vec::new(),
            issue_accumulator: IssueAccumulator::new(self.issue_window),
        };
        debug!(
            "Context: phase {} ({:.2}), primary {:?}, emergency {}, tcas {}",
            context.flight_phase,
            context.phase_confidence,
            context.primary_callsign,
            context.emergency_declared,
            context.tcas_active
        );
        context
    }

    /// First phase in priority order with a matching indicator, scored by its
    /// strongest matching indicator.
    pub fn detect_phase(&self, text: &str) -> Option<(FlightPhase, f64)> {
        let phase = self.phases.first_match(text)?.tag;
        let score = self.phases.max_score_for(text, phase)?;
        Some((phase, score))
    }
}

fn procedure_pattern(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = names
        .iter()
        .map(|n| regex::escape(n).replace(' ', r"\s*"))
        .collect();
    Some(format!(r"\b(?:{})\b", alternatives.join("|")))
}

/// Phases in priority order: landing, approach, departure, ground, enroute.
fn phase_table(kb: &KnowledgeBase) -> Result<RuleTable<FlightPhase>, Error> {
    use FlightPhase::*;
    let mut table = RuleTable::new()
        .with(r"\bcleared to land\b", Landing, 0.95)
        .and_then(|t| t.with(r"\bshort final\b", Landing, 0.9))
        .and_then(|t| t.with(r"\bgo around\b", Landing, 0.9))
        .and_then(|t| t.with(r"\bvacate\b", Landing, 0.7))
        .and_then(|t| t.with(r"\bfinal\b", Landing, 0.6))
        .and_then(|t| t.with(r"\b(?:ils|rnav|vor|visual) approach\b", Approach, 0.9))
        .and_then(|t| t.with(r"\b(?:localizer|glide ?slope)\b", Approach, 0.85))
        .and_then(|t| t.with(r"\bestablished\b", Approach, 0.7))
        .and_then(|t| t.with(r"\bapproach\b", Approach, 0.6))?;
    if let Some(stars) = procedure_pattern(&kb.stars) {
        table.push(&stars, Approach, 0.8)?;
    }
    table = table
        .with(r"\bcleared for take ?-?off\b", Departure, 0.95)
        .and_then(|t| t.with(r"\bline up\b", Departure, 0.85))
        .and_then(|t| t.with(r"\bairborne\b", Departure, 0.8))
        .and_then(|t| t.with(r"\bdeparture\b", Departure, 0.6))?;
    if let Some(sids) = procedure_pattern(&kb.sids) {
        table.push(&sids, Departure, 0.8)?;
    }
    table
        .with(r"\btaxi", Ground, 0.9)
        .and_then(|t| t.with(r"\bpush ?back\b", Ground, 0.9))
        .and_then(|t| t.with(r"\bholding point\b", Ground, 0.85))
        .and_then(|t| t.with(r"\bstart ?-?up\b", Ground, 0.8))
        .and_then(|t| t.with(r"\b(?:apron|gate|ramp)\b", Ground, 0.6))
        .and_then(|t| t.with(r"\bcruis(?:e|ing)\b", Enroute, 0.8))
        .and_then(|t| t.with(r"\bflight level\b", Enroute, 0.7))
        .and_then(|t| t.with(r"\bdirect\b", Enroute, 0.6))
        .and_then(|t| t.with(r"\bproceed\b", Enroute, 0.5))
}
