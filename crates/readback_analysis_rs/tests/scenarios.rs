//! Tests for complete analysis scenarios
//!
//! This module runs the engine against the exchanges and dialogues in the RON
//! index file to verify the verdicts trainees actually see.

use std::{collections::HashMap, sync::LazyLock};

use readback_analysis_rs::{
    AnalysisRequest, CorpusType, ErrorKind, FlightPhase, ReadbackEngine, ReadbackQuality,
    Severity, test_utils,
};
use serde::Deserialize;

static ENGINE: LazyLock<ReadbackEngine> =
    LazyLock::new(|| test_utils::engine().expect("Failed to create engine"));

static SCENARIO_INDEX: LazyLock<ScenarioIndex> = LazyLock::new(ScenarioIndex::load_from_file);

#[derive(Debug, Deserialize)]
struct ExchangeScenario {
    atc: String,
    pilot: String,
    quality: ReadbackQuality,
    error: ErrorKind,
    #[serde(default)]
    not_error: Option<ErrorKind>,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    actual: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DialogueScenario {
    corpus_type: String,
    transcript: String,
    phase: FlightPhase,
    qualities: Vec<ReadbackQuality>,
    passed: bool,
}

#[derive(Debug, Deserialize)]
struct ScenarioIndex {
    exchanges: HashMap<String, ExchangeScenario>,
    dialogues: HashMap<String, DialogueScenario>,
}

impl ScenarioIndex {
    fn load_from_file() -> Self {
        let content = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/resources/scenarios/index.ron"
        ))
        .expect("Failed to read scenario index");

        ron::from_str(&content).expect("Failed to parse scenario index")
    }
}

fn check_exchange(name: &str) {
    let scenario = &SCENARIO_INDEX.exchanges[name];
    let result = ENGINE
        .analyze(&AnalysisRequest::new(&scenario.atc, &scenario.pilot))
        .unwrap();

    assert_eq!(
        result.readback_quality,
        Some(scenario.quality),
        "{name}: unexpected quality in {result:?}"
    );
    assert!(!result.is_correct, "{name} must not pass");

    let error = result
        .errors
        .iter()
        .find(|e| e.kind == scenario.error)
        .unwrap_or_else(|| panic!("{name}: no {} in {:?}", scenario.error, result.errors));
    if let Some(severity) = scenario.severity {
        assert_eq!(error.severity, severity, "{name}: wrong severity");
    }
    if scenario.expected.is_some() {
        assert_eq!(error.expected, scenario.expected, "{name}: wrong expected value");
        assert_eq!(error.actual, scenario.actual, "{name}: wrong actual value");
    }
    if let Some(not_error) = &scenario.not_error {
        assert!(
            result.errors.iter().all(|e| &e.kind != not_error),
            "{name}: {not_error} must not be reported"
        );
    }
    assert!(!result.suggestions.is_empty(), "{name}: no guidance given");
}

#[test]
fn test_wrong_flight_level() {
    check_exchange("wrong_flight_level");
}

#[test]
fn test_roger_substitution() {
    check_exchange("roger_substitution");
}

#[test]
fn test_wrong_direction() {
    check_exchange("wrong_direction");
    let scenario = &SCENARIO_INDEX.exchanges["wrong_direction"];
    let result = ENGINE
        .analyze(&AnalysisRequest::new(&scenario.atc, &scenario.pilot))
        .unwrap();
    assert!(result.severity >= Severity::High);
    // The readback also dropped the callsign.
    assert!(result.errors.iter().any(|e| e.kind == ErrorKind::MissingCallsign));
}

#[test]
fn test_squawk_transposition() {
    check_exchange("squawk_transposition");
}

#[test]
fn test_magnitude_error() {
    check_exchange("magnitude_error");
}

#[test]
fn test_recurring_errors_are_marked() {
    let scenario = &SCENARIO_INDEX.exchanges["squawk_transposition"];
    let mut request = AnalysisRequest::new(&scenario.atc, &scenario.pilot);
    request.previous_errors = vec!["transposition".to_string()];
    let result = ENGINE.analyze(&request).unwrap();
    assert!(result.suggestions.iter().any(|s| s.ends_with("(recurring)")));
}

#[test]
fn test_expected_callsign() {
    let mut request = AnalysisRequest::new(
        "PAL456, squawk 2461",
        "Squawk 2461, PAL465",
    );
    request.callsign = Some("PAL456".to_string());
    let result = ENGINE.analyze(&request).unwrap();
    assert!(result.errors.iter().any(|e| e.kind == ErrorKind::MissingCallsign));
}

#[test]
fn test_enroute_dialogue() {
    let scenario = &SCENARIO_INDEX.dialogues["enroute_sequence"];
    let corpus_type: CorpusType = scenario.corpus_type.parse().unwrap();
    let analysis = ENGINE
        .analyze_dialogue(&scenario.transcript, corpus_type)
        .unwrap();

    assert_eq!(analysis.lines.len(), 6);
    assert_eq!(analysis.context.flight_phase, scenario.phase);
    assert_eq!(analysis.context.primary_callsign.as_deref(), Some("PAL456"));
    let qualities: Vec<ReadbackQuality> = analysis
        .context
        .exchange_pairs
        .iter()
        .map(|p| p.readback_quality)
        .collect();
    assert_eq!(qualities, scenario.qualities);
    assert_eq!(analysis.exchanges.len(), scenario.qualities.len());
    assert_eq!(analysis.passed, scenario.passed);
    assert!(analysis.exchanges[1]
        .errors
        .iter()
        .any(|e| e.kind == ErrorKind::RogerSubstitution));
}
