use std::{
    fs,
    io::{self, Read},
};

use anyhow::Context;
use log::warn;
use readback_analysis_rs::{
    AnalysisRequest, AnalysisResult, CorrectedOutcome, DialogueAnalysis, EngineConfig,
    JsonFileStore, KnowledgeBase, LearningConfigPatch, ModelHandle, ModelStats, ReadbackEngine,
    ReinforcementSession, UserCorrection, WeightUpdate,
};
use serde::Serialize;

use crate::{
    AppConfig,
    cli::{Cli, Command},
};

pub fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let state_path = cli.state.clone().unwrap_or_else(|| config.state_path.clone());
    let store = JsonFileStore::new(state_path);
    let (model, load_error) = ModelHandle::load_or_default(&store);
    if let Some(err) = load_error {
        // Saving the fallback would overwrite the stored history.
        if cli.command.updates_model() {
            return Err(anyhow::Error::new(err).context(format!(
                "Refusing to update {}: the stored model could not be loaded; \
                 fix it, or replace it with `reset` or `import`",
                store.path().display()
            )));
        }
        warn!("Continuing on a default model: {err}");
    }

    let kb = match &config.knowledge_path {
        Some(path) => KnowledgeBase::load_from_file(path)
            .with_context(|| format!("Failed to load knowledge base {}", path.display()))?,
        None => KnowledgeBase::builtin(),
    };
    let engine_config = match &config.engine_config_path {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = ReadbackEngine::new(&kb, engine_config, model)?;

    let mutated = match cli.command {
        Command::Analyze {
            atc,
            pilot,
            callsign,
            previous_errors,
        } => {
            let request = AnalysisRequest {
                atc,
                pilot,
                callsign,
                previous_errors,
            };
            let result = engine.analyze(&request)?;
            output(cli.json, &result, print_analysis)?;
            false
        }
        Command::Dialogue { file, corpus } => {
            let transcript = match file {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let analysis = engine.analyze_dialogue(&transcript, corpus)?;
            output(cli.json, &analysis, print_dialogue)?;
            false
        }
        Command::Correct {
            atc,
            pilot,
            actually_correct,
            actual_errors,
            actual_phase,
            feedback,
        } => {
            let request = AnalysisRequest::new(atc, pilot);
            let result = engine.analyze(&request)?;
            let correction = UserCorrection::new(
                result.prediction(&request),
                CorrectedOutcome {
                    is_actually_correct: actually_correct,
                    actual_errors,
                    actual_phase: actual_phase.unwrap_or(result.phase),
                    user_feedback: feedback,
                },
            );
            let updates = engine.apply_correction(correction)?;
            output(cli.json, &updates, print_updates)?;
            true
        }
        Command::Reinforce {
            total,
            correct,
            common_errors,
            phases,
        } => {
            anyhow::ensure!(correct <= total, "--correct must not exceed --total");
            let session = ReinforcementSession {
                total_readbacks: total,
                correct_readbacks: correct,
                common_errors,
                phases,
            };
            let updates = engine.reinforce(&session)?;
            output(cli.json, &updates, print_updates)?;
            true
        }
        Command::Stats => {
            let stats = engine.stats()?;
            output(cli.json, &stats, print_stats)?;
            false
        }
        Command::Config {
            learning_rate,
            momentum,
            min_confidence,
            adaptive_rate,
            reinforcement,
            max_corrections,
        } => {
            let patch = LearningConfigPatch {
                learning_rate,
                momentum,
                min_confidence,
                adaptive_rate_enabled: adaptive_rate,
                reinforcement_enabled: reinforcement,
                max_corrections,
            };
            let changed = patch != LearningConfigPatch::default();
            let config = if changed {
                engine.model().update_config(&patch)?
            } else {
                engine.model().config()?
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
            changed
        }
        Command::Reset => {
            engine.reset()?;
            println!("Model reset to defaults");
            true
        }
        Command::Export { file } => {
            let json = engine.model().export()?;
            match file {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
            false
        }
        Command::Import { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            // A rejected import leaves the stored state untouched.
            engine
                .model()
                .import(&json)
                .with_context(|| format!("Rejected model state in {}", file.display()))?;
            println!("Model state imported from {}", file.display());
            true
        }
    };

    if mutated {
        engine
            .model()
            .save_to(&store)
            .with_context(|| format!("Failed to save model state to {}", store.path().display()))?;
    }
    Ok(())
}

fn output<T: Serialize>(json: bool, value: &T, print: fn(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

fn print_analysis(result: &AnalysisResult) {
    let verdict = if result.is_correct { "CORRECT" } else { "INCORRECT" };
    match (result.instruction_type, result.readback_quality) {
        (Some(instruction), Some(quality)) => println!(
            "{verdict}: {quality} readback of {instruction} instruction"
        ),
        _ => println!("{verdict}: no readback required"),
    }
    println!(
        "Phase {}, severity {}, confidence {:.2}, correctness {:.2}",
        result.phase, result.severity, result.confidence, result.correctness
    );
    for error in &result.errors {
        println!(
            "  [{}] {}: {} (weight {:.2})",
            error.severity, error.kind, error.description, error.weight
        );
    }
    for suggestion in &result.suggestions {
        println!("  -> {suggestion}");
    }
}

fn print_dialogue(analysis: &DialogueAnalysis) {
    for line in &analysis.lines {
        println!("{:>3} {:?}: {}", line.line_number, line.speaker, line.raw_text);
    }
    let context = &analysis.context;
    println!(
        "\nPhase {} ({:.2}), primary callsign {}",
        context.flight_phase,
        context.phase_confidence,
        context.primary_callsign.as_deref().unwrap_or("-")
    );
    for (a, b) in &context.confusable_callsigns {
        println!("Confusable callsigns: {a} / {b}");
    }
    if context.emergency_declared || context.tcas_active {
        println!("Emergency or TCAS RA in progress, severities escalated");
    }
    for (pair, exchange) in context.exchange_pairs.iter().zip(&analysis.exchanges) {
        println!(
            "Line {}: {} readback of {} [{}]",
            pair.atc_line.line_number,
            pair.readback_quality,
            pair.instruction_type,
            exchange.severity
        );
        for error in &exchange.errors {
            println!("  {}: {}", error.kind, error.description);
        }
    }
    match analysis.readback_accuracy {
        Some(accuracy) => println!(
            "Readback accuracy {:.0}%: {}",
            accuracy * 100.0,
            if analysis.passed { "passed" } else { "failed" }
        ),
        None => println!("No instructions requiring a readback"),
    }
    if let Some(pattern) = &context.issue_accumulator.pattern_detected {
        println!("Pattern detected: {pattern}");
    }
    for suggestion in &analysis.suggestions {
        println!("  -> {suggestion}");
    }
}

fn print_updates(updates: &Vec<WeightUpdate>) {
    if updates.is_empty() {
        println!("No weights changed");
    }
    for update in updates {
        println!(
            "{} {}: {:.4} -> {:.4} ({})",
            update.target, update.name, update.old, update.new, update.reason
        );
    }
}

fn print_stats(stats: &ModelStats) {
    println!(
        "Interactions {} ({} correct, {} incorrect), accuracy {:.2}, recent {:.2}",
        stats.total_interactions,
        stats.correct_predictions,
        stats.incorrect_predictions,
        stats.accuracy,
        stats.recent_accuracy
    );
    println!("Effective learning rate {:.4}", stats.effective_learning_rate);
    let w = &stats.weight_distribution;
    println!("Weights min {:.3}, max {:.3}, avg {:.3}", w.min, w.max, w.avg);
    let progress = &stats.learning_progress;
    if let (Some(recent), Some(older)) = (progress.recent, progress.older) {
        println!(
            "Progress {:.2} vs {:.2}: {}",
            recent,
            older,
            if progress.improved {
                "improving"
            } else {
                "not improving"
            }
        );
    }
    for error in &stats.top_errors {
        println!("  {} x{}", error.error_type, error.count);
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("readback-cli-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("model.json")
    }

    fn cli(state: &Path, command: Command) -> Cli {
        Cli {
            state: Some(state.to_path_buf()),
            json: true,
            command,
        }
    }

    fn app_config(state: &Path) -> AppConfig {
        AppConfig {
            state_path: state.to_path_buf(),
            knowledge_path: None,
            engine_config_path: None,
        }
    }

    fn reinforce() -> Command {
        Command::Reinforce {
            total: 4,
            correct: 3,
            common_errors: vec![],
            phases: vec![],
        }
    }

    #[test]
    fn test_unreadable_state_is_never_overwritten() {
        let state = scratch("unreadable");
        fs::write(&state, "{ truncated").unwrap();
        let config = app_config(&state);

        assert!(run(cli(&state, reinforce()), &config).is_err());
        let raise_rate = Command::Config {
            learning_rate: Some(0.2),
            momentum: None,
            min_confidence: None,
            adaptive_rate: None,
            reinforcement: None,
            max_corrections: None,
        };
        assert!(run(cli(&state, raise_rate), &config).is_err());
        assert_eq!(fs::read_to_string(&state).unwrap(), "{ truncated");

        // Read-only commands still run on the default model.
        run(cli(&state, Command::Stats), &config).unwrap();
        assert_eq!(fs::read_to_string(&state).unwrap(), "{ truncated");

        run(cli(&state, Command::Reset), &config).unwrap();
        let json = fs::read_to_string(&state).unwrap();
        readback_analysis_rs::AdaptiveModelState::from_json(&json).unwrap();
        run(cli(&state, reinforce()), &config).unwrap();
    }

    #[test]
    fn test_updates_model() {
        assert!(reinforce().updates_model());
        assert!(!Command::Reset.updates_model());
        assert!(!Command::Stats.updates_model());
        let show = Command::Config {
            learning_rate: None,
            momentum: None,
            min_confidence: None,
            adaptive_rate: None,
            reinforcement: None,
            max_corrections: None,
        };
        assert!(!show.updates_model());
    }
}
