use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use readback_analysis_rs::{CorpusType, ErrorKind, FlightPhase};

/// Readback training: analysis and adaptive model maintenance
#[derive(Parser, Debug)]
#[command(name = "readback-trainer", version)]
#[command(about = "Analyze ATC readbacks and train the adaptive analysis model")]
pub struct Cli {
    /// Model state file, overrides READBACK_STATE_PATH
    #[arg(long, value_name = "FILE", global = true)]
    pub state: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze one ATC instruction and the pilot's readback
    Analyze {
        #[arg(long)]
        atc: String,
        #[arg(long)]
        pilot: String,
        /// Callsign the pilot has to use
        #[arg(long)]
        callsign: Option<String>,
        /// Error type from an earlier attempt, repeatable
        #[arg(long = "previous-error", value_name = "TYPE")]
        previous_errors: Vec<String>,
    },

    /// Analyze a transcript; reads stdin without a file
    Dialogue {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
        /// Corpus tag: APP/DEP, GND or RAMP
        #[arg(long, default_value = "APP/DEP")]
        corpus: CorpusType,
    },

    /// Tell the model what the right verdict for an exchange was
    Correct {
        #[arg(long)]
        atc: String,
        #[arg(long)]
        pilot: String,
        /// Whether the readback was actually correct
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        actually_correct: bool,
        /// Error type the readback really contained, repeatable
        #[arg(long = "actual-error", value_name = "TYPE")]
        actual_errors: Vec<ErrorKind>,
        /// Defaults to the predicted phase
        #[arg(long)]
        actual_phase: Option<FlightPhase>,
        #[arg(long)]
        feedback: Option<String>,
    },

    /// Reinforce the model with the outcome of a training session
    Reinforce {
        #[arg(long)]
        total: u64,
        #[arg(long)]
        correct: u64,
        /// Error type common in the session, repeatable
        #[arg(long = "common-error", value_name = "TYPE")]
        common_errors: Vec<ErrorKind>,
        /// Flight phase practiced in the session, repeatable
        #[arg(long = "phase")]
        phases: Vec<FlightPhase>,
    },

    /// Show model statistics
    Stats,

    /// Show or change the learning configuration
    Config {
        #[arg(long)]
        learning_rate: Option<f64>,
        #[arg(long)]
        momentum: Option<f64>,
        #[arg(long)]
        min_confidence: Option<f64>,
        #[arg(long, value_name = "BOOL")]
        adaptive_rate: Option<bool>,
        #[arg(long, value_name = "BOOL")]
        reinforcement: Option<bool>,
        #[arg(long)]
        max_corrections: Option<usize>,
    },

    /// Reset the model to default weights and an empty history
    Reset,

    /// Write the model state as JSON to a file or stdout
    Export {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Replace the model state with an exported one
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Command {
    /// Commands that build on the stored model and save it afterwards.
    pub fn updates_model(&self) -> bool {
        match self {
            Command::Correct { .. } | Command::Reinforce { .. } => true,
            Command::Config {
                learning_rate,
                momentum,
                min_confidence,
                adaptive_rate,
                reinforcement,
                max_corrections,
            } => {
                learning_rate.is_some()
                    || momentum.is_some()
                    || min_confidence.is_some()
                    || adaptive_rate.is_some()
                    || reinforcement.is_some()
                    || max_corrections.is_some()
            }
            _ => false,
        }
    }
}
