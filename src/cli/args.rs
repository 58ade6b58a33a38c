//! Command line argument parsing for the lexiclass CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// lexiclass - train, evaluate and serve TF-IDF document classifiers
#[derive(Parser, Debug, Clone)]
#[command(name = "lexiclass")]
#[command(about = "Train, evaluate and serve TF-IDF document classifiers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct LexiclassArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format for command summaries
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl LexiclassArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a model and write its bundle and evaluation report
    Train(TrainArgs),

    /// Serve model bundles through the configured api adapters until Ctrl-C
    Serve(ServeArgs),

    /// Run one inference against a bundle and print the JSON envelope
    Infer(InferArgs),
}

/// Arguments for a training run
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Training configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "LEXICLASS_TRAINING_CONFIG")]
    pub config: PathBuf,

    /// Working directory for vectorized data and model scratch files
    #[arg(short, long, value_name = "TEMP_DIR")]
    pub temp_dir: PathBuf,

    /// Where to write the model bundle
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model_out: PathBuf,

    /// Where to write the evaluation report (JSON)
    #[arg(short, long, value_name = "EVAL_FILE")]
    pub eval_out: PathBuf,

    /// Reuse vectorized data from a previous run in TEMP_DIR
    #[arg(long)]
    pub reuse_cached: bool,

    /// Override the configured random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for serving
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Server configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "LEXICLASS_SERVER_CONFIG")]
    pub config: PathBuf,
}

/// Arguments for offline inference
#[derive(Parser, Debug, Clone)]
pub struct InferArgs {
    /// Model bundle file
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: PathBuf,

    /// Input document; read from stdin when omitted
    #[arg(short, long, value_name = "INPUT_FILE")]
    pub input: Option<PathBuf>,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
