//! Command implementations for the lexiclass CLI.

use std::fs;
use std::io::Read;
use std::time::Instant;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{Result, logging_error_handler};
use crate::inference::{
    AdapterRegistry, Envelope, InferenceHost, InferenceServer, InferenceService, ServerConfig,
};
use crate::model::{ModelBundle, ModelRegistry};
use crate::training::{TrainingConfig, TrainingOrchestrator};
use crate::vectorizer::VectorizerRegistry;

/// Model id used for one-off inference from the command line.
const OFFLINE_MODEL_ID: &str = "offline";

/// Execute a CLI command.
pub fn execute_command(args: LexiclassArgs) -> Result<()> {
    match &args.command {
        Command::Train(train_args) => train(train_args.clone(), &args),
        Command::Serve(serve_args) => serve(serve_args.clone(), &args),
        Command::Infer(infer_args) => infer(infer_args.clone(), &args),
    }
}

/// Run one training job.
fn train(args: TrainArgs, cli_args: &LexiclassArgs) -> Result<()> {
    let mut config = TrainingConfig::load(&args.config)?;
    if args.reuse_cached {
        config.reuse_cached_sequence_data = true;
    }
    if let Some(seed) = args.seed {
        config.hyper_parameters.random_seed = Some(seed);
    }

    let start = Instant::now();
    let summary = TrainingOrchestrator::new().execute(
        &config,
        &args.temp_dir,
        &args.model_out,
        &args.eval_out,
    )?;

    output_result(
        "Training complete",
        &TrainingReport {
            seed: summary.seed,
            features: summary.feature_count,
            training_records: summary.training_records,
            evaluation_records: summary.evaluation_records,
            epochs_run: summary.outcome.epochs_run,
            best_epoch: summary.outcome.best_epoch,
            best_score: summary.outcome.best_score,
            accuracy: summary.evaluation.accuracy,
            model_file: args.model_out.display().to_string(),
            evaluation_file: args.eval_out.display().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Serve until interrupted.
fn serve(args: ServeArgs, cli_args: &LexiclassArgs) -> Result<()> {
    let config = ServerConfig::load(&args.config)?;
    let mut host = InferenceHost::start(
        &config,
        &ModelRegistry::new(),
        &VectorizerRegistry::new(),
        &AdapterRegistry::new(),
        logging_error_handler(),
    )?;

    output_result(
        "Serving",
        &ServingReport {
            models: host
                .server()
                .model_ids()
                .into_iter()
                .map(str::to_string)
                .collect(),
            adapters: host
                .local_addrs()
                .into_iter()
                .map(|(kind, addr)| format!("{kind} on {addr}"))
                .collect(),
        },
        cli_args,
    )?;

    wait_for_ctrl_c()?;
    log::info!("shutting down");
    host.dispose()
}

fn wait_for_ctrl_c() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;
    Ok(())
}

/// Classify one document offline.
fn infer(args: InferArgs, cli_args: &LexiclassArgs) -> Result<()> {
    let loaded = ModelBundle::load(&args.model)?
        .instantiate(&ModelRegistry::new(), &VectorizerRegistry::new())?;

    let payload = match &args.input {
        Some(path) => fs::read(path)?,
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    let mut server = InferenceServer::new();
    server.register(OFFLINE_MODEL_ID, loaded)?;
    let envelope = Envelope::from(server.infer(OFFLINE_MODEL_ID, &payload));

    if cli_args.pretty {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", envelope.to_json());
    }
    Ok(())
}
