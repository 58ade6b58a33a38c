//! Trainable model capability.
//!
//! The orchestration and serving layers treat a model as an opaque object
//! that can train itself against two batch providers, predict label scores
//! for a feature vector, and serialize itself. Concrete models are created
//! and loaded through a [`ModelBuilder`] looked up by name in the
//! [`ModelRegistry`].

use std::io::{Read, Write};
use std::path::Path;

use serde_json::Value;

use crate::dataset::BatchRecordProvider;
use crate::error::{ErrorHandler, Result};
use crate::evaluation::{EvaluationEngine, ScoreCalculator};
use crate::training::{EpochTracker, HyperParameters};

pub mod bundle;
pub mod linear;
pub mod registry;

pub use bundle::{LoadedModel, ModelBundle};
pub use linear::{SoftmaxRegression, SoftmaxRegressionBuilder, SoftmaxRegressionConfig};
pub use registry::ModelRegistry;

/// Why a training run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationReason {
    /// Ran the configured number of epochs.
    EpochsExhausted,
    /// No improvement for `patience` epochs.
    NoImprovement,
    /// Training failed and the model must not be used.
    Error(String),
}

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_score: f64,
    pub termination: TerminationReason,
}

/// Everything a model needs to run its epoch loop.
pub struct TrainingContext<'a> {
    pub hyper_parameters: &'a HyperParameters,

    /// Directory for checkpoints and other model-owned scratch files.
    pub scratch_dir: &'a Path,

    pub training: &'a BatchRecordProvider,
    pub evaluation: &'a BatchRecordProvider,
    pub evaluation_engine: &'a EvaluationEngine,
    pub score_calculator: ScoreCalculator,

    /// Must be told about every completed epoch.
    pub tracker: &'a mut EpochTracker,

    pub error_handler: ErrorHandler,
}

/// A model the orchestrator can train and the server can query.
pub trait TrainableModel: Send {
    /// Name of the [`ModelBuilder`] that can load this model.
    fn builder_name(&self) -> &'static str;

    fn feature_count(&self) -> usize;

    fn label_count(&self) -> usize;

    /// Run the full training loop.
    fn train(&mut self, context: TrainingContext<'_>) -> Result<TrainingOutcome>;

    /// Per-label scores for one feature vector.
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Serialize the model so its builder can [`load`](ModelBuilder::load) it.
    fn save(&self, writer: &mut dyn Write) -> Result<()>;
}

/// Creates and loads one kind of [`TrainableModel`].
pub trait ModelBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build an untrained model from its configuration document.
    fn create(
        &self,
        config: &Value,
        feature_count: usize,
        label_count: usize,
        seed: u64,
    ) -> Result<Box<dyn TrainableModel>>;

    /// Load a model written by [`TrainableModel::save`].
    fn load(&self, reader: &mut dyn Read) -> Result<Box<dyn TrainableModel>>;
}
