//! Training configuration document.
//!
//! ```json
//! {
//!   "hyper-parameters": {"max-epochs": 20, "batch-size": 64, "random-seed": 7,
//!                        "evaluation-metric": "f1", "patience": 5},
//!   "labels": ["sport", "politics"],
//!   "training-record-source": "directory",
//!   "training-record-source-config": {"directory": "data/train"},
//!   "evaluation-record-source": "directory",
//!   "evaluation-record-source-config": {"directory": "data/eval"},
//!   "input-sequence": "tfidf",
//!   "input-sequence-config": {"word-min-characters": 3},
//!   "model-builder": "softmax-regression",
//!   "model-builder-config": {"learning-rate": 0.5},
//!   "reuse-cached-sequence-data": false
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LexiclassError, Result};
use crate::evaluation::EvaluationMetric;

/// Parameters of the epoch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HyperParameters {
    pub max_epochs: usize,

    pub batch_size: usize,

    /// Seed for shuffling and model initialisation; random when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,

    #[serde(default)]
    pub evaluation_metric: EvaluationMetric,

    /// Stop after this many epochs without a better score.
    #[serde(default)]
    pub patience: Option<usize>,
}

impl HyperParameters {
    pub fn new(max_epochs: usize, batch_size: usize) -> Self {
        HyperParameters {
            max_epochs,
            batch_size,
            random_seed: None,
            evaluation_metric: EvaluationMetric::default(),
            patience: None,
        }
    }

    /// Fix the seed, drawing one if none was configured.
    pub fn resolve_seed(&mut self) -> u64 {
        *self.random_seed.get_or_insert_with(rand::random)
    }

    pub fn seed(&self) -> u64 {
        self.random_seed.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_epochs == 0 {
            return Err(LexiclassError::config("max-epochs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(LexiclassError::config("batch-size must be positive"));
        }
        if self.patience == Some(0) {
            return Err(LexiclassError::config("patience must be positive"));
        }
        Ok(())
    }
}

fn default_input_sequence() -> String {
    "tfidf".to_string()
}

fn default_model_builder() -> String {
    "softmax-regression".to_string()
}

/// A complete training run description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrainingConfig {
    pub hyper_parameters: HyperParameters,

    pub labels: Vec<String>,

    #[serde(alias = "training-record-provider")]
    pub training_record_source: String,

    #[serde(default, alias = "training-record-provider-config")]
    pub training_record_source_config: Value,

    #[serde(alias = "evaluation-record-provider")]
    pub evaluation_record_source: String,

    #[serde(default, alias = "evaluation-record-provider-config")]
    pub evaluation_record_source_config: Value,

    #[serde(default = "default_input_sequence")]
    pub input_sequence: String,

    #[serde(default)]
    pub input_sequence_config: Value,

    #[serde(default = "default_model_builder", alias = "model-instance-builder")]
    pub model_builder: String,

    #[serde(default, alias = "model-instance-builder-config")]
    pub model_builder_config: Value,

    /// Reuse the vectorizer snapshot and datasets of a previous run.
    #[serde(default)]
    pub reuse_cached_sequence_data: bool,

    /// Worker threads for vectorization; one per CPU when absent.
    #[serde(default)]
    pub thread_pool_size: Option<usize>,
}

impl TrainingConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrainingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LexiclassError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.hyper_parameters.validate()?;

        if self.labels.is_empty() {
            return Err(LexiclassError::config("labels must not be empty"));
        }
        for (i, label) in self.labels.iter().enumerate() {
            if self.labels[..i].contains(label) {
                return Err(LexiclassError::config(format!("duplicate label '{label}'")));
            }
        }
        Ok(())
    }
}
