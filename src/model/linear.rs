//! Softmax regression: a single linear layer with a softmax output.
//!
//! Trained with mini-batch SGD on cross-entropy plus L2 weight decay. The
//! best-scoring epoch's weights are checkpointed to the scratch directory
//! and restored when training stops.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec;
use crate::error::{LexiclassError, Result};
use crate::model::{ModelBuilder, TerminationReason, TrainableModel, TrainingContext, TrainingOutcome};
use crate::vectorizer::VectorizedRecord;

pub const NAME: &str = "softmax-regression";

const MODEL_MAGIC: &[u8; 4] = b"LXSM";
const MODEL_VERSION: u32 = 1;

fn default_learning_rate() -> f64 {
    0.1
}

fn default_l2() -> f64 {
    1e-4
}

fn default_init_scale() -> f64 {
    0.01
}

fn default_checkpoint_file() -> String {
    "softmax-best.bin".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SoftmaxRegressionConfig {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_l2")]
    pub l2: f64,

    /// Initial weights are drawn uniformly from `[-init_scale, init_scale)`.
    #[serde(default = "default_init_scale")]
    pub init_scale: f64,

    /// Checkpoint file name inside the scratch directory.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
}

impl Default for SoftmaxRegressionConfig {
    fn default() -> Self {
        SoftmaxRegressionConfig {
            learning_rate: default_learning_rate(),
            l2: default_l2(),
            init_scale: default_init_scale(),
            checkpoint_file: default_checkpoint_file(),
        }
    }
}

impl SoftmaxRegressionConfig {
    pub fn from_value(value: &Value) -> Result<Self> {
        let config: SoftmaxRegressionConfig = if value.is_null() {
            SoftmaxRegressionConfig::default()
        } else {
            serde_json::from_value(value.clone())?
        };

        if !(config.learning_rate > 0.0 && config.learning_rate.is_finite()) {
            return Err(LexiclassError::config("learning-rate must be a positive number"));
        }
        if !(config.l2 >= 0.0 && config.l2.is_finite()) {
            return Err(LexiclassError::config("l2 must be non-negative"));
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Weights {
    feature_count: usize,
    label_count: usize,
    // Row-major, one row of `feature_count` per label.
    weights: Vec<f64>,
    bias: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SoftmaxRegression {
    config: SoftmaxRegressionConfig,
    state: Weights,
}

fn softmax(logits: &mut [f64]) {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for value in logits.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    if sum > 0.0 {
        for value in logits.iter_mut() {
            *value /= sum;
        }
    }
}

impl SoftmaxRegression {
    pub fn new(
        config: SoftmaxRegressionConfig,
        feature_count: usize,
        label_count: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = config.init_scale;
        let weights = (0..feature_count * label_count)
            .map(|_| if scale > 0.0 { rng.random_range(-scale..scale) } else { 0.0 })
            .collect();

        SoftmaxRegression {
            config,
            state: Weights {
                feature_count,
                label_count,
                weights,
                bias: vec![0.0; label_count],
            },
        }
    }

    fn check_features(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.state.feature_count {
            return Err(LexiclassError::prediction(format!(
                "expected {} features, got {}",
                self.state.feature_count,
                features.len()
            )));
        }
        Ok(())
    }

    fn forward(&self, features: &[f64]) -> Vec<f64> {
        let n = self.state.feature_count;
        let mut logits: Vec<f64> = (0..self.state.label_count)
            .map(|label| {
                let row = &self.state.weights[label * n..(label + 1) * n];
                self.state.bias[label] + row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect();
        softmax(&mut logits);
        logits
    }

    /// One SGD step on the batch. Records without a positive label are skipped.
    fn train_batch(&mut self, batch: &[VectorizedRecord]) -> Result<()> {
        let n = self.state.feature_count;
        let k = self.state.label_count;
        let mut grad_w = vec![0.0; n * k];
        let mut grad_b = vec![0.0; k];
        let mut used = 0usize;

        for record in batch {
            self.check_features(&record.features)?;
            if record.labels.len() != k {
                return Err(LexiclassError::model(format!(
                    "expected {k} labels, got {}",
                    record.labels.len()
                )));
            }
            let target_sum: f64 = record.labels.iter().filter(|v| **v > 0.0).sum();
            if target_sum <= 0.0 {
                continue;
            }

            let probabilities = self.forward(&record.features);
            for label in 0..k {
                let target = record.labels[label].max(0.0) / target_sum;
                let delta = probabilities[label] - target;
                grad_b[label] += delta;
                if delta != 0.0 {
                    let row = &mut grad_w[label * n..(label + 1) * n];
                    for (g, x) in row.iter_mut().zip(&record.features) {
                        *g += delta * x;
                    }
                }
            }
            used += 1;
        }

        if used == 0 {
            return Ok(());
        }

        let rate = self.config.learning_rate / used as f64;
        let decay = self.config.learning_rate * self.config.l2;
        for (w, g) in self.state.weights.iter_mut().zip(&grad_w) {
            *w -= rate * g + decay * *w;
        }
        for (b, g) in self.state.bias.iter_mut().zip(&grad_b) {
            *b -= rate * g;
        }
        Ok(())
    }

    fn is_finite(&self) -> bool {
        self.state.weights.iter().chain(&self.state.bias).all(|v| v.is_finite())
    }

    fn write_checkpoint(&self, path: &std::path::Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn read_checkpoint(&mut self, path: &std::path::Path) -> Result<()> {
        let mut reader = BufReader::new(File::open(path)?);
        let (_, state): (SoftmaxRegressionConfig, Weights) =
            codec::read_frame(&mut reader, MODEL_MAGIC, MODEL_VERSION)?;
        self.state = state;
        Ok(())
    }
}

impl TrainableModel for SoftmaxRegression {
    fn builder_name(&self) -> &'static str {
        NAME
    }

    fn feature_count(&self) -> usize {
        self.state.feature_count
    }

    fn label_count(&self) -> usize {
        self.state.label_count
    }

    fn train(&mut self, context: TrainingContext<'_>) -> Result<TrainingOutcome> {
        let hyper = context.hyper_parameters;
        let checkpoint = context.scratch_dir.join(&self.config.checkpoint_file);
        let mut termination = TerminationReason::EpochsExhausted;

        log::info!(
            "training {NAME} on {} records ({} features, {} labels) for up to {} epochs",
            context.training.total_records(),
            self.state.feature_count,
            self.state.label_count,
            hyper.max_epochs
        );

        for _ in 0..hyper.max_epochs {
            context.training.reset();
            while context.training.has_more_records() {
                let batch = context.training.get_more_records(hyper.batch_size);
                self.train_batch(&batch)?;
            }

            if !self.is_finite() {
                termination = TerminationReason::Error("weights diverged".to_string());
                break;
            }

            let accumulator =
                context
                    .evaluation_engine
                    .accumulate(&*self, context.evaluation, hyper.batch_size)?;
            let score = context.score_calculator.score(&accumulator);
            let report = context.tracker.on_epoch_complete(score);

            if report.improved
                && let Err(e) = self.write_checkpoint(&checkpoint)
            {
                (context.error_handler)(&e);
            }

            if let Some(patience) = hyper.patience
                && context.tracker.epochs_since_best() >= patience
            {
                log::info!("no improvement for {patience} epochs, stopping");
                termination = TerminationReason::NoImprovement;
                break;
            }
        }

        if matches!(termination, TerminationReason::Error(_)) {
            return Ok(TrainingOutcome {
                epochs_run: context.tracker.epoch(),
                best_epoch: context.tracker.best_epoch(),
                best_score: context.tracker.best_score(),
                termination,
            });
        }

        if context.tracker.best_epoch().is_some() && checkpoint.exists() {
            self.read_checkpoint(&checkpoint)?;
            log::info!(
                "restored weights of epoch {}",
                context.tracker.best_epoch().unwrap_or(0)
            );
        }

        Ok(TrainingOutcome {
            epochs_run: context.tracker.epoch(),
            best_epoch: context.tracker.best_epoch(),
            best_score: context.tracker.best_score(),
            termination,
        })
    }

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.check_features(features)?;
        let scores = self.forward(features);
        if scores.iter().any(|v| !v.is_finite()) {
            return Err(LexiclassError::prediction("non-finite model output"));
        }
        Ok(scores)
    }

    fn save(&self, writer: &mut dyn Write) -> Result<()> {
        codec::write_frame(writer, MODEL_MAGIC, MODEL_VERSION, &(&self.config, &self.state))
    }
}

/// Builder for [`SoftmaxRegression`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftmaxRegressionBuilder;

impl ModelBuilder for SoftmaxRegressionBuilder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn create(
        &self,
        config: &Value,
        feature_count: usize,
        label_count: usize,
        seed: u64,
    ) -> Result<Box<dyn TrainableModel>> {
        if label_count == 0 {
            return Err(LexiclassError::model("model needs at least one label"));
        }
        let config = SoftmaxRegressionConfig::from_value(config)?;
        Ok(Box::new(SoftmaxRegression::new(
            config,
            feature_count,
            label_count,
            seed,
        )))
    }

    fn load(&self, reader: &mut dyn Read) -> Result<Box<dyn TrainableModel>> {
        let (config, state): (SoftmaxRegressionConfig, Weights) =
            codec::read_frame(reader, MODEL_MAGIC, MODEL_VERSION)?;

        if state.weights.len() != state.feature_count * state.label_count
            || state.bias.len() != state.label_count
        {
            return Err(LexiclassError::model("corrupt softmax-regression weights"));
        }
        Ok(Box::new(SoftmaxRegression { config, state }))
    }
}
