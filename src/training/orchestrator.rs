//! One end-to-end training run.

use std::path::Path;

use crate::dataset::{BatchRecordProvider, DatasetWriter, DatasetWriterConfig};
use crate::error::{ErrorHandler, LexiclassError, Result, logging_error_handler};
use crate::evaluation::{EvaluationEngine, EvaluationResult, ScoreCalculator};
use crate::model::{
    ModelBundle, ModelRegistry, TerminationReason, TrainingContext, TrainingOutcome,
};
use crate::record::{RawRecordSource, RecordSourceRegistry, SourceContext};
use crate::training::{EpochCallback, EpochTracker, TempLayout, TrainingConfig};
use crate::vectorizer::{FeatureVectorizer, VectorizerRegistry};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// The seed actually used, drawn at random when none was configured.
    pub seed: u64,
    pub feature_count: usize,
    pub training_records: usize,
    pub evaluation_records: usize,
    pub outcome: TrainingOutcome,
    pub evaluation: EvaluationResult,
}

/// Drives training runs: datasets, model construction, training, persistence.
///
/// Record sources, vectorizers and model builders are resolved by name from
/// the orchestrator's registries, which callers may extend before running.
pub struct TrainingOrchestrator {
    record_sources: RecordSourceRegistry,
    vectorizers: VectorizerRegistry,
    models: ModelRegistry,
    error_handler: ErrorHandler,
    epoch_callback: Option<EpochCallback>,
}

impl Default for TrainingOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingOrchestrator {
    pub fn new() -> Self {
        TrainingOrchestrator {
            record_sources: RecordSourceRegistry::new(),
            vectorizers: VectorizerRegistry::new(),
            models: ModelRegistry::new(),
            error_handler: logging_error_handler(),
            epoch_callback: None,
        }
    }

    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Call `callback` after every epoch of the next run.
    pub fn with_epoch_callback(mut self, callback: EpochCallback) -> Self {
        self.epoch_callback = Some(callback);
        self
    }

    pub fn record_sources_mut(&mut self) -> &mut RecordSourceRegistry {
        &mut self.record_sources
    }

    pub fn vectorizers_mut(&mut self) -> &mut VectorizerRegistry {
        &mut self.vectorizers
    }

    pub fn models_mut(&mut self) -> &mut ModelRegistry {
        &mut self.models
    }

    /// Run training and write the model bundle and evaluation report.
    ///
    /// If training stops with an error nothing is written.
    pub fn execute(
        &mut self,
        config: &TrainingConfig,
        temp_dir: &Path,
        model_out: &Path,
        eval_out: &Path,
    ) -> Result<TrainingSummary> {
        config.validate()?;

        let mut hyper = config.hyper_parameters.clone();
        let seed = hyper.resolve_seed();
        let labels = config.labels.clone();
        log::info!(
            "starting training run: {} labels, seed {seed}, metric {}",
            labels.len(),
            hyper.evaluation_metric
        );

        let context = SourceContext::new(labels.clone(), self.error_handler.clone());
        let mut training_source = self.record_sources.create(
            &config.training_record_source,
            &config.training_record_source_config,
            &context,
        )?;
        let mut evaluation_source = self.record_sources.create(
            &config.evaluation_record_source,
            &config.evaluation_record_source_config,
            &context,
        )?;

        let layout = TempLayout::new(temp_dir);
        let scratch_dir = layout.prepare_model_dir()?;

        let vectorizer = if config.reuse_cached_sequence_data && layout.has_cached_data() {
            self.load_cached_vectorizer(&layout, &labels)?
        } else {
            if config.reuse_cached_sequence_data {
                log::warn!(
                    "no cached sequence data in {}, rebuilding",
                    layout.data_dir().display()
                );
            }
            self.build_datasets(
                config,
                &layout,
                training_source.as_mut(),
                evaluation_source.as_mut(),
            )?
        };

        let training = BatchRecordProvider::new(
            layout.training_storage()?,
            seed,
            self.error_handler.clone(),
        )?;
        let evaluation = BatchRecordProvider::new(
            layout.evaluation_storage()?,
            seed,
            self.error_handler.clone(),
        )?;

        let mut model = self.models.get(&config.model_builder)?.create(
            &config.model_builder_config,
            vectorizer.feature_count(),
            labels.len(),
            seed,
        )?;

        let mut tracker = match self.epoch_callback.take() {
            Some(callback) => EpochTracker::with_callback(callback),
            None => EpochTracker::new(),
        };
        let engine = EvaluationEngine::new(labels);

        let outcome = model.train(TrainingContext {
            hyper_parameters: &hyper,
            scratch_dir: &scratch_dir,
            training: &training,
            evaluation: &evaluation,
            evaluation_engine: &engine,
            score_calculator: ScoreCalculator::new(hyper.evaluation_metric),
            tracker: &mut tracker,
            error_handler: self.error_handler.clone(),
        })?;

        if let TerminationReason::Error(reason) = &outcome.termination {
            return Err(LexiclassError::model(format!("training failed: {reason}")));
        }
        log::info!(
            "training finished after {} epochs ({:?}), best epoch {:?} with score {:.6}",
            outcome.epochs_run,
            outcome.termination,
            outcome.best_epoch,
            outcome.best_score
        );

        ModelBundle::from_parts(model.as_ref(), vectorizer.as_ref())?.save(model_out)?;

        let result = engine.evaluate(model.as_ref(), &evaluation, hyper.batch_size)?;
        result.save(eval_out)?;
        log::info!(
            "accuracy {:.6}, report written to {}",
            result.accuracy,
            eval_out.display()
        );

        let summary = TrainingSummary {
            seed,
            feature_count: vectorizer.feature_count(),
            training_records: training.total_records(),
            evaluation_records: evaluation.total_records(),
            outcome,
            evaluation: result,
        };
        training.dispose();
        evaluation.dispose();
        Ok(summary)
    }

    fn load_cached_vectorizer(
        &self,
        layout: &TempLayout,
        labels: &[String],
    ) -> Result<Box<dyn FeatureVectorizer>> {
        let vectorizer = self.vectorizers.restore(&layout.read_snapshot()?)?;
        if vectorizer.labels() != labels {
            return Err(LexiclassError::config(
                "cached sequence data was built for a different label list",
            ));
        }
        log::info!(
            "reusing cached sequence data ({} features)",
            vectorizer.feature_count()
        );
        Ok(vectorizer)
    }

    fn build_datasets(
        &self,
        config: &TrainingConfig,
        layout: &TempLayout,
        training_source: &mut dyn RawRecordSource,
        evaluation_source: &mut dyn RawRecordSource,
    ) -> Result<Box<dyn FeatureVectorizer>> {
        layout.recreate_data_dir()?;

        let mut vectorizer = self.vectorizers.create(
            &config.input_sequence,
            &config.input_sequence_config,
            &config.labels,
        )?;
        vectorizer.build_vocabulary(training_source)?;
        layout.write_snapshot(&vectorizer.snapshot()?)?;

        let writer = DatasetWriter::new(
            DatasetWriterConfig {
                thread_pool_size: config.thread_pool_size,
                ..DatasetWriterConfig::default()
            },
            self.error_handler.clone(),
        )?;

        training_source.reset()?;
        let storage = layout.training_storage()?;
        let written = writer.write(training_source, vectorizer.as_ref(), storage.as_ref())?;
        log::info!("vectorized {written} training records");

        evaluation_source.reset()?;
        let storage = layout.evaluation_storage()?;
        let written = writer.write(evaluation_source, vectorizer.as_ref(), storage.as_ref())?;
        log::info!("vectorized {written} evaluation records");

        Ok(vectorizer)
    }
}
