//! Scoring a model against an evaluation dataset.

use crate::dataset::BatchRecordProvider;
use crate::error::{LexiclassError, Result};
use crate::evaluation::confusion::{ConfusionAccumulator, ratio};
use crate::evaluation::result::{ConfusionStatistics, EvaluationResult};
use crate::model::TrainableModel;

/// Turns predictions and ground truth into an [`EvaluationResult`].
#[derive(Debug, Clone)]
pub struct EvaluationEngine {
    labels: Vec<String>,
}

impl EvaluationEngine {
    pub fn new(labels: Vec<String>) -> Self {
        EvaluationEngine { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn accumulator(&self) -> ConfusionAccumulator {
        ConfusionAccumulator::new(self.labels.len())
    }

    /// Score a complete set of predictions.
    pub fn score(&self, predictions: &[Vec<f64>], truth: &[Vec<f64>]) -> Result<EvaluationResult> {
        let mut accumulator = self.accumulator();
        accumulator.add_batch(predictions, truth)?;
        Ok(self.result(&accumulator))
    }

    /// Reset `provider` and run every record through `model`.
    pub fn accumulate(
        &self,
        model: &dyn TrainableModel,
        provider: &BatchRecordProvider,
        batch_size: usize,
    ) -> Result<ConfusionAccumulator> {
        if batch_size == 0 {
            return Err(LexiclassError::config("batch size must be positive"));
        }

        let mut accumulator = self.accumulator();
        provider.reset();

        while provider.has_more_records() {
            for record in provider.get_more_records(batch_size) {
                let prediction = model.predict(&record.features)?;
                accumulator.add(&prediction, &record.labels)?;
            }
        }

        Ok(accumulator)
    }

    /// Full evaluation pass over `provider`.
    pub fn evaluate(
        &self,
        model: &dyn TrainableModel,
        provider: &BatchRecordProvider,
        batch_size: usize,
    ) -> Result<EvaluationResult> {
        let accumulator = self.accumulate(model, provider, batch_size)?;
        log::info!(
            "evaluated {} records ({} without labels skipped)",
            accumulator.evaluated(),
            accumulator.skipped()
        );
        Ok(self.result(&accumulator))
    }

    /// Derive per-label and aggregate statistics from accumulated counts.
    pub fn result(&self, accumulator: &ConfusionAccumulator) -> EvaluationResult {
        let counts = accumulator.label_counts();

        let weighted_mcc: f64 = counts
            .iter()
            .map(|c| c.matthews_correlation() * c.support() as f64)
            .sum();
        let weighted_mcc = ratio(weighted_mcc, accumulator.evaluated() as f64);

        let mut per_label_f1 = Vec::with_capacity(counts.len());
        let mut per_label_confusion = Vec::with_capacity(counts.len());
        for (label, c) in self.labels.iter().zip(counts) {
            per_label_f1.push((label.clone(), c.f1()));
            per_label_confusion.push((
                label.clone(),
                ConfusionStatistics {
                    true_positives: c.true_positives,
                    true_negatives: c.true_negatives,
                    false_positives: c.false_positives,
                    false_negatives: c.false_negatives,
                    precision: c.precision(),
                    recall: c.recall(),
                    false_discovery_rate: c.false_discovery_rate(),
                    false_positive_rate: c.false_positive_rate(),
                    matthews_correlation_coefficient: weighted_mcc,
                },
            ));
        }

        EvaluationResult {
            accuracy: accumulator.totals().f1(),
            per_label_f1,
            per_label_confusion,
        }
    }
}
