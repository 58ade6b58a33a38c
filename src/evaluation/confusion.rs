//! Confusion counting.

use serde::{Deserialize, Serialize};

use crate::error::{LexiclassError, Result};

/// `a / b`, or 0 when `b` is 0.
pub(crate) fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

/// Index of the first maximum, starting from 0 so non-positive vectors map to index 0.
///
/// Returns `None` for an empty slice.
pub fn argmax(values: &[f64]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }

    let mut best = 0;
    let mut best_value = 0.0;
    for (i, &value) in values.iter().enumerate() {
        if value > best_value {
            best = i;
            best_value = value;
        }
    }
    Some(best)
}

/// One-vs-rest confusion counts for a single label, or totals across labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    pub fn new(tp: u64, tn: u64, fp: u64, fn_: u64) -> Self {
        ConfusionCounts {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    fn tp(&self) -> f64 {
        self.true_positives as f64
    }

    fn tn(&self) -> f64 {
        self.true_negatives as f64
    }

    fn fp(&self) -> f64 {
        self.false_positives as f64
    }

    fn fn_(&self) -> f64 {
        self.false_negatives as f64
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp(), self.tp() + self.fp())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp(), self.tp() + self.fn_())
    }

    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        ratio(2.0 * precision * recall, precision + recall)
    }

    pub fn false_discovery_rate(&self) -> f64 {
        ratio(self.fp(), self.tp() + self.fp())
    }

    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.fp(), self.fp() + self.tn())
    }

    /// Matthews correlation coefficient of the 2×2 table.
    pub fn matthews_correlation(&self) -> f64 {
        let numerator = self.tp() * self.tn() - self.fp() * self.fn_();
        let denominator = ((self.tp() + self.fp())
            * (self.tp() + self.fn_())
            * (self.tn() + self.fp())
            * (self.tn() + self.fn_()))
        .sqrt();
        ratio(numerator, denominator)
    }

    /// Records whose actual class is this label.
    pub fn support(&self) -> u64 {
        self.true_positives + self.false_negatives
    }

    pub fn merge(&mut self, other: &ConfusionCounts) {
        self.true_positives += other.true_positives;
        self.true_negatives += other.true_negatives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

/// Accumulates arg-max classification outcomes across batches.
#[derive(Debug, Clone)]
pub struct ConfusionAccumulator {
    counts: Vec<ConfusionCounts>,
    evaluated: u64,
    skipped: u64,
}

impl ConfusionAccumulator {
    pub fn new(label_count: usize) -> Self {
        ConfusionAccumulator {
            counts: vec![ConfusionCounts::default(); label_count],
            evaluated: 0,
            skipped: 0,
        }
    }

    /// Record one prediction against its ground truth.
    ///
    /// Records without any positive label are skipped.
    pub fn add(&mut self, prediction: &[f64], truth: &[f64]) -> Result<()> {
        let label_count = self.counts.len();
        if prediction.len() != label_count || truth.len() != label_count {
            return Err(LexiclassError::model(format!(
                "expected {label_count} outputs and labels, got {} and {}",
                prediction.len(),
                truth.len()
            )));
        }

        if !truth.iter().any(|v| *v > 0.0) {
            self.skipped += 1;
            return Ok(());
        }

        let (Some(predicted), Some(actual)) = (argmax(prediction), argmax(truth)) else {
            self.skipped += 1;
            return Ok(());
        };

        for (label, counts) in self.counts.iter_mut().enumerate() {
            match (label == predicted, label == actual) {
                (true, true) => counts.true_positives += 1,
                (true, false) => counts.false_positives += 1,
                (false, true) => counts.false_negatives += 1,
                (false, false) => counts.true_negatives += 1,
            }
        }
        self.evaluated += 1;
        Ok(())
    }

    pub fn add_batch(&mut self, predictions: &[Vec<f64>], truths: &[Vec<f64>]) -> Result<()> {
        if predictions.len() != truths.len() {
            return Err(LexiclassError::model(format!(
                "{} predictions for {} records",
                predictions.len(),
                truths.len()
            )));
        }

        for (prediction, truth) in predictions.iter().zip(truths) {
            self.add(prediction, truth)?;
        }
        Ok(())
    }

    pub fn label_counts(&self) -> &[ConfusionCounts] {
        &self.counts
    }

    /// Sum of every label's counts.
    pub fn totals(&self) -> ConfusionCounts {
        let mut totals = ConfusionCounts::default();
        for counts in &self.counts {
            totals.merge(counts);
        }
        totals
    }

    /// Records that contributed to the counts.
    pub fn evaluated(&self) -> u64 {
        self.evaluated
    }

    /// Records masked out for lack of a positive label.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let counts = ConfusionCounts::new(8, 9, 2, 1);

        assert!((counts.precision() - 0.8).abs() < 1e-12);
        assert!((counts.recall() - 8.0 / 9.0).abs() < 1e-12);
        assert!((counts.false_discovery_rate() - 0.2).abs() < 1e-12);
        assert!((counts.false_positive_rate() - 2.0 / 11.0).abs() < 1e-12);

        let expected_mcc = (8.0 * 9.0 - 2.0 * 1.0) / (10.0f64 * 9.0 * 11.0 * 10.0).sqrt();
        assert!((counts.matthews_correlation() - expected_mcc).abs() < 1e-12);
        assert_eq!(counts.support(), 9);
    }

    #[test]
    fn test_zero_denominators() {
        let counts = ConfusionCounts::default();
        assert_eq!(counts.precision(), 0.0);
        assert_eq!(counts.recall(), 0.0);
        assert_eq!(counts.f1(), 0.0);
        assert_eq!(counts.matthews_correlation(), 0.0);
    }

    #[test]
    fn test_argmax_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), Some(1));
        assert_eq!(argmax(&[-1.0, -0.5]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_accumulate() {
        let mut acc = ConfusionAccumulator::new(3);
        acc.add(&[0.9, 0.05, 0.05], &[1.0, 0.0, 0.0]).unwrap();
        acc.add(&[0.2, 0.7, 0.1], &[1.0, 0.0, 0.0]).unwrap();
        acc.add(&[0.1, 0.1, 0.8], &[0.0, 0.0, 1.0]).unwrap();
        acc.add(&[0.1, 0.1, 0.8], &[0.0, 0.0, 0.0]).unwrap();

        assert_eq!(acc.evaluated(), 3);
        assert_eq!(acc.skipped(), 1);
        assert_eq!(acc.label_counts()[0], ConfusionCounts::new(1, 1, 0, 1));
        assert_eq!(acc.label_counts()[1], ConfusionCounts::new(0, 2, 1, 0));
        assert_eq!(acc.label_counts()[2], ConfusionCounts::new(1, 2, 0, 0));
        assert_eq!(acc.totals(), ConfusionCounts::new(2, 5, 1, 1));
    }

    #[test]
    fn test_length_mismatch() {
        let mut acc = ConfusionAccumulator::new(2);
        assert!(acc.add(&[1.0], &[1.0, 0.0]).is_err());
        assert!(acc.add_batch(&[vec![1.0, 0.0]], &[]).is_err());
    }
}
