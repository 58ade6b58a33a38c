//! Epoch scoring under the configured metric.

use serde::{Deserialize, Serialize};

use crate::evaluation::confusion::{ConfusionAccumulator, ConfusionCounts};

/// Metric used to pick the best epoch.
///
/// Unrecognised names deserialize as [`EvaluationMetric::F1`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EvaluationMetric {
    #[default]
    F1,
    Precision,
    Recall,
}

impl From<String> for EvaluationMetric {
    fn from(name: String) -> Self {
        match name.as_str() {
            "f1" => EvaluationMetric::F1,
            "precision" => EvaluationMetric::Precision,
            "recall" => EvaluationMetric::Recall,
            other => {
                log::warn!("unknown evaluation metric {other:?}, using f1");
                EvaluationMetric::F1
            }
        }
    }
}

impl std::fmt::Display for EvaluationMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMetric::F1 => write!(f, "f1"),
            EvaluationMetric::Precision => write!(f, "precision"),
            EvaluationMetric::Recall => write!(f, "recall"),
        }
    }
}

/// Computes the selected metric from confusion totals aggregated across labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCalculator {
    metric: EvaluationMetric,
}

impl ScoreCalculator {
    pub fn new(metric: EvaluationMetric) -> Self {
        ScoreCalculator { metric }
    }

    pub fn metric(&self) -> EvaluationMetric {
        self.metric
    }

    pub fn score_totals(&self, totals: &ConfusionCounts) -> f64 {
        match self.metric {
            EvaluationMetric::F1 => totals.f1(),
            EvaluationMetric::Precision => totals.precision(),
            EvaluationMetric::Recall => totals.recall(),
        }
    }

    pub fn score(&self, accumulator: &ConfusionAccumulator) -> f64 {
        self.score_totals(&accumulator.totals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_selection() {
        let totals = ConfusionCounts::new(6, 0, 2, 3);

        let precision = ScoreCalculator::new(EvaluationMetric::Precision).score_totals(&totals);
        let recall = ScoreCalculator::new(EvaluationMetric::Recall).score_totals(&totals);
        let f1 = ScoreCalculator::default().score_totals(&totals);

        assert!((precision - 0.75).abs() < 1e-12);
        assert!((recall - 6.0 / 9.0).abs() < 1e-12);
        assert!((f1 - 2.0 * precision * recall / (precision + recall)).abs() < 1e-12);
    }

    #[test]
    fn test_metric_serde() {
        let metric: EvaluationMetric = serde_json::from_str("\"recall\"").unwrap();
        assert_eq!(metric, EvaluationMetric::Recall);
        assert_eq!(metric.to_string(), "recall");
        assert_eq!(serde_json::to_string(&EvaluationMetric::Precision).unwrap(), "\"precision\"");
    }

    #[test]
    fn test_unknown_metric_falls_back_to_f1() {
        let metric: EvaluationMetric = serde_json::from_str("\"auc\"").unwrap();
        assert_eq!(metric, EvaluationMetric::F1);

        let metric: EvaluationMetric = serde_json::from_str("\"Recall\"").unwrap();
        assert_eq!(metric, EvaluationMetric::F1);
        assert!(serde_json::from_str::<EvaluationMetric>("3").is_err());
    }
}
