//! Evaluation results and their JSON report.

use std::io::Write;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-label statistics as written to the evaluation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfusionStatistics {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub precision: f64,
    pub recall: f64,
    pub false_discovery_rate: f64,
    pub false_positive_rate: f64,
    /// Support-weighted MCC across all labels; identical for every label.
    pub matthews_correlation_coefficient: f64,
}

/// Outcome of one evaluation pass. Label order follows the model's label list.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// Aggregate F1 from totals across labels.
    pub accuracy: f64,
    pub per_label_f1: Vec<(String, f64)>,
    pub per_label_confusion: Vec<(String, ConfusionStatistics)>,
}

struct OrderedMap<'a, T>(&'a [(String, T)]);

impl<T: Serialize> Serialize for OrderedMap<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for EvaluationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("accuracy", &self.accuracy)?;
        map.serialize_entry("accuracy-per-label", &OrderedMap(&self.per_label_f1))?;
        map.serialize_entry("confusion-per-label", &OrderedMap(&self.per_label_confusion))?;
        map.end()
    }
}

impl EvaluationResult {
    pub fn f1(&self, label: &str) -> Option<f64> {
        self.per_label_f1
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| *value)
    }

    pub fn confusion(&self, label: &str) -> Option<&ConfusionStatistics> {
        self.per_label_confusion
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, stats)| stats)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }
}
