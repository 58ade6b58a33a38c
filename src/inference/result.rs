//! Inference results and the transport envelope.

use serde::Serialize;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};

use crate::error::{LexiclassError, Result};

/// Outcome of one `infer` call.
///
/// Serializes as
/// `{"highest-label": .., "highest-confidence": .., "scores": [{label: score}, ..]}`
/// with scores in label order.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub highest_label: String,
    pub highest_confidence: f64,
    pub scores: Vec<(String, f64)>,
}

impl InferenceResult {
    /// Pick the highest score. Starts from the first label with confidence 0,
    /// so only a strictly greater positive score replaces it.
    pub fn from_scores(labels: &[String], scores: &[f64]) -> Result<Self> {
        if labels.is_empty() {
            return Err(LexiclassError::prediction("model has no labels"));
        }
        if labels.len() != scores.len() {
            return Err(LexiclassError::prediction(format!(
                "model returned {} scores for {} labels",
                scores.len(),
                labels.len()
            )));
        }

        let mut highest = 0;
        let mut highest_confidence = 0.0;
        for (i, score) in scores.iter().enumerate() {
            if *score > highest_confidence {
                highest = i;
                highest_confidence = *score;
            }
        }

        Ok(InferenceResult {
            highest_label: labels[highest].clone(),
            highest_confidence,
            scores: labels.iter().cloned().zip(scores.iter().copied()).collect(),
        })
    }

    pub fn score(&self, label: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, score)| *score)
    }
}

struct LabelScore<'a>(&'a str, f64);

impl Serialize for LabelScore<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, &self.1)?;
        map.end()
    }
}

struct Scores<'a>(&'a [(String, f64)]);

impl Serialize for Scores<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (label, score) in self.0 {
            seq.serialize_element(&LabelScore(label, *score))?;
        }
        seq.end()
    }
}

impl Serialize for InferenceResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("highest-label", &self.highest_label)?;
        map.serialize_entry("highest-confidence", &self.highest_confidence)?;
        map.serialize_entry("scores", &Scores(&self.scores))?;
        map.end()
    }
}

/// Response body shared by every transport.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<InferenceResult>,

    /// `"<Kind>: <message>"` when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl Envelope {
    pub fn success(result: InferenceResult) -> Self {
        Envelope {
            success: true,
            result: Some(result),
            exception: None,
        }
    }

    pub fn failure(error: &LexiclassError) -> Self {
        Envelope {
            success: false,
            result: None,
            exception: Some(error.envelope_message()),
        }
    }

    pub fn to_json(&self) -> String {
        // Only strings, bools and finite-or-null floats; cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"success":false}"#.to_string())
    }
}

impl From<Result<InferenceResult>> for Envelope {
    fn from(result: Result<InferenceResult>) -> Self {
        match result {
            Ok(result) => Envelope::success(result),
            Err(e) => Envelope::failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn labels() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    #[test]
    fn test_highest_first_maximum_wins() {
        let result = InferenceResult::from_scores(&labels(), &[0.2, 0.4, 0.4]).unwrap();
        assert_eq!(result.highest_label, "b");
        assert_eq!(result.highest_confidence, 0.4);
        assert_eq!(result.score("c"), Some(0.4));
    }

    #[test]
    fn test_non_positive_scores_report_first_label() {
        let result = InferenceResult::from_scores(&labels(), &[-1.0, -0.5, 0.0]).unwrap();
        assert_eq!(result.highest_label, "a");
        assert_eq!(result.highest_confidence, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(InferenceResult::from_scores(&labels(), &[1.0]).is_err());
    }

    #[test]
    fn test_json_shape() {
        let result = InferenceResult::from_scores(&labels(), &[0.1, 0.7, 0.2]).unwrap();
        let value: Value = serde_json::from_str(&Envelope::success(result).to_json()).unwrap();

        assert_eq!(
            value,
            json!({
                "success": true,
                "result": {
                    "highest-label": "b",
                    "highest-confidence": 0.7,
                    "scores": [{"a": 0.1}, {"b": 0.7}, {"c": 0.2}]
                }
            })
        );
    }

    #[test]
    fn test_failure_envelope() {
        let envelope = Envelope::from(Err(LexiclassError::model_not_found("news")));
        let value: Value = serde_json::from_str(&envelope.to_json()).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["exception"], "ModelNotFound: news");
        assert!(value.get("result").is_none());
    }
}
