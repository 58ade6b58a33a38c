//! JSON Lines record source.
//!
//! Each line holds one JSON object:
//! ```jsonl
//! {"text": "interest rates rise again", "label": "finance"}
//! {"text": "late winner at the derby", "label": ["sport", "local"]}
//! ```
//! The label field is a single label name or an array of names (multi-hot).

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ErrorHandler, LexiclassError, Result};
use crate::record::{RawRecord, RawRecordSource, SourceContext};

fn default_text_field() -> String {
    "text".to_string()
}

fn default_label_field() -> String {
    "label".to_string()
}

/// Configuration for [`JsonlRecordSource`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JsonlSourceConfig {
    pub file: PathBuf,

    #[serde(default = "default_text_field")]
    pub text_field: String,

    #[serde(default = "default_label_field")]
    pub label_field: String,
}

pub struct JsonlRecordSource {
    path: PathBuf,
    text_field: String,
    label_field: String,
    labels: Vec<String>,
    lines: Option<Lines<BufReader<File>>>,
    line_number: usize,
    peeked: Option<RawRecord>,
    error_handler: ErrorHandler,
}

impl JsonlRecordSource {
    pub fn new<P: AsRef<Path>>(
        path: P,
        labels: Vec<String>,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let mut source = JsonlRecordSource {
            path: path.as_ref().to_path_buf(),
            text_field: default_text_field(),
            label_field: default_label_field(),
            labels,
            lines: None,
            line_number: 0,
            peeked: None,
            error_handler,
        };
        source.reset()?;
        Ok(source)
    }

    pub fn from_config(config: &Value, context: &SourceContext) -> Result<Self> {
        let config: JsonlSourceConfig = serde_json::from_value(config.clone())?;
        if context.labels.is_empty() {
            return Err(LexiclassError::config("jsonl source has no labels"));
        }

        let mut source = Self::new(
            &config.file,
            context.labels.clone(),
            context.error_handler.clone(),
        )?;
        source.text_field = config.text_field;
        source.label_field = config.label_field;
        source.reset()?;
        Ok(source)
    }

    fn parse_line(&self, line: &str) -> Result<RawRecord> {
        let value: Value = serde_json::from_str(line).map_err(|e| {
            LexiclassError::data(format!("line {}: invalid JSON: {e}", self.line_number))
        })?;

        let text = value
            .get(&self.text_field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                LexiclassError::data(format!(
                    "line {}: missing string field '{}'",
                    self.line_number, self.text_field
                ))
            })?;

        let names: Vec<&str> = match value.get(&self.label_field) {
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => {
                return Err(LexiclassError::data(format!(
                    "line {}: missing label field '{}'",
                    self.line_number, self.label_field
                )));
            }
        };

        let mut label_vector = vec![0.0; self.labels.len()];
        for name in names {
            match self.labels.iter().position(|l| l == name) {
                Some(index) => label_vector[index] = 1.0,
                None => {
                    return Err(LexiclassError::data(format!(
                        "line {}: unknown label '{name}'",
                        self.line_number
                    )));
                }
            }
        }

        Ok(RawRecord::new(text.as_bytes(), label_vector))
    }

    fn advance(&mut self) {
        self.peeked = None;

        while let Some(lines) = self.lines.as_mut() {
            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    (self.error_handler)(&LexiclassError::from(e));
                    self.lines = None;
                    return;
                }
                None => {
                    self.lines = None;
                    return;
                }
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match self.parse_line(&line) {
                Ok(record) => {
                    self.peeked = Some(record);
                    return;
                }
                Err(e) => (self.error_handler)(&e),
            }
        }
    }
}

impl RawRecordSource for JsonlRecordSource {
    fn reset(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| {
            LexiclassError::config(format!("cannot open {}: {e}", self.path.display()))
        })?;
        self.lines = Some(BufReader::new(file).lines());
        self.line_number = 0;
        self.advance();
        Ok(())
    }

    fn has_more_records(&self) -> bool {
        self.peeked.is_some()
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let record = self.peeked.take();
        if record.is_some() {
            self.advance();
        }
        Ok(record)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::logging_error_handler;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_reads_single_and_multi_labels() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        std::fs::write(
            &path,
            "{\"text\": \"rates rise\", \"label\": \"finance\"}\n\n{\"text\": \"derby\", \"label\": [\"sport\", \"local\"]}\n",
        )
        .unwrap();

        let labels = vec!["finance".into(), "sport".into(), "local".into()];
        let mut source = JsonlRecordSource::new(&path, labels, logging_error_handler()).unwrap();

        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.labels, vec![1.0, 0.0, 0.0]);
        let second = source.next_record().unwrap().unwrap();
        assert_eq!(second.labels, vec![0.0, 1.0, 1.0]);
        assert!(!source.has_more_records());
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines_are_reported_and_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        std::fs::write(
            &path,
            "not json\n{\"text\": \"x\", \"label\": \"other\"}\n{\"body\": \"y\", \"label\": \"a\"}\n{\"text\": \"ok\", \"label\": \"a\"}\n",
        )
        .unwrap();

        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        let handler: ErrorHandler = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut source = JsonlRecordSource::new(&path, vec!["a".into()], handler).unwrap();
        let record = source.next_record().unwrap().unwrap();
        assert_eq!(record.text(), "ok");
        assert_eq!(reported.load(Ordering::SeqCst), 3);

        source.reset().unwrap();
        assert!(source.has_more_records());
    }

    #[test]
    fn test_custom_fields_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"body\": \"hello\", \"category\": \"a\"}\n").unwrap();

        let config = serde_json::json!({
            "file": path,
            "text-field": "body",
            "label-field": "category",
        });
        let ctx = SourceContext::new(vec!["a".into()], logging_error_handler());
        let mut source = JsonlRecordSource::from_config(&config, &ctx).unwrap();

        assert_eq!(source.next_record().unwrap().unwrap().text(), "hello");
    }
}
