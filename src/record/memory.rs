//! In-memory record source.

use crate::error::Result;
use crate::record::{RawRecord, RawRecordSource};

/// Serves a fixed list of records in order.
#[derive(Debug, Clone)]
pub struct MemoryRecordSource {
    labels: Vec<String>,
    records: Vec<RawRecord>,
    cursor: usize,
}

impl MemoryRecordSource {
    pub fn new(labels: Vec<String>, records: Vec<RawRecord>) -> Self {
        MemoryRecordSource {
            labels,
            records,
            cursor: 0,
        }
    }

    /// Build one-hot records from `(text, label)` pairs. Unknown labels get an all-zero vector.
    pub fn from_texts<S: AsRef<str>>(labels: Vec<String>, rows: &[(S, &str)]) -> Self {
        let records = rows
            .iter()
            .map(|(text, label)| {
                let index = labels.iter().position(|l| l == label).unwrap_or(usize::MAX);
                RawRecord::one_hot(text.as_ref().as_bytes(), index, labels.len())
            })
            .collect();
        MemoryRecordSource::new(labels, records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RawRecordSource for MemoryRecordSource {
    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn has_more_records(&self) -> bool {
        self.cursor < self.records.len()
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let record = self.records.get(self.cursor).cloned();
        if record.is_some() {
            self.cursor += 1;
        }
        Ok(record)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
