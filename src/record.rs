//! Raw record sources.
//!
//! A raw record is an opaque byte payload plus a multi-hot label vector over
//! the configured label list. Sources are pulled one record at a time by the
//! vectorizer, and can be rewound with [`RawRecordSource::reset`] so the
//! same stream can be read for vocabulary building and again for
//! vectorization.

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod directory;
pub mod jsonl;
pub mod memory;
pub mod registry;

pub use directory::DirectoryRecordSource;
pub use jsonl::JsonlRecordSource;
pub use memory::MemoryRecordSource;
pub use registry::{RecordSourceRegistry, SourceContext};

/// A single unprocessed training or evaluation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Raw payload bytes, usually UTF-8 text.
    pub data: Vec<u8>,

    /// One-hot or multi-hot vector over the configured labels.
    pub labels: Vec<f64>,
}

impl RawRecord {
    pub fn new(data: impl Into<Vec<u8>>, labels: Vec<f64>) -> Self {
        RawRecord {
            data: data.into(),
            labels,
        }
    }

    /// Build a record with a one-hot label vector.
    pub fn one_hot(data: impl Into<Vec<u8>>, label_index: usize, label_count: usize) -> Self {
        let mut labels = vec![0.0; label_count];
        if label_index < label_count {
            labels[label_index] = 1.0;
        }
        RawRecord::new(data, labels)
    }

    /// Payload decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// A rewindable pull-stream of raw records.
pub trait RawRecordSource: Send {
    /// Rewind to the first record.
    fn reset(&mut self) -> Result<()>;

    /// Whether another call to [`next_record`](Self::next_record) may yield a record.
    fn has_more_records(&self) -> bool;

    /// Pull the next record, or `None` once the stream is exhausted.
    ///
    /// Per-record failures are reported through the source's error handler
    /// and skipped; an `Err` means the stream itself is unusable.
    fn next_record(&mut self) -> Result<Option<RawRecord>>;

    /// Labels that index the records' label vectors.
    fn labels(&self) -> &[String];

    /// Identifier of this source kind.
    fn name(&self) -> &'static str;
}
