//! Feature vectorizers.
//!
//! A vectorizer has two phases. [`FeatureVectorizer::build_vocabulary`]
//! consumes a raw record stream once (single-threaded, `&mut self`) and
//! freezes the vocabulary. After that [`FeatureVectorizer::vectorize`] is a
//! pure `&self` function of the frozen state and the record bytes, so it can
//! be called concurrently at training and serving time with identical
//! results.
//!
//! Vectorizers are persisted as a [`VectorizerSnapshot`]: the kind
//! identifier plus an opaque payload that the matching factory in the
//! [`VectorizerRegistry`] restores.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Result;
use crate::record::{RawRecord, RawRecordSource};

pub mod registry;
pub mod tfidf;

pub use registry::VectorizerRegistry;
pub use tfidf::{TfIdfConfig, TfIdfVectorizer};

const SNAPSHOT_MAGIC: &[u8; 4] = b"LXVS";
const SNAPSHOT_VERSION: u32 = 1;

/// A record converted to model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizedRecord {
    /// One value per vocabulary entry.
    pub features: Vec<f64>,

    /// Copied from the raw record.
    pub labels: Vec<f64>,
}

impl VectorizedRecord {
    pub fn new(features: Vec<f64>, labels: Vec<f64>) -> Self {
        VectorizedRecord { features, labels }
    }
}

/// Persistable state of a vectorizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizerSnapshot {
    /// Registry identifier of the vectorizer kind.
    pub kind: String,

    /// Kind-specific encoded state.
    pub payload: Vec<u8>,
}

impl VectorizerSnapshot {
    /// Write the snapshot as a standalone frame.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        codec::write_frame(writer, SNAPSHOT_MAGIC, SNAPSHOT_VERSION, self)
    }

    /// Read a snapshot written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        codec::read_frame(reader, SNAPSHOT_MAGIC, SNAPSHOT_VERSION)
    }
}

/// Converts raw records into fixed-length feature vectors.
pub trait FeatureVectorizer: Send + Sync + std::fmt::Debug {
    /// Registry identifier of this vectorizer kind.
    fn kind(&self) -> &'static str;

    /// Consume every record of `source` and freeze the vocabulary.
    fn build_vocabulary(&mut self, source: &mut dyn RawRecordSource) -> Result<()>;

    /// Whether the vocabulary has been built.
    fn is_built(&self) -> bool;

    /// Convert one record using the frozen vocabulary.
    fn vectorize(&self, record: &RawRecord) -> Result<VectorizedRecord>;

    /// Length of every produced feature vector.
    fn feature_count(&self) -> usize;

    /// Labels that index label vectors.
    fn labels(&self) -> &[String];

    fn label_count(&self) -> usize {
        self.labels().len()
    }

    /// Capture the frozen state for persistence.
    fn snapshot(&self) -> Result<VectorizerSnapshot>;
}
