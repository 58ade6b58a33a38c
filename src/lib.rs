//! # lexiclass
//!
//! Train, evaluate and serve TF-IDF document classifiers.
//!
//! ## Features
//!
//! - TF-IDF vectorizer with a frozen, persistable vocabulary
//! - Disk-backed vectorized datasets streamed in shuffled batches
//! - Pluggable record sources, vectorizers and trainable models
//! - Confusion-matrix evaluation with a JSON report
//! - Multi-model inference server behind HTTP and raw socket adapters

pub mod analysis;
pub mod cli;
pub mod codec;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod model;
pub mod record;
pub mod storage;
pub mod training;
pub mod vectorizer;

pub mod prelude {
    pub use crate::dataset::BatchRecordProvider;
    pub use crate::error::{LexiclassError, Result};
    pub use crate::evaluation::{EvaluationEngine, EvaluationResult};
    pub use crate::inference::{InferenceResult, InferenceServer, InferenceService};
    pub use crate::model::{ModelBundle, ModelRegistry, TrainableModel};
    pub use crate::record::{RawRecord, RawRecordSource};
    pub use crate::training::{TrainingConfig, TrainingOrchestrator};
    pub use crate::vectorizer::{FeatureVectorizer, VectorizedRecord, VectorizerRegistry};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
