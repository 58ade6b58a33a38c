//! End-to-end training runs.
//!
//! The [`TrainingOrchestrator`] turns a [`TrainingConfig`] into a persisted
//! model bundle and evaluation report: it builds (or reuses) the vectorizer
//! and vectorized datasets in a temp directory, hands the opaque model two
//! batch providers and an [`EpochTracker`], then saves and evaluates the
//! result.

pub mod config;
pub mod layout;
pub mod orchestrator;
pub mod tracker;

pub use config::{HyperParameters, TrainingConfig};
pub use layout::TempLayout;
pub use orchestrator::{TrainingOrchestrator, TrainingSummary};
pub use tracker::{EpochCallback, EpochReport, EpochTracker};
