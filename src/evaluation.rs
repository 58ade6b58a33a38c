//! Model evaluation: per-label confusion statistics and aggregate scores.

pub mod confusion;
pub mod engine;
pub mod result;
pub mod score;

pub use confusion::{ConfusionAccumulator, ConfusionCounts, argmax};
pub use engine::EvaluationEngine;
pub use result::{ConfusionStatistics, EvaluationResult};
pub use score::{EvaluationMetric, ScoreCalculator};
