//! Epoch bookkeeping.

/// State after one completed epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub score: f64,
    pub best_epoch: Option<usize>,
    pub best_score: f64,
    /// Whether this epoch set a new best score.
    pub improved: bool,
}

pub type EpochCallback = Box<dyn FnMut(&EpochReport) + Send>;

/// Tracks the epoch counter and the best-scoring epoch. Higher scores are better.
pub struct EpochTracker {
    epoch: usize,
    best: Option<(usize, f64)>,
    callback: Option<EpochCallback>,
}

impl std::fmt::Debug for EpochTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochTracker")
            .field("epoch", &self.epoch)
            .field("best", &self.best)
            .finish_non_exhaustive()
    }
}

impl Default for EpochTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochTracker {
    pub fn new() -> Self {
        EpochTracker {
            epoch: 0,
            best: None,
            callback: None,
        }
    }

    /// Also invoke `callback` after every epoch.
    pub fn with_callback(callback: EpochCallback) -> Self {
        EpochTracker {
            callback: Some(callback),
            ..Self::new()
        }
    }

    /// Record the evaluation score of the epoch that just finished.
    pub fn on_epoch_complete(&mut self, score: f64) -> EpochReport {
        self.epoch += 1;

        let improved = score.is_finite() && self.best.is_none_or(|(_, best)| score > best);
        if improved {
            self.best = Some((self.epoch, score));
        }

        let report = EpochReport {
            epoch: self.epoch,
            score,
            best_epoch: self.best_epoch(),
            best_score: self.best_score(),
            improved,
        };

        log::info!(
            "epoch {} complete: score {:.6}, best epoch {} with score {:.6}",
            report.epoch,
            report.score,
            report.best_epoch.unwrap_or(0),
            report.best_score
        );

        if let Some(callback) = self.callback.as_mut() {
            callback(&report);
        }
        report
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best.map(|(epoch, _)| epoch)
    }

    /// Best score so far, or 0 before any finite score.
    pub fn best_score(&self) -> f64 {
        self.best.map_or(0.0, |(_, score)| score)
    }

    /// Epochs completed since the best one (all of them if none was best).
    pub fn epochs_since_best(&self) -> usize {
        self.epoch - self.best_epoch().unwrap_or(0)
    }
}
