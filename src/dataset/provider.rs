//! Shuffled, thread-safe batch access to a slot dataset.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::dataset::slot;
use crate::error::{ErrorHandler, Result};
use crate::storage::Storage;
use crate::vectorizer::VectorizedRecord;

/// Position of a provider within its epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Never reset; records come back in slot order.
    Uninitialized,
    /// Reset and nothing handed out yet.
    Ready,
    /// Part of the epoch handed out.
    Draining,
    /// Every record of the epoch handed out.
    Exhausted,
}

struct Cursor {
    index_list: Vec<usize>,
    processed: usize,
    rng: StdRng,
    reset_once: bool,
}

/// Streams a fixed slot dataset in batches, every record exactly once per epoch.
///
/// Index reservation is serialized by one lock; the reserved slots are read
/// outside it, in parallel. [`reset`](Self::reset) reshuffles with an RNG
/// seeded once at construction, so successive epochs see different orders
/// while two providers built with the same seed see the same sequence.
pub struct BatchRecordProvider {
    storage: Arc<dyn Storage>,
    total_records: usize,
    cursor: Mutex<Cursor>,
    error_handler: ErrorHandler,
}

impl std::fmt::Debug for BatchRecordProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRecordProvider")
            .field("storage", &self.storage)
            .field("total_records", &self.total_records)
            .field("state", &self.state())
            .finish()
    }
}

impl BatchRecordProvider {
    /// Scan `storage` once and index its slots.
    pub fn new(storage: Arc<dyn Storage>, seed: u64, error_handler: ErrorHandler) -> Result<Self> {
        let total_records = slot::count_slots(storage.as_ref())?;
        log::debug!("batch provider over {total_records} records");

        Ok(BatchRecordProvider {
            storage,
            total_records,
            cursor: Mutex::new(Cursor {
                index_list: (0..total_records).collect(),
                processed: 0,
                rng: StdRng::seed_from_u64(seed),
                reset_once: false,
            }),
            error_handler,
        })
    }

    /// Start a new epoch with a fresh shuffle.
    pub fn reset(&self) {
        let mut cursor = self.cursor.lock();
        let Cursor {
            index_list, rng, ..
        } = &mut *cursor;
        index_list.shuffle(rng);
        cursor.processed = 0;
        cursor.reset_once = true;
    }

    pub fn has_more_records(&self) -> bool {
        self.cursor.lock().processed < self.total_records
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn state(&self) -> ProviderState {
        let cursor = self.cursor.lock();
        if !cursor.reset_once && cursor.processed == 0 {
            ProviderState::Uninitialized
        } else if cursor.processed == 0 && self.total_records > 0 {
            ProviderState::Ready
        } else if cursor.processed < self.total_records {
            ProviderState::Draining
        } else {
            ProviderState::Exhausted
        }
    }

    /// Reserve up to `count` indices at the cursor. Concurrent callers never
    /// receive overlapping ranges.
    pub fn reserve_batch(&self, count: usize) -> Vec<usize> {
        let mut cursor = self.cursor.lock();
        let start = cursor.processed;
        let end = start + count.min(self.total_records - start);
        cursor.processed = end;
        cursor.index_list[start..end].to_vec()
    }

    /// Read the given slots in parallel.
    pub fn read_slots(&self, indices: &[usize]) -> Result<Vec<VectorizedRecord>> {
        indices
            .par_iter()
            .map(|&index| slot::read_slot(self.storage.as_ref(), index))
            .collect()
    }

    /// Next batch of at most `count` records; fewer at the end of the epoch
    /// and none once exhausted.
    ///
    /// A failed read is reported to the error handler and yields an empty batch.
    pub fn get_more_records(&self, count: usize) -> Vec<VectorizedRecord> {
        let indices = self.reserve_batch(count);
        if indices.is_empty() {
            return Vec::new();
        }

        match self.read_slots(&indices) {
            Ok(records) => records,
            Err(e) => {
                (self.error_handler)(&e);
                Vec::new()
            }
        }
    }

    /// Release resources held by the provider.
    pub fn dispose(&self) {}
}
