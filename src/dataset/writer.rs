//! Vectorize a raw record stream into a slot dataset.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::dataset::slot;
use crate::error::{ErrorHandler, LexiclassError, Result};
use crate::record::{RawRecord, RawRecordSource};
use crate::storage::Storage;
use crate::vectorizer::FeatureVectorizer;

/// Settings for [`DatasetWriter`].
#[derive(Debug, Clone)]
pub struct DatasetWriterConfig {
    /// Raw records buffered before each parallel vectorize pass.
    pub chunk_size: usize,

    /// Worker threads; `None` uses one per CPU.
    pub thread_pool_size: Option<usize>,
}

impl Default for DatasetWriterConfig {
    fn default() -> Self {
        DatasetWriterConfig {
            chunk_size: 256,
            thread_pool_size: None,
        }
    }
}

/// Pulls records sequentially, vectorizes each buffered chunk in parallel
/// and writes the results to consecutive slots.
///
/// Slot indices follow source order, so the same source always produces
/// the same dataset.
pub struct DatasetWriter {
    config: DatasetWriterConfig,
    thread_pool: Arc<ThreadPool>,
    error_handler: ErrorHandler,
}

impl DatasetWriter {
    pub fn new(config: DatasetWriterConfig, error_handler: ErrorHandler) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(LexiclassError::config("chunk size must be positive"));
        }

        let thread_pool_size = config.thread_pool_size.unwrap_or_else(num_cpus::get);
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(thread_pool_size)
            .thread_name(|i| format!("vectorize-{i}"))
            .build()
            .map_err(|e| LexiclassError::other(format!("Failed to create thread pool: {e}")))?;

        Ok(DatasetWriter {
            config,
            thread_pool: Arc::new(thread_pool),
            error_handler,
        })
    }

    /// Vectorize every record of `source` into `storage`.
    ///
    /// Records that fail to vectorize are reported and skipped. Returns the
    /// number of slots written.
    pub fn write(
        &self,
        source: &mut dyn RawRecordSource,
        vectorizer: &dyn FeatureVectorizer,
        storage: &dyn Storage,
    ) -> Result<usize> {
        let mut written = 0;
        let mut chunk: Vec<RawRecord> = Vec::with_capacity(self.config.chunk_size);

        while source.has_more_records() {
            let Some(record) = source.next_record()? else {
                break;
            };
            chunk.push(record);

            if chunk.len() == self.config.chunk_size {
                written = self.flush_chunk(&mut chunk, vectorizer, storage, written)?;
            }
        }
        written = self.flush_chunk(&mut chunk, vectorizer, storage, written)?;

        storage.sync()?;
        log::info!("wrote {written} vectorized records");
        Ok(written)
    }

    fn flush_chunk(
        &self,
        chunk: &mut Vec<RawRecord>,
        vectorizer: &dyn FeatureVectorizer,
        storage: &dyn Storage,
        next_index: usize,
    ) -> Result<usize> {
        if chunk.is_empty() {
            return Ok(next_index);
        }

        let results: Vec<_> = self
            .thread_pool
            .install(|| chunk.par_iter().map(|r| vectorizer.vectorize(r)).collect());
        chunk.clear();

        let mut vectorized = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(record) => vectorized.push(record),
                Err(e) => (self.error_handler)(&e),
            }
        }

        self.thread_pool.install(|| {
            vectorized
                .par_iter()
                .enumerate()
                .try_for_each(|(offset, record)| slot::write_slot(storage, next_index + offset, record))
        })?;

        let written = next_index + vectorized.len();
        log::debug!("processed {written} records");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::logging_error_handler;
    use crate::record::memory::MemoryRecordSource;
    use crate::storage::memory::MemoryStorage;
    use crate::vectorizer::{TfIdfConfig, TfIdfVectorizer};

    #[test]
    fn test_writes_slots_in_source_order() {
        let labels = vec!["x".to_string(), "y".to_string()];
        let rows: Vec<(String, &str)> = (0..10)
            .map(|i| (format!("token{i} shared"), if i % 2 == 0 { "x" } else { "y" }))
            .collect();
        let mut source = MemoryRecordSource::from_texts(labels.clone(), &rows);

        let mut vectorizer = TfIdfVectorizer::new(TfIdfConfig::default(), labels).unwrap();
        vectorizer.build_vocabulary(&mut source).unwrap();
        source.reset().unwrap();

        let config = DatasetWriterConfig {
            chunk_size: 3,
            thread_pool_size: Some(2),
        };
        let writer = DatasetWriter::new(config, logging_error_handler()).unwrap();
        let storage = MemoryStorage::new();

        assert_eq!(writer.write(&mut source, &vectorizer, &storage).unwrap(), 10);
        assert_eq!(slot::count_slots(&storage).unwrap(), 10);

        let fourth = slot::read_slot(&storage, 4).unwrap();
        let index = vectorizer.vocabulary().iter().position(|w| w.token == "token4").unwrap();
        assert!(fourth.features[index] > 0.0);
        assert_eq!(fourth.labels, vec![1.0, 0.0]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = DatasetWriterConfig {
            chunk_size: 0,
            thread_pool_size: Some(1),
        };
        assert!(DatasetWriter::new(config, logging_error_handler()).is_err());
    }
}
