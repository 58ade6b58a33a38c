//! On-disk vectorized datasets.
//!
//! A dataset is a [`Storage`](crate::storage::Storage) holding one slot per
//! vectorized record, named by the record's decimal index `0..N-1`. The
//! [`DatasetWriter`] fills a dataset from a raw record source and the
//! [`BatchRecordProvider`] streams it back in shuffled batches.

pub mod provider;
pub mod slot;
pub mod writer;

pub use provider::{BatchRecordProvider, ProviderState};
pub use writer::{DatasetWriter, DatasetWriterConfig};
