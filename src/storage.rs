//! Storage abstraction for vectorized record slots.
//!
//! Vectorized records are written once, one slot per record, and re-read in
//! arbitrary order on every epoch. The [`Storage`] trait lets the batch
//! provider run the same way against a directory on disk or an in-memory
//! map used by tests.
//!
//! # Example
//!
//! ```
//! use lexiclass::storage::Storage;
//! use lexiclass::storage::memory::MemoryStorage;
//! use std::io::{Read, Write};
//!
//! # fn main() -> lexiclass::error::Result<()> {
//! let storage = MemoryStorage::new();
//!
//! let mut output = storage.create_output("0")?;
//! output.write_all(b"slot")?;
//! output.close()?;
//!
//! let mut input = storage.open_input("0")?;
//! let mut buffer = Vec::new();
//! input.read_to_end(&mut buffer)?;
//! assert_eq!(buffer, b"slot");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};

use crate::error::{LexiclassError, Result};

pub mod file;
pub mod memory;

/// A storage backend holding named byte blobs.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing.
    ///
    /// Contents become visible to readers once the output is closed.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Delete a file. Deleting a missing file is not an error.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all file names, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Flush any pending state to the backing medium.
    fn sync(&self) -> Result<()>;
}

/// A readable handle on one stored file.
pub trait StorageInput: Read + Send + std::fmt::Debug {}

/// A writable handle on one stored file.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush and release the output.
    fn close(&mut self) -> Result<()>;
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    FileNotFound(String),

    IoError(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for LexiclassError {
    fn from(err: StorageError) -> Self {
        LexiclassError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("7".to_string());
        assert_eq!(err.to_string(), "File not found: 7");

        let converted: LexiclassError = StorageError::IoError("disk full".to_string()).into();
        assert_eq!(converted.to_string(), "Storage error: I/O error: disk full");
        assert_eq!(converted.kind(), "StorageError");
    }
}
