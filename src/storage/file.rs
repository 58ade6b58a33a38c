//! Directory-backed storage.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{LexiclassError, Result};
use crate::storage::{Storage, StorageError, StorageInput, StorageOutput};

/// Configuration for [`FileStorage`].
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Buffer size for readers and writers.
    pub buffer_size: usize,

    /// Sync each file to disk when its output closes.
    pub sync_on_close: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        FileStorageConfig {
            buffer_size: 64 * 1024,
            sync_on_close: false,
        }
    }
}

/// One slot per file inside a single directory.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
    config: FileStorageConfig,
}

impl FileStorage {
    /// Open `directory`, creating it if missing.
    pub fn new<P: AsRef<Path>>(directory: P, config: FileStorageConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        std::fs::create_dir_all(&directory).map_err(|e| {
            LexiclassError::storage(format!("Failed to create {}: {e}", directory.display()))
        })?;
        if !directory.is_dir() {
            return Err(LexiclassError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    /// Root directory of this storage.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.directory.join(name)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::FileNotFound(name.to_string())
            } else {
                StorageError::IoError(e.to_string())
            }
        })?;

        Ok(Box::new(FileInput {
            reader: BufReader::with_capacity(self.config.buffer_size, file),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.directory.join(name))
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        Ok(Box::new(FileOutput {
            writer: BufWriter::with_capacity(self.config.buffer_size, file),
            sync_on_close: self.config.sync_on_close,
        }))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.directory.join(name)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(StorageError::IoError(format!("Failed to delete {name}: {e}")).into())
            }
            _ => Ok(()),
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in
            std::fs::read_dir(&self.directory).map_err(|e| StorageError::IoError(e.to_string()))?
        {
            let path = entry.map_err(|e| StorageError::IoError(e.to_string()))?.path();

            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                files.push(name.to_string());
            }
        }

        files.sort();
        Ok(files)
    }

    fn sync(&self) -> Result<()> {
        // Files are synced individually when their outputs close.
        Ok(())
    }
}

#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageInput for FileInput {}

#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
    sync_on_close: bool,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| LexiclassError::storage(format!("Failed to flush: {e}")))?;

        if self.sync_on_close {
            self.writer
                .get_ref()
                .sync_all()
                .map_err(|e| LexiclassError::storage(format!("Failed to sync: {e}")))?;
        }
        Ok(())
    }
}
