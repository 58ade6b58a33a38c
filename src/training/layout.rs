//! Temp directory layout of a training run.
//!
//! ```text
//! <temp>/model/    model scratch (checkpoints)
//! <temp>/data/t/   training slots
//! <temp>/data/e/   evaluation slots
//! <temp>/data/i    vectorizer snapshot
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LexiclassError, Result};
use crate::storage::Storage;
use crate::storage::file::{FileStorage, FileStorageConfig};
use crate::vectorizer::VectorizerSnapshot;

#[derive(Debug, Clone)]
pub struct TempLayout {
    root: PathBuf,
}

impl TempLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        TempLayout {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join("model")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn training_dir(&self) -> PathBuf {
        self.data_dir().join("t")
    }

    pub fn evaluation_dir(&self) -> PathBuf {
        self.data_dir().join("e")
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.data_dir().join("i")
    }

    /// Create the model scratch directory if missing.
    pub fn prepare_model_dir(&self) -> Result<PathBuf> {
        let dir = self.model_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Delete any previous data directory and create empty slot directories.
    pub fn recreate_data_dir(&self) -> Result<()> {
        let dir = self.data_dir();
        if dir.exists() {
            log::debug!("removing {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(self.training_dir())?;
        fs::create_dir_all(self.evaluation_dir())?;
        Ok(())
    }

    /// Whether a previous run left a complete data directory behind.
    pub fn has_cached_data(&self) -> bool {
        self.snapshot_file().is_file() && self.training_dir().is_dir() && self.evaluation_dir().is_dir()
    }

    pub fn training_storage(&self) -> Result<Arc<dyn Storage>> {
        open_storage(self.training_dir())
    }

    pub fn evaluation_storage(&self) -> Result<Arc<dyn Storage>> {
        open_storage(self.evaluation_dir())
    }

    pub fn write_snapshot(&self, snapshot: &VectorizerSnapshot) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.snapshot_file())?);
        snapshot.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_snapshot(&self) -> Result<VectorizerSnapshot> {
        let path = self.snapshot_file();
        let file = File::open(&path).map_err(|e| {
            LexiclassError::config(format!(
                "no cached vectorizer at {}: {e}",
                path.display()
            ))
        })?;
        VectorizerSnapshot::read_from(&mut BufReader::new(file))
    }
}

fn open_storage(dir: PathBuf) -> Result<Arc<dyn Storage>> {
    Ok(Arc::new(FileStorage::new(dir, FileStorageConfig::default())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recreate_clears_previous_run() {
        let temp = TempDir::new().unwrap();
        let layout = TempLayout::new(temp.path());

        layout.recreate_data_dir().unwrap();
        fs::write(layout.training_dir().join("0"), b"stale").unwrap();
        assert!(!layout.has_cached_data());

        layout
            .write_snapshot(&VectorizerSnapshot {
                kind: "tfidf".to_string(),
                payload: vec![1, 2, 3],
            })
            .unwrap();
        assert!(layout.has_cached_data());
        assert_eq!(layout.read_snapshot().unwrap().payload, vec![1, 2, 3]);

        layout.recreate_data_dir().unwrap();
        assert!(!layout.training_dir().join("0").exists());
        assert!(layout.evaluation_dir().is_dir());
        assert!(!layout.has_cached_data());
    }

    #[test]
    fn test_model_dir() {
        let temp = TempDir::new().unwrap();
        let layout = TempLayout::new(temp.path());
        let dir = layout.prepare_model_dir().unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, temp.path().join("model"));
    }
}
