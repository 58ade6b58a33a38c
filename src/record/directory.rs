//! Records laid out as `<directory>/<label>/<file>`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ErrorHandler, LexiclassError, Result};
use crate::record::{RawRecord, RawRecordSource, SourceContext};

/// Configuration for [`DirectoryRecordSource`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectorySourceConfig {
    /// Root directory holding one sub-directory per label.
    pub directory: PathBuf,

    /// Optional file listing labels one per line; defaults to the run's labels.
    #[serde(default)]
    pub labels_file: Option<PathBuf>,
}

/// Walks each label's sub-directory in label order, files sorted by name,
/// emitting every file with a one-hot label vector.
pub struct DirectoryRecordSource {
    directory: PathBuf,
    labels: Vec<String>,
    entries: Vec<(PathBuf, usize)>,
    cursor: usize,
    error_handler: ErrorHandler,
}

impl DirectoryRecordSource {
    pub fn new<P: AsRef<Path>>(
        directory: P,
        labels: Vec<String>,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(LexiclassError::config(format!(
                "record directory does not exist: {}",
                directory.display()
            )));
        }

        let mut source = DirectoryRecordSource {
            directory,
            labels,
            entries: Vec::new(),
            cursor: 0,
            error_handler,
        };
        source.reset()?;
        Ok(source)
    }

    pub fn from_config(config: &Value, context: &SourceContext) -> Result<Self> {
        let config: DirectorySourceConfig = serde_json::from_value(config.clone())?;

        let labels = match &config.labels_file {
            Some(path) => read_labels_file(path)?,
            None => context.labels.clone(),
        };
        if labels.is_empty() {
            return Err(LexiclassError::config("directory source has no labels"));
        }

        Self::new(&config.directory, labels, context.error_handler.clone())
    }

    fn scan(&self) -> Vec<(PathBuf, usize)> {
        let mut entries = Vec::new();

        for (index, label) in self.labels.iter().enumerate() {
            let label_dir = self.directory.join(label);
            let listing = match fs::read_dir(&label_dir) {
                Ok(listing) => listing,
                Err(e) => {
                    (self.error_handler)(&LexiclassError::data(format!(
                        "cannot list {}: {e}",
                        label_dir.display()
                    )));
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = listing
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file())
                .collect();
            files.sort();

            entries.extend(files.into_iter().map(|path| (path, index)));
        }

        entries
    }
}

/// Read a labels file: one label per line, blank lines ignored.
pub fn read_labels_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        LexiclassError::config(format!("cannot read labels file {}: {e}", path.display()))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

impl RawRecordSource for DirectoryRecordSource {
    fn reset(&mut self) -> Result<()> {
        self.entries = self.scan();
        self.cursor = 0;
        log::debug!(
            "directory source {} holds {} records",
            self.directory.display(),
            self.entries.len()
        );
        Ok(())
    }

    fn has_more_records(&self) -> bool {
        self.cursor < self.entries.len()
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        while let Some((path, label_index)) = self.entries.get(self.cursor) {
            self.cursor += 1;

            match fs::read(path) {
                Ok(data) => {
                    return Ok(Some(RawRecord::one_hot(
                        data,
                        *label_index,
                        self.labels.len(),
                    )));
                }
                Err(e) => (self.error_handler)(&LexiclassError::data(format!(
                    "cannot read {}: {e}",
                    path.display()
                ))),
            }
        }

        Ok(None)
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::logging_error_handler;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("sport")).unwrap();
        fs::create_dir_all(root.join("politics")).unwrap();
        fs::write(root.join("sport/b.txt"), "goal scored").unwrap();
        fs::write(root.join("sport/a.txt"), "match report").unwrap();
        fs::write(root.join("politics/x.txt"), "election night").unwrap();
    }

    #[test]
    fn test_walks_labels_in_order() {
        let temp_dir = TempDir::new().unwrap();
        write_tree(temp_dir.path());

        let labels = vec!["sport".to_string(), "politics".to_string()];
        let mut source =
            DirectoryRecordSource::new(temp_dir.path(), labels, logging_error_handler()).unwrap();

        let mut texts = Vec::new();
        while let Some(record) = source.next_record().unwrap() {
            texts.push((record.text().to_string(), record.labels));
        }

        assert_eq!(
            texts,
            vec![
                ("match report".to_string(), vec![1.0, 0.0]),
                ("goal scored".to_string(), vec![1.0, 0.0]),
                ("election night".to_string(), vec![0.0, 1.0]),
            ]
        );

        source.reset().unwrap();
        assert!(source.has_more_records());
    }

    #[test]
    fn test_missing_label_directory_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        write_tree(temp_dir.path());

        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        let handler: ErrorHandler = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let labels = vec!["weather".to_string(), "sport".to_string()];
        let mut source = DirectoryRecordSource::new(temp_dir.path(), labels, handler).unwrap();

        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.labels, vec![0.0, 1.0]);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_with_labels_file() {
        let temp_dir = TempDir::new().unwrap();
        write_tree(temp_dir.path());
        let labels_file = temp_dir.path().join("labels.txt");
        fs::write(&labels_file, "politics\n\nsport\n").unwrap();

        let config = serde_json::json!({
            "directory": temp_dir.path(),
            "labels-file": labels_file,
        });
        let source =
            DirectoryRecordSource::from_config(&config, &SourceContext::default()).unwrap();

        assert_eq!(source.labels(), &["politics".to_string(), "sport".to_string()]);
    }
}
