//! Server configuration document.
//!
//! ```json
//! {
//!   "models": [{"id": "news", "file": "models/news.bin"}],
//!   "api-adapters": [
//!     {"kind": "http", "properties": {"port": 2901, "cors-allowed": true}},
//!     {"kind": "socket", "properties-file": "socket.json"}
//!   ]
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LexiclassError, Result};
use crate::inference::adapter::AdapterProperties;

/// A model bundle served under `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub file: PathBuf,
}

/// A transport adapter to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdapterEntry {
    pub kind: String,

    /// JSON object with the adapter's properties.
    #[serde(default)]
    pub properties_file: Option<PathBuf>,

    /// Inline properties; these override keys from `properties-file`.
    #[serde(default)]
    pub properties: Value,
}

impl AdapterEntry {
    pub fn properties(&self) -> Result<AdapterProperties> {
        let mut properties = match &self.properties_file {
            Some(path) => AdapterProperties::from_file(path)?,
            None => AdapterProperties::default(),
        };
        if !self.properties.is_null() {
            properties.merge(&AdapterProperties::from_value(self.properties.clone())?);
        }
        Ok(properties)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    pub models: Vec<ModelEntry>,

    #[serde(default)]
    pub api_adapters: Vec<AdapterEntry>,
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LexiclassError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_json(&json)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make relative bundle and properties paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for model in &mut self.models {
            if model.file.is_relative() {
                model.file = base.join(&model.file);
            }
        }
        for adapter in &mut self.api_adapters {
            if let Some(file) = adapter.properties_file.as_mut()
                && file.is_relative()
            {
                *file = base.join(&*file);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (i, model) in self.models.iter().enumerate() {
            if model.id.trim().is_empty() {
                return Err(LexiclassError::config("model id must not be blank"));
            }
            if self.models[..i].iter().any(|m| m.id == model.id) {
                return Err(LexiclassError::config(format!(
                    "duplicate model id '{}'",
                    model.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_and_resolve() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("socket.json"), r#"{"port": 4000, "thread-pool": 2}"#)
            .unwrap();
        let path = temp.path().join("server.json");
        std::fs::write(
            &path,
            r#"{
                "models": [{"id": "news", "file": "news.bin"}],
                "api-adapters": [
                    {"kind": "socket", "properties-file": "socket.json", "properties": {"port": 4001}}
                ]
            }"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.models[0].file, temp.path().join("news.bin"));

        let properties = config.api_adapters[0].properties().unwrap();
        assert_eq!(properties.get("port"), Some(&serde_json::json!(4001)));
        assert_eq!(properties.get("thread-pool"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = ServerConfig::from_json(
            r#"{"models": [{"id": "a", "file": "x"}, {"id": "a", "file": "y"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LexiclassError::Config(_)));
    }
}
