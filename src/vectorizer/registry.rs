//! Lookup of vectorizer kinds by identifier.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{LexiclassError, Result};
use crate::vectorizer::tfidf::{self, TfIdfConfig, TfIdfVectorizer};
use crate::vectorizer::{FeatureVectorizer, VectorizerSnapshot};

/// Creates fresh vectorizers and restores persisted ones for one kind.
pub trait VectorizerFactory: Send + Sync {
    /// Build an empty vectorizer from its configuration document.
    fn create(&self, config: &Value, labels: &[String]) -> Result<Box<dyn FeatureVectorizer>>;

    /// Restore a vectorizer from a snapshot payload.
    fn restore(&self, payload: &[u8]) -> Result<Box<dyn FeatureVectorizer>>;
}

struct TfIdfFactory;

impl VectorizerFactory for TfIdfFactory {
    fn create(&self, config: &Value, labels: &[String]) -> Result<Box<dyn FeatureVectorizer>> {
        let config = TfIdfConfig::from_value(config)?;
        Ok(Box::new(TfIdfVectorizer::new(config, labels.to_vec())?))
    }

    fn restore(&self, payload: &[u8]) -> Result<Box<dyn FeatureVectorizer>> {
        Ok(Box::new(TfIdfVectorizer::restore(payload)?))
    }
}

/// Registry of vectorizer factories. `tfidf` is registered by default.
pub struct VectorizerRegistry {
    factories: HashMap<String, Box<dyn VectorizerFactory>>,
}

impl VectorizerRegistry {
    pub fn new() -> Self {
        let mut registry = VectorizerRegistry {
            factories: HashMap::new(),
        };

        registry.register(tfidf::KIND, Box::new(TfIdfFactory));

        registry
    }

    pub fn register(&mut self, name: &str, factory: Box<dyn VectorizerFactory>) {
        self.factories.insert(name.to_string(), factory);
    }

    fn factory(&self, name: &str) -> Result<&dyn VectorizerFactory> {
        self.factories
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| LexiclassError::config(format!("unknown input sequence '{name}'")))
    }

    pub fn create(
        &self,
        name: &str,
        config: &Value,
        labels: &[String],
    ) -> Result<Box<dyn FeatureVectorizer>> {
        self.factory(name)?.create(config, labels)
    }

    pub fn restore(&self, snapshot: &VectorizerSnapshot) -> Result<Box<dyn FeatureVectorizer>> {
        self.factory(&snapshot.kind)?.restore(&snapshot.payload)
    }
}

impl Default for VectorizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::memory::MemoryRecordSource;
    use std::io::Cursor;

    #[test]
    fn test_create_build_snapshot_restore() {
        let registry = VectorizerRegistry::new();
        let labels = vec!["a".to_string(), "b".to_string()];

        let mut vectorizer = registry
            .create("tfidf", &serde_json::json!({"word-min-characters": 2}), &labels)
            .unwrap();
        let mut source =
            MemoryRecordSource::from_texts(labels.clone(), &[("hello world", "a"), ("hi world", "b")]);
        vectorizer.build_vocabulary(&mut source).unwrap();
        assert_eq!(vectorizer.feature_count(), 3);

        let mut buffer = Vec::new();
        vectorizer.snapshot().unwrap().write_to(&mut buffer).unwrap();
        let snapshot = VectorizerSnapshot::read_from(&mut Cursor::new(buffer)).unwrap();

        let restored = registry.restore(&snapshot).unwrap();
        assert_eq!(restored.kind(), "tfidf");
        assert_eq!(restored.feature_count(), 3);
        assert_eq!(restored.labels(), labels.as_slice());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = VectorizerRegistry::new();
        let snapshot = VectorizerSnapshot {
            kind: "word2vec".to_string(),
            payload: Vec::new(),
        };
        assert!(matches!(
            registry.restore(&snapshot),
            Err(LexiclassError::Config(_))
        ));
    }
}
