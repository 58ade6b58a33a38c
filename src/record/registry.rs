//! Lookup of raw record source kinds by identifier.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{ErrorHandler, LexiclassError, Result, logging_error_handler};
use crate::record::RawRecordSource;
use crate::record::directory::DirectoryRecordSource;
use crate::record::jsonl::JsonlRecordSource;

/// Values every source receives besides its own configuration document.
#[derive(Clone)]
pub struct SourceContext {
    /// The run's label list.
    pub labels: Vec<String>,

    /// Callback for per-record failures.
    pub error_handler: ErrorHandler,
}

impl SourceContext {
    pub fn new(labels: Vec<String>, error_handler: ErrorHandler) -> Self {
        SourceContext {
            labels,
            error_handler,
        }
    }
}

impl std::fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceContext")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        SourceContext::new(Vec::new(), logging_error_handler())
    }
}

type SourceFactory =
    Box<dyn Fn(&Value, &SourceContext) -> Result<Box<dyn RawRecordSource>> + Send + Sync>;

/// Registry of raw record source factories.
///
/// `directory` and `jsonl` are registered by default.
pub struct RecordSourceRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl RecordSourceRegistry {
    pub fn new() -> Self {
        let mut registry = RecordSourceRegistry {
            factories: HashMap::new(),
        };

        registry.register("directory", |config, ctx| {
            Ok(Box::new(DirectoryRecordSource::from_config(config, ctx)?))
        });
        registry.register("jsonl", |config, ctx| {
            Ok(Box::new(JsonlRecordSource::from_config(config, ctx)?))
        });

        registry
    }

    /// Register (or replace) a source factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value, &SourceContext) -> Result<Box<dyn RawRecordSource>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Build a source by identifier.
    pub fn create(
        &self,
        name: &str,
        config: &Value,
        context: &SourceContext,
    ) -> Result<Box<dyn RawRecordSource>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            LexiclassError::config(format!("unknown record source '{name}'"))
        })?;
        factory(config, context)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for RecordSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
