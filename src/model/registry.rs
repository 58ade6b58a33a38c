//! Lookup of model builders by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{LexiclassError, Result};
use crate::model::ModelBuilder;
use crate::model::linear::SoftmaxRegressionBuilder;

/// Registry of model builders. `softmax-regression` is registered by default.
#[derive(Clone)]
pub struct ModelRegistry {
    builders: HashMap<String, Arc<dyn ModelBuilder>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        let mut registry = ModelRegistry {
            builders: HashMap::new(),
        };

        registry.register(Arc::new(SoftmaxRegressionBuilder));

        registry
    }

    /// Register a builder under its own name.
    pub fn register(&mut self, builder: Arc<dyn ModelBuilder>) {
        self.builders.insert(builder.name().to_string(), builder);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ModelBuilder>> {
        self.builders
            .get(name)
            .cloned()
            .ok_or_else(|| LexiclassError::config(format!("unknown model builder '{name}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let registry = ModelRegistry::new();
        assert_eq!(registry.names(), vec!["softmax-regression"]);
        assert!(registry.get("softmax-regression").is_ok());
        assert!(matches!(
            registry.get("multi-layer-network"),
            Err(LexiclassError::Config(_))
        ));
    }
}
