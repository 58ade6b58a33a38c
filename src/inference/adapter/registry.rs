//! Lookup of transport adapter kinds.

use std::collections::HashMap;

use crate::error::{LexiclassError, Result};
use crate::inference::adapter::{HttpAdapter, SocketAdapter, TransportAdapter, http, socket};

type AdapterFactory = Box<dyn Fn() -> Box<dyn TransportAdapter> + Send + Sync>;

/// Registry of adapter factories. `http` and `socket` are registered by default.
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let mut registry = AdapterRegistry {
            factories: HashMap::new(),
        };

        registry.register(http::KIND, || Box::new(HttpAdapter::new()));
        registry.register(socket::KIND, || Box::new(SocketAdapter::new()));

        registry
    }

    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn() -> Box<dyn TransportAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    /// A fresh, uninitialised adapter of `kind`.
    pub fn create(&self, kind: &str) -> Result<Box<dyn TransportAdapter>> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| LexiclassError::config(format!("unknown api adapter '{kind}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
