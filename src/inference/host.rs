//! A running inference deployment: loaded models plus started adapters.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{ErrorHandler, Result};
use crate::inference::adapter::{AdapterRegistry, TransportAdapter};
use crate::inference::config::ServerConfig;
use crate::inference::server::{InferenceServer, InferenceService};
use crate::model::ModelRegistry;
use crate::vectorizer::VectorizerRegistry;

pub struct InferenceHost {
    server: Arc<InferenceServer>,
    adapters: Vec<Box<dyn TransportAdapter>>,
}

impl std::fmt::Debug for InferenceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceHost")
            .field("server", &self.server)
            .field("adapters", &self.local_addrs())
            .finish()
    }
}

impl InferenceHost {
    /// Load every model, then initialise every adapter. If an adapter fails
    /// to start, the ones already started are disposed.
    pub fn start(
        config: &ServerConfig,
        models: &ModelRegistry,
        vectorizers: &VectorizerRegistry,
        adapters: &AdapterRegistry,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let server = Arc::new(InferenceServer::load(&config.models, models, vectorizers)?);
        Self::serve(server, config, adapters, error_handler)
    }

    /// Start the configured adapters in front of an existing server.
    pub fn serve(
        server: Arc<InferenceServer>,
        config: &ServerConfig,
        adapters: &AdapterRegistry,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let mut host = InferenceHost {
            server,
            adapters: Vec::with_capacity(config.api_adapters.len()),
        };

        for entry in &config.api_adapters {
            let started = entry.properties().and_then(|properties| {
                let mut adapter = adapters.create(&entry.kind)?;
                let service: Arc<dyn InferenceService> = host.server.clone();
                adapter.initialise(&properties, service, error_handler.clone())?;
                Ok(adapter)
            });
            match started {
                Ok(adapter) => host.adapters.push(adapter),
                Err(e) => {
                    host.dispose()?;
                    return Err(e);
                }
            }
        }

        if host.adapters.is_empty() {
            log::warn!("no api adapters configured");
        }
        Ok(host)
    }

    pub fn server(&self) -> &Arc<InferenceServer> {
        &self.server
    }

    /// Bound address of each started adapter, by kind.
    pub fn local_addrs(&self) -> Vec<(&'static str, SocketAddr)> {
        self.adapters
            .iter()
            .filter_map(|adapter| adapter.local_addr().map(|addr| (adapter.kind(), addr)))
            .collect()
    }

    /// Dispose every adapter. All are attempted; the first failure is returned.
    pub fn dispose(&mut self) -> Result<()> {
        let mut first_error = None;
        for mut adapter in self.adapters.drain(..) {
            if let Err(e) = adapter.dispose() {
                log::error!("failed to dispose {} adapter: {e}", adapter.kind());
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for InferenceHost {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}
