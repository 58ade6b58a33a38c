//! Serving trained models.
//!
//! The [`InferenceServer`] holds loaded model bundles by id and implements
//! the single [`InferenceService::infer`] capability. Transport adapters
//! (HTTP and raw socket by default) expose that capability on the network
//! and an [`InferenceHost`] ties a [`ServerConfig`] to a running set of
//! adapters.

pub mod adapter;
pub mod config;
pub mod fair_lock;
pub mod host;
pub mod result;
pub mod server;

pub use adapter::{AdapterProperties, AdapterRegistry, TransportAdapter};
pub use config::{AdapterEntry, ModelEntry, ServerConfig};
pub use fair_lock::FairLock;
pub use host::InferenceHost;
pub use result::{Envelope, InferenceResult};
pub use server::{InferenceServer, InferenceService};
