//! Transport adapters.
//!
//! An adapter exposes an [`InferenceService`] over some wire protocol. Each
//! one reads a model id and a payload from its own framing, calls
//! [`InferenceService::infer`] and writes back the JSON [`Envelope`].
//!
//! [`Envelope`]: crate::inference::Envelope

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ErrorHandler, LexiclassError, Result};
use crate::inference::server::InferenceService;

pub mod http;
pub mod registry;
pub mod socket;

pub use http::{HttpAdapter, HttpSettings};
pub use registry::AdapterRegistry;
pub use socket::{SocketAdapter, SocketSettings};

/// Default port of both built-in adapters.
pub const DEFAULT_PORT: u16 = 2901;

/// Lifecycle of a transport adapter.
pub trait TransportAdapter: Send {
    /// Registry identifier of this adapter kind.
    fn kind(&self) -> &'static str;

    /// Bind and start serving.
    fn initialise(
        &mut self,
        properties: &AdapterProperties,
        service: Arc<dyn InferenceService>,
        error_handler: ErrorHandler,
    ) -> Result<()>;

    /// Bound address once initialised.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Stop accepting and wait for in-flight requests up to the configured
    /// maximum delay. Calling it again does nothing.
    fn dispose(&mut self) -> Result<()>;
}

/// Flat key/value settings of one adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterProperties {
    values: Map<String, Value>,
}

impl AdapterProperties {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(values) => Ok(AdapterProperties { values }),
            other => Err(LexiclassError::config(format!(
                "adapter properties must be an object, got {other}"
            ))),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LexiclassError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_value(serde_json::from_str(&json)?)
    }

    /// Set a property, replacing any previous value.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Copy every key of `other` over this one.
    pub fn merge(&mut self, other: &AdapterProperties) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserialize into an adapter's typed settings.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| LexiclassError::config(format!("invalid adapter properties: {e}")))
    }
}

struct InFlightState {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Counts requests being processed so shutdown can wait for them.
#[derive(Clone)]
pub struct InFlight {
    state: Arc<InFlightState>,
}

/// Marks one request in flight until dropped.
pub struct InFlightGuard {
    state: Arc<InFlightState>,
}

impl Default for InFlight {
    fn default() -> Self {
        InFlight {
            state: Arc::new(InFlightState {
                count: Mutex::new(0),
                idle: Condvar::new(),
            }),
        }
    }
}

impl std::fmt::Debug for InFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight").field("count", &self.count()).finish()
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> InFlightGuard {
        *self.state.count.lock() += 1;
        InFlightGuard {
            state: self.state.clone(),
        }
    }

    pub fn count(&self) -> usize {
        *self.state.count.lock()
    }

    /// Wait until nothing is in flight. Returns false if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.state.count.lock();
        while *count > 0 {
            if self.state.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.state.count.lock();
        *count -= 1;
        if *count == 0 {
            self.state.idle.notify_all();
        }
    }
}

/// Worker pool size: `0` means one thread per request.
pub(crate) fn default_thread_pool() -> usize {
    10
}

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_shutdown_delay() -> u64 {
    10_000
}

/// Resolve the `host`/`port` pair; a blank host binds every interface.
pub(crate) fn bind_address(host: &str, port: u16) -> Result<SocketAddr> {
    use std::net::ToSocketAddrs;

    let host = if host.trim().is_empty() { "0.0.0.0" } else { host.trim() };
    (host, port)
        .to_socket_addrs()
        .map_err(|e| LexiclassError::config(format!("cannot resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| LexiclassError::config(format!("no address for {host}:{port}")))
}

/// Address a local client can use to reach a listener bound to `addr`.
pub(crate) fn connectable(addr: SocketAddr) -> SocketAddr {
    let mut addr = addr;
    if addr.ip().is_unspecified() {
        let loopback: std::net::IpAddr = if addr.is_ipv4() {
            std::net::Ipv4Addr::LOCALHOST.into()
        } else {
            std::net::Ipv6Addr::LOCALHOST.into()
        };
        addr.set_ip(loopback);
    }
    addr
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_properties_merge_and_settings() {
        #[derive(Deserialize)]
        #[serde(rename_all = "kebab-case")]
        struct Settings {
            port: u16,
            #[serde(default)]
            cors_allowed: bool,
        }

        let mut properties = AdapterProperties::from_value(json!({"port": 1, "cors-allowed": true})).unwrap();
        properties.merge(&AdapterProperties::default().with("port", 2));

        let settings: Settings = properties.settings().unwrap();
        assert_eq!(settings.port, 2);
        assert!(settings.cors_allowed);

        assert!(AdapterProperties::from_value(json!([1])).is_err());
        assert!(AdapterProperties::default().with("port", "x").settings::<Settings>().is_err());
    }

    #[test]
    fn test_in_flight_wait() {
        let in_flight = InFlight::new();
        assert!(in_flight.wait_idle(Duration::from_millis(1)));

        let guard = in_flight.enter();
        assert_eq!(in_flight.count(), 1);
        assert!(!in_flight.wait_idle(Duration::from_millis(10)));

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(guard);
        });
        assert!(in_flight.wait_idle(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_bind_address() {
        let addr = bind_address("", 0).unwrap();
        assert!(addr.ip().is_unspecified());
        assert!(connectable(addr).ip().is_loopback());
        assert_eq!(bind_address("127.0.0.1", 80).unwrap().port(), 80);
    }
}
