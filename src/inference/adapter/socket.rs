//! Raw TCP socket adapter.
//!
//! One exchange per connection: the client sends the model id on the first
//! line, then the payload, then half-closes its write side. The adapter
//! answers with one JSON envelope line and closes the connection.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use serde::Deserialize;

use crate::error::{ErrorHandler, LexiclassError, Result};
use crate::inference::adapter::{
    AdapterProperties, InFlight, InFlightGuard, TransportAdapter, bind_address, connectable,
    default_port, default_shutdown_delay, default_thread_pool,
};
use crate::inference::result::Envelope;
use crate::inference::server::InferenceService;

pub const KIND: &str = "socket";

/// Properties understood by [`SocketAdapter`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SocketSettings {
    /// Interface to bind; blank for all.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Worker threads; `0` spawns a thread per connection.
    #[serde(default = "default_thread_pool")]
    pub thread_pool: usize,

    /// Milliseconds to wait for in-flight connections on dispose.
    #[serde(default = "default_shutdown_delay")]
    pub max_shutdown_delay: u64,
}

struct Running {
    local_addr: SocketAddr,
    stopped: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    in_flight: InFlight,
    shutdown_delay: Duration,
}

/// Serves inference over plain TCP.
#[derive(Default)]
pub struct SocketAdapter {
    running: Option<Running>,
}

impl SocketAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

type Connection = (TcpStream, InFlightGuard);

#[derive(Clone)]
struct Handler {
    service: Arc<dyn InferenceService>,
    error_handler: ErrorHandler,
    in_flight: InFlight,
}

impl Handler {
    fn process(&self, stream: TcpStream, _guard: InFlightGuard) {
        if let Err(e) = self.exchange(stream) {
            (self.error_handler)(&e);
        }
    }

    fn exchange(&self, stream: TcpStream) -> Result<()> {
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);

        // Read failures are answered like serving failures.
        let outcome = read_request(&mut reader)
            .and_then(|(model_id, payload)| self.service.infer(&model_id, &payload));
        if let Err(e) = &outcome {
            log::debug!("socket request failed: {e}");
        }

        let envelope = Envelope::from(outcome);
        writer.write_all(envelope.to_json().as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

/// Model id line, decoded lossily, followed by the raw payload.
fn read_request<R: BufRead>(reader: &mut R) -> Result<(String, Vec<u8>)> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    let model_id = String::from_utf8_lossy(&line)
        .trim_end_matches(['\r', '\n'])
        .to_string();

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    Ok((model_id, payload))
}

fn accept_loop(
    listener: TcpListener,
    stopped: Arc<AtomicBool>,
    handler: Handler,
    sender: Option<Sender<Connection>>,
) {
    for stream in listener.incoming() {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => match &sender {
                Some(sender) => {
                    if sender.send((stream, handler.in_flight.enter())).is_err() {
                        break;
                    }
                }
                None => {
                    let connection = handler.clone();
                    let guard = handler.in_flight.enter();
                    let spawned = thread::Builder::new()
                        .name("socket-connection".to_string())
                        .spawn(move || connection.process(stream, guard));
                    if let Err(e) = spawned {
                        (handler.error_handler)(&LexiclassError::transport(format!(
                            "cannot spawn connection thread: {e}"
                        )));
                    }
                }
            },
            Err(e) => (handler.error_handler)(&LexiclassError::transport(format!(
                "accept failed: {e}"
            ))),
        }
    }
    log::debug!("socket accept loop stopped");
}

impl TransportAdapter for SocketAdapter {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn initialise(
        &mut self,
        properties: &AdapterProperties,
        service: Arc<dyn InferenceService>,
        error_handler: ErrorHandler,
    ) -> Result<()> {
        if self.running.is_some() {
            return Err(LexiclassError::transport("socket adapter already initialised"));
        }

        let settings: SocketSettings = properties.settings()?;
        let listener = TcpListener::bind(bind_address(&settings.host, settings.port)?)
            .map_err(|e| LexiclassError::transport(format!("cannot bind socket adapter: {e}")))?;
        let local_addr = listener.local_addr()?;

        let in_flight = InFlight::new();
        let handler = Handler {
            service,
            error_handler,
            in_flight: in_flight.clone(),
        };

        let mut workers = Vec::new();
        let sender = if settings.thread_pool > 0 {
            let (sender, receiver) = unbounded::<Connection>();
            for i in 0..settings.thread_pool {
                let receiver = receiver.clone();
                let handler = handler.clone();
                let worker = thread::Builder::new()
                    .name(format!("socket-worker-{i}"))
                    .spawn(move || {
                        for (stream, guard) in receiver {
                            handler.process(stream, guard);
                        }
                    })?;
                workers.push(worker);
            }
            Some(sender)
        } else {
            None
        };

        let stopped = Arc::new(AtomicBool::new(false));
        let accept_stopped = stopped.clone();
        let accept_thread = thread::Builder::new()
            .name("socket-accept".to_string())
            .spawn(move || accept_loop(listener, accept_stopped, handler, sender))?;

        log::info!("socket adapter listening on {local_addr}");
        self.running = Some(Running {
            local_addr,
            stopped,
            accept_thread: Some(accept_thread),
            workers,
            in_flight,
            shutdown_delay: Duration::from_millis(settings.max_shutdown_delay),
        });
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    fn dispose(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };

        running.stopped.store(true, Ordering::SeqCst);
        // Wake the blocking accept call.
        let _ = TcpStream::connect_timeout(&connectable(running.local_addr), Duration::from_secs(1));
        if let Some(accept_thread) = running.accept_thread.take()
            && accept_thread.join().is_err()
        {
            log::warn!("socket accept thread panicked");
        }

        if running.in_flight.wait_idle(running.shutdown_delay) {
            for worker in running.workers {
                let _ = worker.join();
            }
        } else {
            log::warn!(
                "socket adapter stopped with {} connections still in flight",
                running.in_flight.count()
            );
        }

        log::info!("socket adapter on {} disposed", running.local_addr);
        Ok(())
    }
}

impl Drop for SocketAdapter {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::result::InferenceResult;
    use serde_json::Value;

    struct Echo;

    impl InferenceService for Echo {
        fn infer(&self, model_id: &str, payload: &[u8]) -> Result<InferenceResult> {
            if model_id != "echo" {
                return Err(LexiclassError::model_not_found(model_id));
            }
            InferenceResult::from_scores(&["len".to_string()], &[payload.len() as f64])
        }
    }

    fn start(thread_pool: usize) -> SocketAdapter {
        let mut adapter = SocketAdapter::new();
        let properties = AdapterProperties::default()
            .with("host", "127.0.0.1")
            .with("port", 0)
            .with("thread-pool", thread_pool);
        adapter
            .initialise(&properties, Arc::new(Echo), crate::error::logging_error_handler())
            .unwrap();
        adapter
    }

    fn exchange(addr: SocketAddr, request: &[u8]) -> Value {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        assert!(response.ends_with('\n'));
        serde_json::from_str(response.trim_end()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        for pool in [0, 2] {
            let mut adapter = start(pool);
            let addr = adapter.local_addr().unwrap();

            let value = exchange(addr, b"echo\nhello\nworld");
            assert_eq!(value["success"], true);
            assert_eq!(value["result"]["highest-confidence"], 11.0);

            let value = exchange(addr, b"missing\r\nx");
            assert_eq!(value["success"], false);
            assert_eq!(value["exception"], "ModelNotFound: missing");

            adapter.dispose().unwrap();
            adapter.dispose().unwrap();
            assert!(adapter.local_addr().is_none());
        }
    }

    #[test]
    fn test_undecodable_model_id_gets_envelope() {
        let mut adapter = start(1);
        let addr = adapter.local_addr().unwrap();

        let value = exchange(addr, b"mod\xffel\npayload");
        assert_eq!(value["success"], false);
        assert_eq!(value["exception"], "ModelNotFound: mod\u{FFFD}el");

        let value = exchange(addr, b"");
        assert_eq!(value["success"], false);
        assert_eq!(value["exception"], "ModelNotFound: ");

        adapter.dispose().unwrap();
    }

    #[test]
    fn test_read_request_splits_id_and_payload() {
        let mut input: &[u8] = b"ech\xc3o\r\nline one\nline two";
        let (model_id, payload) = read_request(&mut input).unwrap();

        assert_eq!(model_id, "ech\u{FFFD}o");
        assert_eq!(payload, b"line one\nline two");
    }
}
