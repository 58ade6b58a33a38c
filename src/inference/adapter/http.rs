//! HTTP/1.1 adapter.
//!
//! Serves a single endpoint, `/infer`. The model id travels in the
//! `dnn-model-id` header and the request body is the payload. Every
//! inference answer is `200` with the JSON envelope; protocol problems get
//! a bare status code. Connections carry one request each.
//!
//! The adapter runs on its own multi-threaded tokio runtime and calls the
//! inference service on the runtime's blocking pool.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::watch;

use crate::error::{ErrorHandler, LexiclassError, Result};
use crate::inference::adapter::{
    AdapterProperties, InFlight, TransportAdapter, bind_address, default_port,
    default_shutdown_delay, default_thread_pool,
};
use crate::inference::result::Envelope;
use crate::inference::server::InferenceService;

pub const KIND: &str = "http";

pub const ENDPOINT: &str = "/infer";
pub const MODEL_ID_HEADER: &str = "dnn-model-id";

const MAX_LINE: usize = 8 * 1024;
const MAX_HEADERS: usize = 100;
const MAX_BODY: usize = 64 << 20;

fn default_backlog() -> u32 {
    100
}

/// Properties understood by [`HttpAdapter`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpSettings {
    /// Interface to bind; blank for all.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Upper bound of concurrent inference calls; `0` leaves tokio's default.
    #[serde(default = "default_thread_pool")]
    pub thread_pool: usize,

    /// Milliseconds to wait for in-flight requests on dispose.
    #[serde(default = "default_shutdown_delay")]
    pub max_shutdown_delay: u64,

    #[serde(default)]
    pub cors_allowed: bool,

    /// Value of `Access-Control-Allow-Origin`.
    #[serde(default)]
    pub cors_allowed_hosts: String,

    /// Value of `Access-Control-Allow-Headers`.
    #[serde(default)]
    pub cors_allowed_headers: String,
}

#[derive(Debug, Clone)]
struct Cors {
    hosts: String,
    headers: String,
}

struct Running {
    local_addr: SocketAddr,
    runtime: Runtime,
    shutdown: watch::Sender<bool>,
    in_flight: InFlight,
    shutdown_delay: Duration,
}

/// Serves inference over HTTP.
///
/// [`dispose`](TransportAdapter::dispose) shuts the runtime down and must be
/// called from outside any tokio runtime.
#[derive(Default)]
pub struct HttpAdapter {
    running: Option<Running>,
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
struct Response {
    status: u16,
    body: Vec<u8>,
}

impl Response {
    fn status(status: u16) -> Self {
        Response {
            status,
            body: Vec::new(),
        }
    }

    fn json(envelope: &Envelope) -> Self {
        Response {
            status: 200,
            body: envelope.to_json().into_bytes(),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

fn malformed(msg: &str) -> LexiclassError {
    LexiclassError::transport(format!("malformed HTTP request: {msg}"))
}

/// Read one CRLF- or LF-terminated line. `None` at a clean end of stream.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if !buf.ends_with(b"\n") {
        return Err(malformed(if buf.len() > MAX_LINE {
            "line too long"
        } else {
            "unexpected end of stream"
        }));
    }
    buf.pop();
    if buf.ends_with(b"\r") {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| malformed("non UTF-8 header"))
}

async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Request>> {
    let Some(line) = read_line(reader).await? else {
        return Ok(None);
    };
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("bad request line"));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(malformed("unsupported HTTP version"));
    }

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)
            .await?
            .ok_or_else(|| malformed("unexpected end of headers"))?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            return Err(malformed("too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| malformed("bad header line"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let path = target.split('?').next().unwrap_or(target).to_string();
    Ok(Some(Request {
        method: method.to_string(),
        path,
        headers,
        body: Vec::new(),
    }))
}

async fn read_chunked<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line = read_line(reader)
            .await?
            .ok_or_else(|| malformed("unexpected end of chunked body"))?;
        let size = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size, 16).map_err(|_| malformed("bad chunk size"))?;

        if size == 0 {
            // Trailer section.
            while let Some(line) = read_line(reader).await? {
                if line.is_empty() {
                    break;
                }
            }
            return Ok(body);
        }
        if body.len() + size > MAX_BODY {
            return Err(malformed("body too large"));
        }

        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..]).await?;
        if read_line(reader).await?.as_deref() != Some("") {
            return Err(malformed("missing chunk terminator"));
        }
    }
}

async fn read_body<R: AsyncBufRead + Unpin>(reader: &mut R, request: &Request) -> Result<Vec<u8>> {
    if request
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
    {
        return read_chunked(reader).await;
    }

    let Some(length) = request.header("content-length") else {
        return Ok(Vec::new());
    };
    let length: usize = length
        .parse()
        .map_err(|_| malformed("bad content-length"))?;
    if length > MAX_BODY {
        return Err(malformed("body too large"));
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    cors: Option<&Cors>,
) -> std::io::Result<()> {
    let mut head = String::new();
    let _ = write!(head, "HTTP/1.1 {} {}\r\n", response.status, reason(response.status));
    if !response.body.is_empty() {
        head.push_str("Content-Type: application/json\r\n");
    }
    let _ = write!(head, "Content-Length: {}\r\n", response.body.len());
    if let Some(cors) = cors {
        let _ = write!(head, "Access-Control-Allow-Headers: {}\r\n", cors.headers);
        let _ = write!(head, "Access-Control-Allow-Origin: {}\r\n", cors.hosts);
    }
    head.push_str("Connection: close\r\n\r\n");

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await?;
    writer.shutdown().await
}

#[derive(Clone)]
struct Handler {
    service: Arc<dyn InferenceService>,
    error_handler: ErrorHandler,
    cors: Option<Cors>,
}

impl Handler {
    async fn serve(&self, stream: TcpStream) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let response = match self.read_request(&mut reader, &mut write_half).await {
            Ok(Some(request)) => self.handle(request).await,
            Ok(None) => return,
            Err(e) => {
                (self.error_handler)(&e);
                Response::status(400)
            }
        };

        if let Err(e) = write_response(&mut write_half, &response, self.cors.as_ref()).await {
            (self.error_handler)(&LexiclassError::transport(format!(
                "cannot write HTTP response: {e}"
            )));
        }
    }

    async fn read_request<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<Option<Request>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Some(mut request) = read_head(reader).await? else {
            return Ok(None);
        };
        if request
            .header("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
        {
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            writer.flush().await?;
        }
        request.body = read_body(reader, &request).await?;
        Ok(Some(request))
    }

    async fn handle(&self, request: Request) -> Response {
        if request.path != ENDPOINT {
            return Response::status(404);
        }
        if request.method == "OPTIONS" {
            return Response::status(if self.cors.is_some() { 200 } else { 400 });
        }

        let model_id = request
            .header(MODEL_ID_HEADER)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let Some(model_id) = model_id else {
            (self.error_handler)(&LexiclassError::transport(format!(
                "missing header: {MODEL_ID_HEADER}"
            )));
            return Response::status(400);
        };

        let service = self.service.clone();
        let payload = request.body;
        match tokio::task::spawn_blocking(move || service.infer(&model_id, &payload)).await {
            Ok(result) => Response::json(&Envelope::from(result)),
            Err(e) => {
                (self.error_handler)(&LexiclassError::transport(format!(
                    "inference task failed: {e}"
                )));
                Response::status(500)
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    handler: Handler,
    in_flight: InFlight,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let handler = handler.clone();
                    let guard = in_flight.enter();
                    tokio::spawn(async move {
                        handler.serve(stream).await;
                        drop(guard);
                    });
                }
                Err(e) => (handler.error_handler)(&LexiclassError::transport(format!(
                    "accept failed: {e}"
                ))),
            },
        }
    }
    log::debug!("http accept loop stopped");
}

fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

impl TransportAdapter for HttpAdapter {
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
            return Err(LexiclassError::transport("http adapter already initialised"));
        }

        let settings: HttpSettings = properties.settings()?;
        let addr = bind_address(&settings.host, settings.port)?;

        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("http-adapter");
        if settings.thread_pool > 0 {
            builder.max_blocking_threads(settings.thread_pool);
        }
        let runtime = builder
            .build()
            .map_err(|e| LexiclassError::transport(format!("cannot start http runtime: {e}")))?;

        let listener = runtime
            .block_on(async { listen(addr, settings.backlog) })
            .map_err(|e| LexiclassError::transport(format!("cannot bind http adapter: {e}")))?;
        let local_addr = listener.local_addr()?;

        let cors = settings.cors_allowed.then(|| Cors {
            hosts: settings.cors_allowed_hosts.clone(),
            headers: settings.cors_allowed_headers.clone(),
        });
        let handler = Handler {
            service,
            error_handler,
            cors,
        };
        let in_flight = InFlight::new();
        let (shutdown, shutdown_rx) = watch::channel(false);
        runtime.spawn(accept_loop(listener, shutdown_rx, handler, in_flight.clone()));

        log::info!("http adapter listening on {local_addr}{ENDPOINT}");
        self.running = Some(Running {
            local_addr,
            runtime,
            shutdown,
            in_flight,
            shutdown_delay: Duration::from_millis(settings.max_shutdown_delay),
        });
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    fn dispose(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.shutdown.send(true);
        if !running.in_flight.wait_idle(running.shutdown_delay) {
            log::warn!(
                "http adapter stopped with {} requests still in flight",
                running.in_flight.count()
            );
        }
        running.runtime.shutdown_timeout(Duration::from_millis(100));

        log::info!("http adapter on {} disposed", running.local_addr);
        Ok(())
    }
}

impl Drop for HttpAdapter {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::result::InferenceResult;
    use serde_json::Value;
    use std::io::{Read, Write};

    struct Echo;

    impl InferenceService for Echo {
        fn infer(&self, model_id: &str, payload: &[u8]) -> Result<InferenceResult> {
            if model_id != "echo" {
                return Err(LexiclassError::model_not_found(model_id));
            }
            InferenceResult::from_scores(&["len".to_string()], &[payload.len() as f64])
        }
    }

    fn start(cors: bool) -> HttpAdapter {
        let mut adapter = HttpAdapter::new();
        let properties = AdapterProperties::default()
            .with("host", "127.0.0.1")
            .with("port", 0)
            .with("thread-pool", 2)
            .with("cors-allowed", cors)
            .with("cors-allowed-hosts", "*")
            .with("cors-allowed-headers", "dnn-model-id");
        adapter
            .initialise(&properties, Arc::new(Echo), crate::error::logging_error_handler())
            .unwrap();
        adapter
    }

    fn send(adapter: &HttpAdapter, request: &str) -> (u16, String, String) {
        let mut stream = std::net::TcpStream::connect(adapter.local_addr().unwrap()).unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
        (status, head.to_string(), body.to_string())
    }

    #[test]
    fn test_infer_round_trip() {
        let mut adapter = start(false);

        let (status, _, body) = send(
            &adapter,
            "POST /infer HTTP/1.1\r\nDNN-Model-Id: echo\r\nContent-Length: 5\r\n\r\nhello",
        );
        assert_eq!(status, 200);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["result"]["highest-confidence"], 5.0);

        let (status, _, body) = send(
            &adapter,
            "POST /infer HTTP/1.1\r\ndnn-model-id: other\r\nContent-Length: 0\r\n\r\n",
        );
        assert_eq!(status, 200);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["exception"], "ModelNotFound: other");

        adapter.dispose().unwrap();
        adapter.dispose().unwrap();
    }

    #[test]
    fn test_chunked_body() {
        let adapter = start(false);
        let (status, _, body) = send(
            &adapter,
            "POST /infer HTTP/1.1\r\ndnn-model-id: echo\r\nTransfer-Encoding: chunked\r\n\r\n\
             3\r\nabc\r\n4\r\ndefg\r\n0\r\n\r\n",
        );
        assert_eq!(status, 200);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["result"]["highest-confidence"], 7.0);
    }

    #[test]
    fn test_status_codes() {
        let adapter = start(false);

        let (status, _, _) = send(&adapter, "POST /infer HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        assert_eq!(status, 400);

        let (status, _, _) = send(&adapter, "POST /infer HTTP/1.1\r\ndnn-model-id:  \r\n\r\n");
        assert_eq!(status, 400);

        let (status, _, _) = send(&adapter, "OPTIONS /infer HTTP/1.1\r\n\r\n");
        assert_eq!(status, 400);

        let (status, _, _) = send(&adapter, "GET /other HTTP/1.1\r\n\r\n");
        assert_eq!(status, 404);

        let (status, _, _) = send(&adapter, "garbage\r\n\r\n");
        assert_eq!(status, 400);
    }

    #[test]
    fn test_cors() {
        let adapter = start(true);
        let (status, head, _) = send(&adapter, "OPTIONS /infer HTTP/1.1\r\n\r\n");
        assert_eq!(status, 200);
        assert!(head.contains("Access-Control-Allow-Origin: *"));
        assert!(head.contains("Access-Control-Allow-Headers: dnn-model-id"));
    }
}
