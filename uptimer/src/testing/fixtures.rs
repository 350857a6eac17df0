//! A minimal local HTTP server for exercising network stages.
//!
//! Every connection serves one request and is closed afterwards. Bodies of
//! incoming requests are ignored; only the request line and headers are
//! read.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

const MAX_HEAD_BYTES: usize = 64 * 1024;

/// A canned response served for one path.
#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    basic_auth: Option<String>,
}

impl Route {
    /// Creates a route answering `200` with an empty body.
    ///
    /// `path` may include a query string; such routes take precedence over
    /// the bare path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: 200,
            headers: Vec::new(),
            body: String::new(),
            basic_auth: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Serves `value` as compact JSON.
    #[must_use]
    pub fn with_json(self, value: Value) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(value.to_string())
    }

    /// Answers with a `302` pointing at `location`.
    #[must_use]
    pub fn redirect_to(self, location: impl Into<String>) -> Self {
        self.with_status(302).with_header("Location", location)
    }

    /// Requires HTTP basic authentication; other requests get a `401`.
    #[must_use]
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some(format!("{username}:{password}"));
        self
    }

    fn authorized(&self, request: &RecordedRequest) -> bool {
        let Some(expected) = &self.basic_auth else {
            return true;
        };
        request
            .header("authorization")
            .and_then(|value| value.strip_prefix("Basic "))
            .and_then(|token| STANDARD.decode(token.trim()).ok())
            .is_some_and(|decoded| decoded == expected.as_bytes())
    }
}

/// A request received by a [`FixtureServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: String,
    /// Path including any query string.
    pub path: String,
    headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of the header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn parse(head: &str) -> Option<Self> {
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let path = request_line.next()?.to_string();
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Some(Self {
            method,
            path,
            headers,
        })
    }
}

#[derive(Debug)]
struct Shared {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Shared {
    fn route(&self, path: &str) -> Option<&Route> {
        self.routes.get(path).or_else(|| {
            let bare = path.split_once('?').map_or(path, |(p, _)| p);
            self.routes.get(bare)
        })
    }
}

/// HTTP/1.1 server on a random loopback port, stopped on drop.
#[derive(Debug)]
pub struct FixtureServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    /// Binds a loopback port and starts serving `routes`.
    pub async fn start(routes: Vec<Route>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            routes: routes.into_iter().map(|r| (r.path.clone(), r)).collect(),
            requests: Mutex::new(Vec::new()),
        });

        let accept_shared = shared.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = accept_shared.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, &shared).await {
                        debug!(error = %e, "Fixture connection failed");
                    }
                });
            }
        });

        Ok(Self {
            addr,
            shared,
            handle,
        })
    }

    /// Returns a port nothing is listening on.
    pub async fn unused_port() -> io::Result<u16> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(listener.local_addr()?.port())
    }

    /// `http://127.0.0.1:<port>` without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL of `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, shared: &Shared) -> io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 || head.len() > MAX_HEAD_BYTES {
            return Ok(());
        }
        head.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&head);
    let Some(request) = RecordedRequest::parse(&text) else {
        return write_response(&mut stream, 400, &[], "").await;
    };
    shared.requests.lock().push(request.clone());

    match shared.route(&request.path) {
        None => write_response(&mut stream, 404, &[], "not found").await,
        Some(route) if !route.authorized(&request) => {
            let challenge = [("WWW-Authenticate".to_string(), "Basic realm=\"fixture\"".to_string())];
            write_response(&mut stream, 401, &challenge, "unauthorized").await
        }
        Some(route) => write_response(&mut stream, route.status, &route.headers, &route.body).await,
    }
}

async fn write_response(
    stream: &mut TcpStream,
    status: u16,
    headers: &[(String, String)],
    body: &str,
) -> io::Result<()> {
    let mut response = format!("HTTP/1.1 {status} {}\r\n", reason(status));
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    ));
    response.push_str(body);

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
