//! Minimal HTTP/1.1 server serving canned responses on a loopback port.
//!
//! Every connection handles exactly one request and is closed afterwards,
//! which keeps close-delimited and truncated bodies deterministic.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

/// Request line as seen by the fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    /// Request target including any query string.
    pub target: String,
}

/// Canned response for one path.
#[derive(Debug, Clone)]
pub struct Route {
    status: u16,
    body: Vec<u8>,
    headers: Vec<(String, String)>,
    content_length: bool,
    truncate_at: Option<usize>,
    delay: Duration,
}

impl Route {
    /// `200 OK` with `body` and a matching `Content-Length`.
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            headers: Vec::new(),
            content_length: true,
            truncate_at: None,
            delay: Duration::ZERO,
        }
    }

    /// Empty response with the given status.
    pub fn status(code: u16) -> Self {
        Self {
            status: code,
            ..Self::ok(Vec::new())
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Omits `Content-Length`; the body ends when the connection closes.
    pub fn without_content_length(mut self) -> Self {
        self.content_length = false;
        self
    }

    /// Advertises the full length but closes after `bytes` body bytes.
    pub fn truncated(mut self, bytes: usize) -> Self {
        self.truncate_at = Some(bytes);
        self
    }

    /// Waits `delay` after the headers before sending the body.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Running fixture server. Stops accepting when dropped.
pub struct HttpFixture {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    accept_task: JoinHandle<()>,
}

impl HttpFixture {
    /// Binds `127.0.0.1:0` and serves `routes` keyed by path (query ignored).
    /// Unknown paths get `404`.
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");

        let routes: Arc<HashMap<String, Route>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.to_string(), route))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let accept_task = tokio::spawn({
            let requests = requests.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let routes = routes.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, &routes, &requests).await {
                            debug!(error = %e, "fixture connection ended early");
                        }
                    });
                }
            }
        });

        Self {
            addr,
            requests,
            accept_task,
        }
    }

    /// Absolute URL for `path_and_query` on this server.
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for HttpFixture {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    requests: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let head = read_head(&mut stream).await?;
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or("/").to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();

    requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method: method.clone(),
            target,
        });

    let not_found = Route::status(404);
    let route = routes.get(&path).unwrap_or(&not_found);

    let mut response = format!("HTTP/1.1 {} {}\r\n", route.status, reason(route.status));
    if route.content_length {
        response.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    for (name, value) in &route.headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("Connection: close\r\n\r\n");
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    if method != "HEAD" {
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        let end = route
            .truncate_at
            .map_or(route.body.len(), |n| n.min(route.body.len()));
        stream.write_all(&route.body[..end]).await?;
        stream.flush().await?;
    }

    stream.shutdown().await
}

/// Reads up to the blank line ending the request head. Bodies are ignored.
async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            break;
        }
        buf.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
