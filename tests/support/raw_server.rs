//! Single-connection HTTP server that writes a canned response verbatim.
//!
//! Used where wiremock cannot express the wire shape, such as bodies without
//! `Content-Length` or connections whose lifetime the test observes.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::socket_guard::should_skip_socket_bound_test;

/// How long the server waits for the client to disconnect.
const HANG_UP_WAIT: Duration = Duration::from_secs(10);

pub struct RawServer {
    /// `http://127.0.0.1:<port>`
    pub base_url: String,
    task: JoinHandle<Served>,
}

/// What the server observed on its one connection.
#[derive(Debug, Default)]
pub struct Served {
    /// Request head bytes, empty when the server answered without reading.
    pub request: Vec<u8>,
    /// True when the client closed the connection.
    pub hung_up: bool,
}

impl RawServer {
    /// Waits for the connection to end; true when the client closed it.
    pub async fn client_hung_up(self) -> bool {
        self.finish().await.hung_up
    }

    /// Waits for the connection to end and returns what was observed.
    pub async fn finish(self) -> Served {
        self.task.await.unwrap_or_default()
    }

    /// Same address with the `https` scheme.
    pub fn https_url(&self) -> String {
        self.base_url.replacen("http://", "https://", 1)
    }
}

/// Serves `response` to the first connection once its request head arrived.
///
/// With `hold_open`, the server keeps the socket open after writing and only
/// finishes when the client disconnects.
pub async fn serve_once(response: Vec<u8>, hold_open: bool) -> Option<RawServer> {
    spawn(response, true, hold_open).await
}

/// Writes `response` as soon as a connection is accepted, without reading.
///
/// An empty `response` with `hold_open` gives a peer that accepts the TCP
/// connection and never says anything.
pub async fn serve_before_request(response: Vec<u8>, hold_open: bool) -> Option<RawServer> {
    spawn(response, false, hold_open).await
}

async fn spawn(response: Vec<u8>, read_request: bool, hold_open: bool) -> Option<RawServer> {
    if should_skip_socket_bound_test() {
        return None;
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
    let base_url = format!("http://{}", listener.local_addr().ok()?);

    let task = tokio::spawn(async move {
        let mut served = Served::default();
        let Ok((mut socket, _)) = listener.accept().await else {
            return served;
        };

        let mut buf = [0u8; 1024];
        while read_request && !served.request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return served,
                Ok(n) => served.request.extend_from_slice(&buf[..n]),
            }
        }

        if socket.write_all(&response).await.is_err() {
            return served;
        }
        let _ = socket.flush().await;

        if !hold_open {
            let _ = socket.shutdown().await;
            served.hung_up = true;
            return served;
        }

        let hung_up = async {
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return true,
                    Ok(_) => {}
                }
            }
        };
        served.hung_up = tokio::time::timeout(HANG_UP_WAIT, hung_up)
            .await
            .unwrap_or(false);
        served
    });

    Some(RawServer { base_url, task })
}

/// Response head for a chunked body with no `Content-Length`.
pub fn chunked_head() -> Vec<u8> {
    b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n"
        .to_vec()
}

/// Encodes `data` as one HTTP/1.1 chunk.
pub fn chunk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:x}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

/// Terminating zero-length chunk.
pub fn last_chunk() -> Vec<u8> {
    b"0\r\n\r\n".to_vec()
}
