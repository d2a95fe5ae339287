//! Route check performed before any websocket handshake byte is exchanged.

use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::WebSocketStream;

use crate::error::BridgeError;

const MAX_HEAD_BYTES: usize = 8 * 1024;
const HEAD_TIMEOUT: Duration = Duration::from_secs(5);
const PEEK_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

/// Accepts only an exact match on the path component; the query string is ignored.
pub fn route_decision(target: &str, route: &str) -> Decision {
    let path = target.split('?').next().unwrap_or_default();
    if path == route {
        Decision::Accept
    } else {
        Decision::Reject
    }
}

/// Extracts the request target from an HTTP request line such as
/// `GET /bridge?x=1 HTTP/1.1`.
pub fn request_target(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    parts.next()?;
    Some(target)
}

/// Reads the request target without consuming anything from the socket, so the
/// websocket handshake can still run on the same stream afterwards.
///
/// Returns `Ok(None)` when the peer sends something that is not a request line,
/// closes early, or does not finish the line in time.
pub async fn peek_request_target(stream: &TcpStream) -> io::Result<Option<String>> {
    match timeout(HEAD_TIMEOUT, peek_request_line(stream)).await {
        Ok(result) => result,
        Err(_) => Ok(None),
    }
}

async fn peek_request_line(stream: &TcpStream) -> io::Result<Option<String>> {
    let mut buf = vec![0u8; MAX_HEAD_BYTES];
    let mut seen = 0;
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(end) = buf[..n].windows(2).position(|w| w == b"\r\n") {
            let line = String::from_utf8_lossy(&buf[..end]);
            return Ok(request_target(&line).map(str::to_owned));
        }
        if n == buf.len() {
            return Ok(None);
        }
        // peek and readiness both return immediately while data is buffered,
        // so back off once nothing new has arrived.
        if n == seen {
            stream.readable().await?;
            sleep(PEEK_BACKOFF).await;
        }
        seen = n;
    }
}

/// Runs the server side of the websocket handshake on an accepted socket.
pub async fn accept(stream: TcpStream) -> Result<WebSocketStream<TcpStream>, BridgeError> {
    tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| BridgeError::Handshake(e.to_string()))
}
