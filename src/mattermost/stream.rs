//! Websocket event stream transport.
//!
//! The connection manager only sees the [`StreamConnector`] and
//! [`EventStream`] traits. [`WsConnector`] is the real transport: a
//! `tokio-tungstenite` client that authenticates with the bot token in the
//! `Authorization` header during the upgrade request.
//!
//! Every websocket frame, pings included, counts as liveness. A stream that
//! stays silent past the idle timeout is reported as [`StreamError::Idle`],
//! so a half-open TCP connection ends in a reconnect instead of hanging.

use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The configured URL or token cannot form an upgrade request.
    #[error("invalid stream request: {0}")]
    InvalidRequest(String),

    /// The server answered the upgrade with a non-101 status.
    #[error("handshake rejected with status {status}")]
    Rejected { status: u16 },

    #[error("handshake failed: {0}")]
    Handshake(String),

    /// An established connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// No frame arrived within the idle timeout.
    #[error("no frames received for {after:?}")]
    Idle { after: Duration },
}

impl StreamError {
    /// The server refused our credentials. The connection manager still retries.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403 })
    }
}

/// Opens one authenticated stream connection per call.
#[async_trait::async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn EventStream>, StreamError>;
}

/// An open event stream yielding JSON text frames.
#[async_trait::async_trait]
pub trait EventStream: Send {
    /// The next text frame. `None` once the server closed the stream.
    async fn next_text(&mut self) -> Option<Result<String, StreamError>>;

    /// Send a normal-closure frame and shut the stream down.
    async fn close(&mut self);
}

// =============================================================================
// WEBSOCKET TRANSPORT
// =============================================================================

/// Stream URL with the query the server expects for a fresh connection.
#[must_use]
pub fn stream_url(ws_url: &str) -> String {
    let separator = if ws_url.contains('?') { '&' } else { '?' };
    format!("{ws_url}{separator}connection_id=&sequence_number=0")
}

pub struct WsConnector {
    url: String,
    token: String,
    idle_timeout: Duration,
}

impl WsConnector {
    /// `idle_timeout` must exceed the server's ping interval.
    #[must_use]
    pub fn new(ws_url: &str, token: String, idle_timeout: Duration) -> Self {
        Self { url: stream_url(ws_url), token, idle_timeout }
    }
}

#[async_trait::async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn EventStream>, StreamError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, _response) = connect_async(request).await.map_err(|e| match e {
            WsError::Http(response) => StreamError::Rejected { status: response.status().as_u16() },
            other => StreamError::Handshake(other.to_string()),
        })?;
        Ok(Box::new(WsEventStream { socket, idle_timeout: self.idle_timeout }))
    }
}

struct WsEventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    idle_timeout: Duration,
}

#[async_trait::async_trait]
impl EventStream for WsEventStream {
    async fn next_text(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            let Ok(next) = tokio::time::timeout(self.idle_timeout, self.socket.next()).await else {
                return Some(Err(StreamError::Idle { after: self.idle_timeout }));
            };
            match next? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "event stream close frame received");
                    return None;
                }
                // Pongs are queued by tungstenite and flushed on the next read.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(StreamError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let frame = CloseFrame { code: CloseCode::Normal, reason: "bridge stopping".into() };
        if let Err(e) = self.socket.close(Some(frame)).await {
            debug!(error = %e, "event stream close failed");
        }
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
