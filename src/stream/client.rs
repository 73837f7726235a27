//! Realtime websocket transport.
//!
//! [`StreamConnector`] and [`FrameSource`] are the seams the session reads
//! through; [`StreamClient`] and [`WsFrameSource`] implement them over
//! tokio-tungstenite.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::api::{ApiClient, ApiError};

/// Production websocket endpoint; the API key is appended as the last segment.
pub const STREAM_ENDPOINT: &str = "wss://stream.pushbullet.com/websocket/";

/// Errors produced by stream transport and session handling.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Frame was not valid JSON or did not match the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// History lookup failed during connect or refill.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("stream connection is closed")]
    ConnectionClosed,

    #[error("stream read was cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// An open connection yielding text frames.
pub trait FrameSource {
    /// Next text frame, or `None` once the peer has closed the connection.
    fn recv_text(&mut self) -> BoxFuture<'_, Result<Option<String>, StreamError>>;

    fn close(&mut self) -> BoxFuture<'_, Result<(), StreamError>>;
}

/// Opens fresh [`FrameSource`]s.
pub trait StreamConnector {
    type Source: FrameSource;

    fn open(&self) -> BoxFuture<'_, Result<Self::Source, StreamError>>;
}

/// Entry point for creating stream connections.
#[derive(Clone)]
pub struct StreamClient {
    api_key: SecretString,
    endpoint_override: Option<String>,
}

impl StreamClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            endpoint_override: None,
        }
    }

    /// Reuses the credential of an existing REST client.
    pub fn from_api(client: &ApiClient) -> Self {
        Self::new(client.api_key().clone())
    }

    /// Replaces the websocket base URL, e.g. for a local mock server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint_override = Some(endpoint.trim().to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint_override.as_deref().unwrap_or(STREAM_ENDPOINT)
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint().trim_end_matches('/'),
            self.api_key.expose_secret()
        )
    }

    /// Performs the websocket handshake.
    pub async fn connect(&self) -> Result<WsFrameSource, StreamError> {
        let (socket, _) = connect_async(self.endpoint_url()).await?;
        debug!(event = "stream_connected", endpoint = self.endpoint());
        Ok(WsFrameSource { socket })
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.endpoint())
            .finish_non_exhaustive()
    }
}

impl StreamConnector for StreamClient {
    type Source = WsFrameSource;

    fn open(&self) -> BoxFuture<'_, Result<WsFrameSource, StreamError>> {
        Box::pin(self.connect())
    }
}

/// Live websocket connection. Answers pings while waiting for text.
#[derive(Debug)]
pub struct WsFrameSource {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsFrameSource {
    async fn next_text(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(payload))) => {
                    trace!(event = "stream_ping");
                    self.socket.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Binary(_))) => {
                    return Err(StreamError::Protocol(
                        "received binary frame on a text stream".to_string(),
                    ));
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None)
                }
                Some(Err(err)) => return Err(StreamError::WebSocket(err)),
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), StreamError> {
        match self.socket.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(StreamError::WebSocket(err)),
        }
    }
}

impl FrameSource for WsFrameSource {
    fn recv_text(&mut self) -> BoxFuture<'_, Result<Option<String>, StreamError>> {
        Box::pin(self.next_text())
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), StreamError>> {
        Box::pin(self.shutdown())
    }
}
