//! Realtime stream modules.
//!
//! - `client`: websocket transport and the connector/frame-source seams.
//! - `proto`: classification of inbound frames.
//! - `session`: watermark-driven session that turns tickles into pushes.

/// Websocket connection and transport errors.
pub mod client;
/// Stream protocol messages.
pub mod proto;
/// Session reconciling live signals with push history.
pub mod session;

pub use client::{FrameSource, StreamClient, StreamConnector, StreamError, WsFrameSource};
pub use proto::StreamMessage;
pub use session::{PushHistory, StreamEvent, StreamSession};
