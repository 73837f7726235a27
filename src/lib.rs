//! Rust SDK for the Pushbullet service.
//!
//! The crate is organized by transport surface:
//! - `api`: REST client for devices, pushes, file uploads, ephemerals, and
//!   account resources.
//! - `stream`: realtime websocket client and the session that reconciles
//!   stream signals with push history.
//! - `retry`: opt-in retry helpers for idempotent calls.

/// REST client, wire models, and the API error taxonomy.
pub mod api;
/// Retry helpers used by callers that want bounded retries.
pub mod retry;
/// Realtime stream client, protocol types, and session state.
pub mod stream;

pub use api::{ApiClient, ApiClientOptions, ApiError};
pub use stream::{StreamClient, StreamError, StreamEvent, StreamSession};
