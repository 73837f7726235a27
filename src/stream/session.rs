//! Realtime session reconciling stream signals with push history.
//!
//! `StreamSession` holds a watermark (the newest `modified` time it has seen)
//! and a FIFO of pushes fetched but not yet handed out. A `push` tickle on the
//! socket triggers a refill of everything modified after the watermark; mirrored
//! notifications are passed straight through.
//!
//! State only changes after an awaited call has completed, so dropping a
//! [`StreamSession::next_event`] future never loses queued pushes or moves the
//! watermark past undelivered history.

use std::collections::VecDeque;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::api::{ApiClient, ApiError, Ephemeral, Push, PushQuery};
use crate::stream::client::{FrameSource, StreamClient, StreamConnector, StreamError};
use crate::stream::proto::StreamMessage;

/// Source of push history used to initialise and refill a session.
pub trait PushHistory {
    /// `modified` of the most recent push, `None` on an empty account.
    fn latest_modified(&self) -> BoxFuture<'_, Result<Option<f64>, ApiError>>;

    /// Pushes modified strictly after `watermark`, newest first, at most `limit`.
    fn pushes_modified_after(
        &self,
        watermark: f64,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Push>, ApiError>>;
}

impl PushHistory for ApiClient {
    fn latest_modified(&self) -> BoxFuture<'_, Result<Option<f64>, ApiError>> {
        Box::pin(async move { Ok(self.latest_push().await?.map(|push| push.modified)) })
    }

    fn pushes_modified_after(
        &self,
        watermark: f64,
        limit: Option<usize>,
    ) -> BoxFuture<'_, Result<Vec<Push>, ApiError>> {
        let query = PushQuery {
            limit,
            ..PushQuery::modified_after(watermark)
        };
        Box::pin(async move { self.list_pushes(&query).await })
    }
}

/// Event emitted by [`StreamSession::next_event`].
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A push from history or delivered directly on the socket.
    Push(Push),
    /// A mirrored notification. Never stored in history.
    Ephemeral(Ephemeral),
}

pub struct StreamSession<H, C: StreamConnector> {
    history: H,
    connector: C,
    socket: Option<C::Source>,
    watermark: Option<f64>,
    pending: VecDeque<Push>,
    refill_limit: Option<usize>,
    cancel: CancellationToken,
}

impl StreamSession<ApiClient, StreamClient> {
    /// Session over the production stream using the REST client's credential.
    pub fn for_account(api: ApiClient) -> Self {
        let stream = StreamClient::from_api(&api);
        Self::new(api, stream)
    }
}

impl<H, C> StreamSession<H, C>
where
    H: PushHistory,
    C: StreamConnector,
{
    pub fn new(history: H, connector: C) -> Self {
        Self {
            history,
            connector,
            socket: None,
            watermark: None,
            pending: VecDeque::new(),
            refill_limit: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Resumes from a previously persisted watermark instead of the latest push.
    pub fn with_watermark(mut self, watermark: f64) -> Self {
        self.watermark = Some(watermark);
        self
    }

    /// Caps how many pushes a single refill may fetch. The newest win.
    pub fn with_refill_limit(mut self, limit: usize) -> Self {
        self.refill_limit = Some(limit);
        self
    }

    pub fn watermark(&self) -> Option<f64> {
        self.watermark
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Token that aborts a blocked [`Self::next_event`] with `Cancelled`.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Initialises or catches up the watermark, then opens a fresh socket.
    ///
    /// Calling this again after a disconnect queues the pushes modified while
    /// the session was offline.
    pub async fn connect(&mut self) -> Result<(), StreamError> {
        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        match self.watermark {
            None => {
                let latest = self.history.latest_modified().await?;
                let watermark = latest.unwrap_or(0.0);
                debug!(event = "stream_watermark_initialized", watermark);
                self.watermark = Some(watermark);
            }
            Some(_) => {
                self.refill().await?;
            }
        }

        if let Some(mut previous) = self.socket.take() {
            if let Err(err) = previous.close().await {
                debug!(event = "stream_previous_close_failed", error = %err);
            }
        }

        let socket = self.connector.open().await?;
        self.socket = Some(socket);
        Ok(())
    }

    /// Returns the next push or ephemeral, refilling from history as needed.
    ///
    /// Queued pushes are returned before the socket is read again.
    pub async fn next_event(&mut self) -> Result<StreamEvent, StreamError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            if let Some(push) = self.pending.pop_front() {
                return Ok(StreamEvent::Push(push));
            }

            let text = self.read_frame().await?;
            match StreamMessage::parse(&text)? {
                StreamMessage::Nop => trace!(event = "stream_nop"),
                message if message.is_push_tickle() => {
                    self.refill().await?;
                }
                StreamMessage::Tickle { .. } => {
                    return Ok(StreamEvent::Push(serde_json::from_str(&text)?));
                }
                StreamMessage::Mirror(ephemeral) => return Ok(StreamEvent::Ephemeral(ephemeral)),
                StreamMessage::Push(push) => return Ok(StreamEvent::Push(push)),
            }
        }
    }

    /// Closes the socket. Later reads fail with `ConnectionClosed` until
    /// [`Self::connect`] is called again.
    pub async fn close(&mut self) -> Result<(), StreamError> {
        match self.socket.take() {
            Some(mut socket) => socket.close().await,
            None => Ok(()),
        }
    }

    async fn read_frame(&mut self) -> Result<String, StreamError> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(StreamError::ConnectionClosed);
        };

        let received = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
            received = socket.recv_text() => received,
        };

        match received {
            Ok(Some(text)) => Ok(text),
            Ok(None) => {
                debug!(event = "stream_closed");
                self.socket = None;
                Err(StreamError::ConnectionClosed)
            }
            Err(StreamError::WebSocket(err)) => {
                debug!(event = "stream_dropped", error = %err);
                self.socket = None;
                Err(StreamError::ConnectionClosed)
            }
            Err(err) => Err(err),
        }
    }

    /// Queues everything modified after the watermark, oldest first.
    async fn refill(&mut self) -> Result<(), StreamError> {
        let watermark = self.watermark.unwrap_or(0.0);
        let mut pushes = self
            .history
            .pushes_modified_after(watermark, self.refill_limit)
            .await?;
        pushes.sort_by(|a, b| a.modified.total_cmp(&b.modified));

        let newest = pushes
            .iter()
            .map(|push| push.modified)
            .fold(watermark, f64::max);
        let before = self.pending.len();
        for push in pushes {
            let queued = !push.iden.is_empty()
                && self.pending.iter().any(|pending| pending.iden == push.iden);
            if !queued {
                self.pending.push_back(push);
            }
        }
        self.watermark = Some(newest);

        debug!(
            event = "stream_refill",
            watermark = newest,
            queued = self.pending.len() - before
        );
        Ok(())
    }
}

impl<H, C: StreamConnector> std::fmt::Debug for StreamSession<H, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("watermark", &self.watermark)
            .field("pending", &self.pending.len())
            .field("connected", &self.socket.is_some())
            .field("refill_limit", &self.refill_limit)
            .finish_non_exhaustive()
    }
}
