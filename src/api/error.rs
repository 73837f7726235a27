use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

const ERROR_BODY_SNIPPET_LEN: usize = 220;
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Errors produced by the REST client and the upload flow.
#[derive(Debug, Error)]
pub enum ApiError {
    /// DNS, connect, TLS, or timeout failure before a response arrived.
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// The credential was rejected (401/403).
    #[error("authentication failed (http {status}): {body}")]
    Auth { status: StatusCode, body: String },

    /// The addressed resource does not exist (404).
    #[error("not found: {body}")]
    NotFound { body: String },

    /// The account exceeded its request quota (429).
    #[error("rate limited: {body}")]
    RateLimited {
        body: String,
        /// Unix timestamp at which the quota resets, when the server sent one.
        reset: Option<u64>,
    },

    /// The service failed (5xx).
    #[error("server error (http {status}): {body}")]
    Server { status: StatusCode, body: String },

    /// Any other non-2xx response.
    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    /// Request rejected locally before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The out-of-band file upload failed.
    #[error("file upload failed: {detail}")]
    Upload {
        status: Option<StatusCode>,
        detail: String,
    },

    #[error("failed to decode response: {source}. body={body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    #[error("api key is not a valid header value")]
    InvalidApiKey,
}

impl ApiError {
    /// Whether a caller-side retry has a chance of succeeding.
    ///
    /// The library itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(err) => err.is_timeout() || err.is_connect(),
            Self::RateLimited { .. } | Self::Server { .. } => true,
            Self::Auth { .. }
            | Self::NotFound { .. }
            | Self::HttpStatus { .. }
            | Self::Validation(_)
            | Self::Upload { .. }
            | Self::Decode { .. }
            | Self::InvalidApiKey => false,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Auth { status, .. }
            | Self::Server { status, .. }
            | Self::HttpStatus { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Upload { status, .. } => *status,
            Self::Network(err) => err.status(),
            Self::Validation(_) | Self::Decode { .. } | Self::InvalidApiKey => None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Maps a non-2xx response onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ApiError {
    let body = summarize_error_body(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Auth { status, body },
        StatusCode::NOT_FOUND => ApiError::NotFound { body },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
            body,
            reset: headers
                .get(RATE_LIMIT_RESET_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok()),
        },
        status if status.is_server_error() => ApiError::Server { status, body },
        status => ApiError::HttpStatus { status, body },
    }
}

/// Extracts the service's error message, falling back to a body snippet.
pub(crate) fn summarize_error_body(body: &str) -> String {
    #[derive(Debug, Deserialize)]
    struct ErrorDetail {
        #[serde(default)]
        message: Option<String>,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<ErrorDetail>,
        #[serde(default)]
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(detail) = parsed.error {
            match (detail.message, detail.kind) {
                (Some(message), _) => return message,
                (None, Some(kind)) => return kind,
                (None, None) => {}
            }
        }
        if let Some(message) = parsed.message {
            return message;
        }
    }

    body.chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}
