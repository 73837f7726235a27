//! Authenticated REST client for the Pushbullet v2 API.
//!
//! `ApiClient` is the transport: it attaches the credential and fixed headers,
//! issues one request per call, and maps non-2xx responses onto [`ApiError`].
//! Resource operations live in the submodules as further `impl ApiClient`
//! blocks.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

mod account;
mod devices;
mod ephemerals;
mod error;
pub mod models;
mod pushes;
mod upload;

pub use error::ApiError;
pub use models::{
    Contact, Device, DeviceUpdate, Ephemeral, ListItem, NewDevice, Page, Push, PushKind,
    UploadRequest, User,
};
pub use pushes::{NewPush, PushBuilder, PushContent, PushQuery, PushTarget, PushUpdate, Targets};
pub use upload::{FileTypeDetector, FileUpload, OctetStreamDetector};

/// Production REST endpoint including the version prefix.
pub const API_BASE_URL: &str = "https://api.pushbullet.com/v2";
const ACCESS_TOKEN_HEADER: &str = "Access-Token";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ApiDefaults;

impl ApiDefaults {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = concat!("pushbullet-sdk-rust/", env!("CARGO_PKG_VERSION"));
}

#[derive(Clone, Debug)]
pub struct ApiClientOptions {
    /// API root, e.g. `https://api.pushbullet.com/v2`.
    pub base_url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Per-request deadline; also bounds file uploads.
    pub request_timeout: Duration,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            user_agent: ApiDefaults::USER_AGENT.to_string(),
            connect_timeout: ApiDefaults::CONNECT_TIMEOUT,
            request_timeout: ApiDefaults::REQUEST_TIMEOUT,
        }
    }
}

/// Client bound to one API key.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    user_agent: HeaderValue,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(api_key: SecretString) -> Result<Self, ApiError> {
        Self::with_options(api_key, ApiClientOptions::default())
    }

    pub fn with_options(
        api_key: SecretString,
        options: ApiClientOptions,
    ) -> Result<Self, ApiError> {
        HeaderValue::from_str(api_key.expose_secret()).map_err(|_| ApiError::InvalidApiKey)?;
        let user_agent = HeaderValue::from_str(&options.user_agent)
            .map_err(|_| ApiError::validation("user agent is not a valid header value"))?;

        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            api_key,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            user_agent,
            request_timeout: options.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Issues one authenticated request and decodes the JSON response.
    ///
    /// `path` is relative to the base URL (`/pushes`, `/devices/abc`).
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let token = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|_| ApiError::InvalidApiKey)?;

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .timeout(self.request_timeout)
            .header(ACCESS_TOKEN_HEADER, token)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(USER_AGENT, self.user_agent.clone());

        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ApiError::Network)?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(ApiError::Network)?;

        debug!(
            event = "api_request",
            method = %method,
            path,
            status = status.as_u16()
        );

        if !status.is_success() {
            return Err(error::classify_status(status, &headers, &text));
        }

        decode_body(&text)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.request::<(), T>(Method::GET, path, None, query).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request::<(), serde_json::Value>(Method::DELETE, path, None, &[])
            .await
            .map(|_| ())
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn user_agent(&self) -> &HeaderValue {
        &self.user_agent
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Decodes a 2xx body; an empty body is read as JSON `null`.
fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|source| ApiError::Decode {
        source,
        body: error::summarize_error_body(text),
    })
}

/// Drives a cursor-paginated listing.
///
/// `fetch` receives the cursor for the next page (`None` for the first) and the
/// number of items still wanted when a `limit` is set. Pages are concatenated in
/// the order the server returns them.
pub(crate) async fn collect_pages<T, F, Fut>(
    limit: Option<usize>,
    mut cursor: Option<String>,
    mut fetch: F,
) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<String>, Option<usize>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();

    loop {
        let remaining = limit.map(|limit| limit.saturating_sub(items.len()));
        if remaining == Some(0) {
            break;
        }

        let requested = cursor.clone();
        let page = fetch(cursor.take(), remaining).await?;
        items.extend(page.items);

        match page.cursor {
            Some(next) if requested.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => break,
        }
    }

    if let Some(limit) = limit {
        items.truncate(limit);
    }
    Ok(items)
}

/// Rejects identifiers that would escape their path segment.
pub(crate) fn resource_path(collection: &str, iden: &str) -> Result<String, ApiError> {
    let iden = iden.trim();
    if iden.is_empty() {
        return Err(ApiError::validation(format!("{collection} iden must not be empty")));
    }
    if !iden
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(format!(
            "{collection} iden contains unsupported characters"
        )));
    }
    Ok(format!("/{collection}/{iden}"))
}
