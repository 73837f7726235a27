//! Two-phase file push: reserve an upload slot, send the bytes to the
//! out-of-band target, then register a `file` push pointing at the result.

use std::path::Path;

use reqwest::header::USER_AGENT;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::debug;

use super::error::summarize_error_body;
use super::models::{Push, UploadRequest};
use super::pushes::{NewPush, PushContent, PushTarget};
use super::{ApiClient, ApiError};

const OCTET_STREAM: &str = "application/octet-stream";

/// Supplies a MIME type when the caller did not give one.
pub trait FileTypeDetector {
    fn detect(&self, bytes: &[u8]) -> String;
}

impl<F> FileTypeDetector for F
where
    F: Fn(&[u8]) -> String,
{
    fn detect(&self, bytes: &[u8]) -> String {
        self(bytes)
    }
}

/// Labels everything `application/octet-stream`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OctetStreamDetector;

impl FileTypeDetector for OctetStreamDetector {
    fn detect(&self, _bytes: &[u8]) -> String {
        OCTET_STREAM.to_string()
    }
}

/// File contents plus the metadata of the push that will reference them.
#[derive(Clone, Debug, Default)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Explicit MIME type; the detector is consulted when unset.
    pub file_type: Option<String>,
    pub body: Option<String>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            file_type: None,
            body: None,
        }
    }

    /// Reads a file from disk, naming the upload after its final component.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }

    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn resolve_type<D: FileTypeDetector + ?Sized>(&self, detector: &D) -> String {
        match self.file_type.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => explicit.to_string(),
            _ => detector.detect(&self.bytes),
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadSlotRequest<'a> {
    file_name: &'a str,
    file_type: &'a str,
}

impl ApiClient {
    /// Reserves an upload slot for one file.
    pub async fn request_upload(
        &self,
        file_name: &str,
        file_type: &str,
    ) -> Result<UploadRequest, ApiError> {
        let mut slot: UploadRequest = self
            .post(
                "/upload-request",
                &UploadSlotRequest {
                    file_name,
                    file_type,
                },
            )
            .await?;
        if slot.file_name.is_empty() {
            slot.file_name = file_name.to_string();
        }
        if slot.file_type.is_empty() {
            slot.file_type = file_type.to_string();
        }
        Ok(slot)
    }

    /// Sends the bytes to the slot's upload target.
    ///
    /// The request carries the slot's form fields but never the API key.
    pub async fn upload_file(&self, slot: &UploadRequest, bytes: Vec<u8>) -> Result<(), ApiError> {
        let file_part = Part::bytes(bytes)
            .file_name(slot.file_name.clone())
            .mime_str(&slot.file_type)
            .map_err(|err| ApiError::Upload {
                status: None,
                detail: format!("invalid file type {:?}: {err}", slot.file_type),
            })?;

        let form = slot
            .data
            .iter()
            .fold(Form::new(), |form, (key, value)| {
                form.text(key.clone(), value.clone())
            })
            .part("file", file_part);

        let response = self
            .http()
            .post(&slot.upload_url)
            .timeout(self.request_timeout())
            .header(USER_AGENT, self.user_agent().clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| ApiError::Upload {
                status: None,
                detail: err.to_string(),
            })?;

        let status = response.status();
        debug!(event = "file_uploaded", status = status.as_u16());
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Upload {
                status: Some(status),
                detail: summarize_error_body(&body),
            });
        }
        Ok(())
    }

    /// Runs the whole file push flow.
    ///
    /// Fails before any network call on a blank name or target. A failure after
    /// the upload leaves an unreferenced file behind and no push.
    pub async fn push_file<D>(
        &self,
        file: FileUpload,
        target: Option<PushTarget>,
        detector: &D,
    ) -> Result<Push, ApiError>
    where
        D: FileTypeDetector + ?Sized,
    {
        if file.file_name.trim().is_empty() {
            return Err(ApiError::validation("file_name must not be empty"));
        }
        if target
            .as_ref()
            .is_some_and(|target| target.value().trim().is_empty())
        {
            return Err(ApiError::validation("push target must not be empty"));
        }

        let file_type = file.resolve_type(detector);
        debug!(
            event = "upload_requested",
            file_name = %file.file_name,
            file_type = %file_type,
            size = file.bytes.len()
        );

        let slot = self.request_upload(&file.file_name, &file_type).await?;
        self.upload_file(&slot, file.bytes).await?;

        let push = NewPush::new(
            PushContent::File {
                file_name: slot.file_name,
                file_type: slot.file_type,
                file_url: slot.file_url,
                body: file.body.filter(|body| !body.trim().is_empty()),
            },
            target,
        )?;
        self.create_push(&push).await
    }
}
