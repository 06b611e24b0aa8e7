//! Compose endpoint HTTP client.
//!
//! Platform-agnostic client for the webmail compose attachment endpoints:
//! a single-file multipart upload that reports byte-level progress while
//! the body is consumed, and the best-effort removal notice for an
//! already-stored attachment.

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::models::{AttachmentFile, RemoteAttachmentId, UploadOutcome};
use crate::uploader::{UploadProgressUpdate, UploadTransport};

/// Upload body chunk size; each consumed chunk advances reported progress.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Multipart field name the upload endpoint expects.
const UPLOAD_FIELD_NAME: &str = "attachments";

/// HTTP client for compose attachment operations.
#[derive(Debug, Clone)]
pub struct ComposeApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ComposeApiClient {
    /// Build a client for an explicit compose API base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into().as_str())?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this client was configured with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload one file as a single-file multipart submission.
    ///
    /// Progress updates are emitted as the request body is consumed. The
    /// terminal result is always an [`UploadOutcome`]; transport-level
    /// failures are folded into the outcome taxonomy.
    pub async fn upload(
        &self,
        file: AttachmentFile,
        progress: mpsc::UnboundedSender<UploadProgressUpdate>,
    ) -> UploadOutcome {
        let url = format!("{}/compose/attachment", self.base_url);
        let form = Form::new().part(UPLOAD_FIELD_NAME, build_upload_part(&file, progress));

        let response = match self.client.post(url).multipart(form).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!("Attachment upload transport failed: {error}");
                return UploadOutcome::TransportFailed;
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => classify_upload_response(status, &body),
            Err(error) => {
                tracing::debug!("Failed to read upload response body: {error}");
                UploadOutcome::TransportFailed
            }
        }
    }

    /// Dispatch a removal notice for a server-held attachment.
    ///
    /// The response body is not interpreted; a non-success status maps to
    /// an error so callers can log it.
    pub async fn remove(&self, remote_id: &RemoteAttachmentId) -> Result<()> {
        let url = format!(
            "{}/compose/attachment/{}/remove",
            self.base_url,
            urlencoding::encode(remote_id.as_str())
        );
        let response = self.client.post(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "Removal notice failed with HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadTransport for ComposeApiClient {
    async fn upload(
        &self,
        file: AttachmentFile,
        progress: mpsc::UnboundedSender<UploadProgressUpdate>,
    ) -> UploadOutcome {
        ComposeApiClient::upload(self, file, progress).await
    }

    async fn remove(&self, remote_id: RemoteAttachmentId) {
        if let Err(error) = ComposeApiClient::remove(self, &remote_id).await {
            tracing::warn!("Failed to remove remote attachment {remote_id}: {error}");
        }
    }
}

/// Build the multipart file part backed by a progress-counting stream.
fn build_upload_part(
    file: &AttachmentFile,
    progress: mpsc::UnboundedSender<UploadProgressUpdate>,
) -> Part {
    let total = file.size_bytes();
    let make_part = |progress: mpsc::UnboundedSender<UploadProgressUpdate>| {
        let body = Body::wrap_stream(progress_chunks(file.bytes.clone(), total, progress));
        Part::stream_with_length(body, total).file_name(file.filename.clone())
    };

    match &file.mime_type {
        Some(mime) => match make_part(progress.clone()).mime_str(mime) {
            Ok(part) => part,
            // unparseable type from the selection surface: let the server sniff
            Err(_) => make_part(progress),
        },
        None => make_part(progress),
    }
}

/// Chunk the payload, reporting cumulative progress as the transport
/// consumes each chunk.
fn progress_chunks(
    bytes: Vec<u8>,
    total: u64,
    progress: mpsc::UnboundedSender<UploadProgressUpdate>,
) -> impl stream::Stream<Item = std::io::Result<Vec<u8>>> {
    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_BYTES).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;
    stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        let _ = progress.send(UploadProgressUpdate {
            bytes_sent: sent,
            bytes_total: total,
        });
        Ok(chunk)
    })
}

/// Classify a terminal upload response.
///
/// A non-success status is a failure regardless of body content; a success
/// status with an uninterpretable body is a protocol error, never a
/// success. The success payload's first element is the remote identifier.
fn classify_upload_response(status: StatusCode, body: &str) -> UploadOutcome {
    if !status.is_success() {
        return match serde_json::from_str::<UploadErrorBody>(body) {
            Ok(UploadErrorBody {
                error: Some(message),
            }) => UploadOutcome::Rejected { message },
            _ => UploadOutcome::MalformedResponse,
        };
    }

    let Ok(ids) = serde_json::from_str::<Vec<String>>(body) else {
        return UploadOutcome::MalformedResponse;
    };
    match ids.into_iter().next().map(RemoteAttachmentId::new) {
        Some(Ok(remote_id)) => UploadOutcome::Completed { remote_id },
        _ => UploadOutcome::MalformedResponse,
    }
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    error: Option<String>,
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(Error::InvalidConfiguration(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(Error::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}
