//! Remote storage HTTP client
//!
//! The server surface is two endpoints: `POST /api/v1/storage/files` to
//! create a stored file and `PUT /api/v1/storage/files/{id}` to replace one.
//! Both take the same multipart body: the primary `file`, a full
//! `historyBundle`, and an `auditLog` JSON.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use stirling_file_engine::RemoteFileId;
use tracing::{info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Remote endpoint configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One multipart file field.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The complete upload body. The history bundle and audit log are provenance
/// and always accompany the primary payload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file: FilePart,
    pub history_bundle: FilePart,
    pub audit_log: FilePart,
}

/// Server response for create and update. Update responses carry no id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFileResponse {
    #[serde(default)]
    pub id: Option<i64>,
    /// Epoch-millis number or ISO-8601 string, depending on server version
    #[serde(default)]
    pub updated_at: Option<serde_json::Value>,
}

/// Seam to the remote store, so the upload service can be exercised against
/// a test double.
#[async_trait]
pub trait RemoteStorageClient: Send + Sync {
    async fn create_file(&self, payload: UploadPayload) -> Result<StoredFileResponse>;

    async fn update_file(
        &self,
        id: RemoteFileId,
        payload: UploadPayload,
    ) -> Result<StoredFileResponse>;
}

/// reqwest-backed client against the real endpoint.
pub struct HttpRemoteStorageClient {
    config: SyncConfig,
    client: reqwest::Client,
}

impl HttpRemoteStorageClient {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn files_url(&self) -> String {
        format!("{}/api/v1/storage/files", self.config.base_url.trim_end_matches('/'))
    }

    fn build_form(payload: UploadPayload) -> Result<Form> {
        Ok(Form::new()
            .part("file", file_part(payload.file)?)
            .part("historyBundle", file_part(payload.history_bundle)?)
            .part("auditLog", file_part(payload.audit_log)?))
    }

    async fn parse_response(response: reqwest::Response) -> Result<StoredFileResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body.chars().take(200).collect()
            };
            warn!(op = "storage.http.error", status = status.as_u16(), "Upload request failed");
            return Err(SyncError::Remote {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

fn file_part(part: FilePart) -> Result<Part> {
    Ok(Part::bytes(part.bytes)
        .file_name(part.file_name)
        .mime_str(&part.content_type)?)
}

#[async_trait]
impl RemoteStorageClient for HttpRemoteStorageClient {
    async fn create_file(&self, payload: UploadPayload) -> Result<StoredFileResponse> {
        info!(
            op = "storage.http.create",
            file = %payload.file.file_name,
            bytes = payload.file.bytes.len()
        );
        let response = self
            .client
            .post(self.files_url())
            .multipart(Self::build_form(payload)?)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_file(
        &self,
        id: RemoteFileId,
        payload: UploadPayload,
    ) -> Result<StoredFileResponse> {
        info!(
            op = "storage.http.update",
            remote_id = %id,
            file = %payload.file.file_name,
            bytes = payload.file.bytes.len()
        );
        let response = self
            .client
            .put(format!("{}/{}", self.files_url(), id))
            .multipart(Self::build_form(payload)?)
            .send()
            .await?;
        Self::parse_response(response).await
    }
}

/// Normalize the server's `updatedAt` into epoch millis. Accepts an
/// epoch-millis number or an ISO-8601 string; anything invalid or missing
/// degrades to the current local time, since the value is non-critical
/// provenance.
pub fn normalize_updated_at(value: Option<&serde_json::Value>) -> i64 {
    match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|_| Utc::now().timestamp_millis()),
        _ => Utc::now().timestamp_millis(),
    }
}
