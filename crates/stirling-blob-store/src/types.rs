//! Blob store types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing one stored blob (persisted as a sidecar JSON file).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// Original filename of the revision bytes
    pub name: String,
    /// MIME content type
    pub content_type: String,
    /// Raw content size in bytes
    pub size: u64,
    /// Last-modified timestamp of the source file (epoch millis)
    pub last_modified: i64,
    /// SHA256 hash of raw content
    #[serde(default)]
    pub sha256: String,
    /// Whether content is gzip compressed on disk
    #[serde(default)]
    pub compressed: bool,
    /// When the blob was written
    pub created_at: DateTime<Utc>,
}

impl BlobMetadata {
    /// Metadata for a fresh write; hash and compression flag are filled in by
    /// the store.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, size: u64, last_modified: i64) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
            last_modified,
            sha256: String::new(),
            compressed: false,
            created_at: Utc::now(),
        }
    }
}

/// Summary returned from a successful put.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub id: String,
    pub sha256: String,
    /// Raw content size
    pub bytes_raw: usize,
    /// On-disk size (after compression)
    pub bytes_stored: usize,
}

/// Aggregate storage usage.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Raw bytes across all blobs
    pub used_bytes: u64,
    pub blob_count: usize,
}
