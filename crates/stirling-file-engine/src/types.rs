//! Core data model - revision identifiers, tool operations, file stubs

use crate::quickkey::quick_key;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque unique identifier for one logical file revision. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier assigned by the remote storage endpoint. Shared by every
/// revision of an uploaded chain; kept distinct from [`FileId`] so the two
/// id spaces can never be crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteFileId(i64);

impl RemoteFileId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RemoteFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tool Operations
// =============================================================================

/// One transform applied to reach a revision, with its typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "toolId", content = "parameters", rename_all = "camelCase")]
pub enum ToolOperation {
    Compress(CompressParams),
    Rotate(RotateParams),
    Split(SplitParams),
    Merge(MergeParams),
    Ocr(OcrParams),
    Watermark(WatermarkParams),
    Redact(RedactParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressParams {
    /// 1 (max compression) to 9 (best quality)
    pub quality: u8,
    #[serde(default)]
    pub grayscale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateParams {
    /// Clockwise rotation, multiple of 90
    pub degrees: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitParams {
    /// 1-based page numbers to split before
    pub split_points: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeParams {
    /// Number of source documents merged into this one
    pub source_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrParams {
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkParams {
    pub text: String,
    #[serde(default)]
    pub opacity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactParams {
    /// Number of regions redacted
    pub region_count: u32,
}

// =============================================================================
// File Stub
// =============================================================================

/// Remote linkage metadata stamped onto a chain after a successful upload.
#[derive(Debug, Clone, Copy)]
pub struct RemoteLink {
    pub remote_id: RemoteFileId,
    /// Epoch millis reported by the server
    pub updated_at: i64,
    pub owned_by_current_user: bool,
    pub shared_via_link: bool,
}

fn default_true() -> bool {
    true
}

/// Lightweight metadata record for one file revision, distinct from its bytes.
///
/// Revisions form a chain: the root has no parent and version 1; each tool
/// output appends a child with the version incremented by one. Exactly one
/// stub per chain is the leaf (the current tip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStub {
    pub id: FileId,
    pub name: String,
    /// MIME content type of the revision bytes
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    /// Last-modified timestamp of the source file (epoch millis)
    pub last_modified: i64,
    /// Dedup fingerprint: `name|size|lastModified`
    pub quick_key: String,
    /// When this stub was created (epoch millis)
    pub created_at: i64,
    /// Root of this revision's chain; `None` means this stub IS the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_id: Option<FileId>,
    /// Immediate predecessor revision; `None` for the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_file_id: Option<FileId>,
    /// 1-based position in the chain
    pub version_number: u32,
    /// True if no known successor exists yet
    pub is_leaf: bool,
    /// Operations applied to reach this revision, accumulated from the parent
    #[serde(default)]
    pub tool_history: Vec<ToolOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_storage_id: Option<RemoteFileId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_storage_updated_at: Option<i64>,
    #[serde(default = "default_true")]
    pub remote_owned_by_current_user: bool,
    #[serde(default)]
    pub remote_shared_via_link: bool,
}

impl FileStub {
    /// Stub for a freshly imported file: chain root, version 1, current leaf.
    pub fn new_root(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        last_modified: i64,
    ) -> Self {
        let name = name.into();
        Self {
            id: FileId::new(),
            quick_key: quick_key(&name, size, last_modified),
            name,
            mime_type: mime_type.into(),
            size,
            last_modified,
            created_at: Utc::now().timestamp_millis(),
            original_file_id: None,
            parent_file_id: None,
            version_number: 1,
            is_leaf: true,
            tool_history: Vec::new(),
            remote_storage_id: None,
            remote_storage_updated_at: None,
            remote_owned_by_current_user: true,
            remote_shared_via_link: false,
        }
    }

    /// Stub for a tool output derived from `parent`. Appends the operation to
    /// the inherited tool history and increments the version; the caller (the
    /// stub store) is responsible for clearing the parent's leaf flag.
    pub fn child_of(
        parent: &FileStub,
        operation: ToolOperation,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        last_modified: i64,
    ) -> Self {
        let name = name.into();
        let mut tool_history = parent.tool_history.clone();
        tool_history.push(operation);

        Self {
            id: FileId::new(),
            quick_key: quick_key(&name, size, last_modified),
            name,
            mime_type: mime_type.into(),
            size,
            last_modified,
            created_at: Utc::now().timestamp_millis(),
            original_file_id: Some(parent.root_id().clone()),
            parent_file_id: Some(parent.id.clone()),
            version_number: parent.version_number + 1,
            is_leaf: true,
            tool_history,
            remote_storage_id: parent.remote_storage_id,
            remote_storage_updated_at: parent.remote_storage_updated_at,
            remote_owned_by_current_user: parent.remote_owned_by_current_user,
            remote_shared_via_link: parent.remote_shared_via_link,
        }
    }

    /// The root id of this stub's chain (its own id when it is the root).
    pub fn root_id(&self) -> &FileId {
        self.original_file_id.as_ref().unwrap_or(&self.id)
    }

    pub fn is_root(&self) -> bool {
        self.parent_file_id.is_none()
    }

    /// Apply remote linkage from a completed upload.
    pub fn apply_remote_link(&mut self, link: &RemoteLink) {
        self.remote_storage_id = Some(link.remote_id);
        self.remote_storage_updated_at = Some(link.updated_at);
        self.remote_owned_by_current_user = link.owned_by_current_user;
        self.remote_shared_via_link = link.shared_via_link;
    }
}
