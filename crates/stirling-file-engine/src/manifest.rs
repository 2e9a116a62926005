//! Share bundle manifest
//!
//! Every bundle carries a `stirling-share.json` at the archive root. The
//! manifest is the source of truth for entry ordering and history links; the
//! reader never re-derives order from timestamps.

use crate::types::{FileId, FileStub, ToolOperation};
use serde::{Deserialize, Serialize};

/// Fixed manifest filename at the archive root. Probing for this entry is
/// also how consumers tell a bundle apart from a plain file.
pub const MANIFEST_NAME: &str = "stirling-share.json";

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// One manifest row per bundled revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub logical_id: FileId,
    /// Root of the revision's chain; absent in legacy single-root bundles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_logical_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_logical_id: Option<FileId>,
    pub version_number: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub last_modified: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_history: Option<Vec<ToolOperation>>,
    /// Archive-internal path of the revision bytes
    pub file_path: String,
    pub is_leaf: bool,
}

impl BundleEntry {
    /// Manifest row for a stub, with the archive path derived from its id and
    /// sanitized name.
    pub fn from_stub(stub: &FileStub) -> Self {
        Self {
            logical_id: stub.id.clone(),
            root_logical_id: Some(stub.root_id().clone()),
            parent_logical_id: stub.parent_file_id.clone(),
            version_number: stub.version_number,
            name: stub.name.clone(),
            mime_type: stub.mime_type.clone(),
            size: stub.size,
            last_modified: stub.last_modified,
            tool_history: if stub.tool_history.is_empty() {
                None
            } else {
                Some(stub.tool_history.clone())
            },
            file_path: entry_path(&stub.id, &stub.name),
            is_leaf: stub.is_leaf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub schema_version: u32,
    /// First root, kept for backward compatibility with single-root readers
    pub root_logical_id: FileId,
    /// All roots included, in caller-given order
    #[serde(default)]
    pub root_logical_ids: Vec<FileId>,
    /// Epoch millis
    pub created_at: i64,
    pub entries: Vec<BundleEntry>,
}

impl BundleManifest {
    /// Root id of an entry, falling back to the manifest-level root for
    /// legacy rows that omit it.
    pub fn entry_root<'a>(&'a self, entry: &'a BundleEntry) -> &'a FileId {
        entry.root_logical_id.as_ref().unwrap_or(&self.root_logical_id)
    }

    /// Recompute the authoritative root order: the explicit list when present
    /// and non-empty, otherwise the de-duplicated entry roots in first-seen
    /// order.
    pub fn root_order(&self) -> Vec<FileId> {
        if !self.root_logical_ids.is_empty() {
            return self.root_logical_ids.clone();
        }
        let mut order = Vec::new();
        for entry in &self.entries {
            let root = self.entry_root(entry);
            if !order.contains(root) {
                order.push(root.clone());
            }
        }
        order
    }

    /// Entries grouped per root in root order, each root's rows sorted by
    /// ascending version. Latest-per-root extraction relies on this ordering.
    pub fn sorted_entries(&self) -> Vec<BundleEntry> {
        let mut sorted = Vec::with_capacity(self.entries.len());
        for root in self.root_order() {
            let mut root_entries: Vec<BundleEntry> = self
                .entries
                .iter()
                .filter(|e| self.entry_root(e) == &root)
                .cloned()
                .collect();
            root_entries.sort_by_key(|e| e.version_number);
            sorted.extend(root_entries);
        }
        sorted
    }
}

/// Strip path separators and quoting characters from a filename for safe use
/// inside the archive. An empty result falls back to `"file"`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Archive-internal path for a revision's bytes.
pub fn entry_path(id: &FileId, name: &str) -> String {
    format!("files/{}/{}", id, sanitize_file_name(name))
}
