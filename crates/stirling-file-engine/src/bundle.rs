//! Share bundle builder
//!
//! Serializes one or more history chains (or an ad-hoc stub list) into a
//! deflate-compressed ZIP with the manifest at the archive root. Building is
//! all-or-nothing: a single missing blob aborts the whole bundle rather than
//! producing a truncated artifact.

use crate::error::{EngineError, Result};
use crate::history::history_chain;
use crate::manifest::{BundleEntry, BundleManifest, MANIFEST_NAME, MANIFEST_SCHEMA_VERSION};
use crate::store::FileSnapshot;
use crate::types::{FileId, FileStub};
use chrono::Utc;
use std::io::{Cursor, Write};
use stirling_blob_store::{BlobError, BlobStore};
use tracing::info;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Deflate level traded between CPU and size.
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

/// A built bundle: the archive bytes plus the manifest that went into it.
#[derive(Debug)]
pub struct BuiltBundle {
    pub bytes: Vec<u8>,
    pub manifest: BundleManifest,
}

/// Builds share bundles from a snapshot and the blob store holding the
/// revision bytes.
pub struct BundleBuilder<'a> {
    snapshot: &'a FileSnapshot,
    blobs: &'a dyn BlobStore,
    compression_level: i64,
}

impl<'a> BundleBuilder<'a> {
    pub fn new(snapshot: &'a FileSnapshot, blobs: &'a dyn BlobStore) -> Self {
        Self {
            snapshot,
            blobs,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = level;
        self
    }

    /// Bundle the full history of each given chain. Ids may address any
    /// revision; they are resolved to their chain roots, kept in caller order
    /// (first occurrence wins for duplicates). Entries are emitted per root,
    /// each chain sorted by ascending version.
    pub fn build_history_bundle(&self, ids: &[FileId]) -> Result<BuiltBundle> {
        let mut root_ids: Vec<FileId> = Vec::new();
        let mut stubs: Vec<FileStub> = Vec::new();

        for id in ids {
            let chain = history_chain(self.snapshot, id);
            if chain.is_empty() {
                return Err(EngineError::ChainNotFound(id.clone()));
            }
            let root = chain[0].root_id().clone();
            if root_ids.contains(&root) {
                continue;
            }
            root_ids.push(root);
            stubs.extend(chain);
        }

        if root_ids.is_empty() {
            return Err(EngineError::MissingFileData("no files to bundle".to_string()));
        }

        self.build(root_ids, stubs)
    }

    /// Bundle an ad-hoc stub list (a non-chained share, e.g. the current
    /// leaves of several chains). Entry order follows the given order; roots
    /// are recorded first-seen.
    pub fn build_flat_bundle(&self, stubs: &[FileStub]) -> Result<BuiltBundle> {
        if stubs.is_empty() {
            return Err(EngineError::MissingFileData("no files to bundle".to_string()));
        }

        let mut root_ids: Vec<FileId> = Vec::new();
        for stub in stubs {
            let root = stub.root_id().clone();
            if !root_ids.contains(&root) {
                root_ids.push(root);
            }
        }

        self.build(root_ids, stubs.to_vec())
    }

    fn build(&self, root_ids: Vec<FileId>, stubs: Vec<FileStub>) -> Result<BuiltBundle> {
        let entries: Vec<BundleEntry> = stubs.iter().map(BundleEntry::from_stub).collect();

        let manifest = BundleManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            root_logical_id: root_ids[0].clone(),
            root_logical_ids: root_ids,
            created_at: Utc::now().timestamp_millis(),
            entries,
        };

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.compression_level));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (stub, entry) in stubs.iter().zip(&manifest.entries) {
            let bytes = self.blobs.get_bytes(stub.id.as_str()).map_err(|e| match e {
                BlobError::NotFound(_) => EngineError::MissingFileData(stub.name.clone()),
                other => other.into(),
            })?;
            writer.start_file(entry.file_path.as_str(), options)?;
            writer.write_all(&bytes)?;
        }

        writer.start_file(MANIFEST_NAME, options)?;
        writer.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

        let bytes = writer.finish()?.into_inner();

        info!(
            op = "bundle.build.ok",
            roots = manifest.root_logical_ids.len(),
            entries = manifest.entries.len(),
            bytes = bytes.len()
        );

        Ok(BuiltBundle { bytes, manifest })
    }
}
