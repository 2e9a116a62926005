//! Filesystem blob store implementation

use crate::compression::{gzip_compress, gzip_decompress, should_compress};
use crate::error::{BlobError, Result};
use crate::hash::sha256_hex;
use crate::types::{BlobMetadata, StorageStats, StoredBlob};
use crate::BlobStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const METADATA_SUFFIX: &str = ".meta.json";

/// Filesystem-backed blob store.
///
/// Layout: `<root>/<id[..2]>/<id>/blob` plus a `blob.meta.json` sidecar. Ids
/// are opaque; the two-character prefix just keeps directory fan-out sane.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Create store with given root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_dir(&self, id: &str) -> PathBuf {
        let prefix = if id.len() >= 2 { &id[..2] } else { id };
        self.root.join(prefix).join(id)
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.blob_dir(id).join("blob")
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.blob_dir(id).join(format!("blob{METADATA_SUFFIX}"))
    }
}

impl BlobStore for FilesystemBlobStore {
    fn put_bytes(&self, id: &str, content: &[u8], meta: BlobMetadata) -> Result<StoredBlob> {
        let dir = self.blob_dir(id);
        fs::create_dir_all(&dir)?;

        let sha256 = sha256_hex(content);
        let compress = should_compress(&meta.content_type);
        let stored_content = if compress {
            gzip_compress(content)?
        } else {
            content.to_vec()
        };

        fs::write(self.blob_path(id), &stored_content)?;

        let metadata = BlobMetadata {
            sha256: sha256.clone(),
            compressed: compress,
            ..meta
        };
        fs::write(self.meta_path(id), serde_json::to_string_pretty(&metadata)?)?;

        info!(
            op = "blob.put.ok",
            id = %id,
            sha256 = %sha256,
            bytes_raw = content.len(),
            compressed = compress
        );

        Ok(StoredBlob {
            id: id.to_string(),
            sha256,
            bytes_raw: content.len(),
            bytes_stored: stored_content.len(),
        })
    }

    fn get_bytes(&self, id: &str) -> Result<Vec<u8>> {
        let blob_path = self.blob_path(id);
        if !blob_path.exists() {
            return Err(BlobError::NotFound(id.to_string()));
        }

        let meta = self.head(id)?;
        let stored = fs::read(&blob_path)?;

        if meta.compressed {
            gzip_decompress(&stored)
        } else {
            Ok(stored)
        }
    }

    fn head(&self, id: &str) -> Result<BlobMetadata> {
        let meta_path = self.meta_path(id);
        if !meta_path.exists() {
            return Err(BlobError::NotFound(id.to_string()));
        }

        let meta_json = fs::read_to_string(&meta_path)?;
        Ok(serde_json::from_str(&meta_json)?)
    }

    fn delete_bytes(&self, id: &str) -> Result<()> {
        let dir = self.blob_dir(id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(op = "blob.delete.ok", id = %id);
        }
        Ok(())
    }

    fn contains(&self, id: &str) -> bool {
        self.blob_path(id).exists()
    }

    fn stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        collect_stats_recursive(&self.root, &mut stats)?;
        Ok(stats)
    }
}

/// Walk the store root and sum raw sizes from metadata sidecars.
fn collect_stats_recursive(dir: &Path, stats: &mut StorageStats) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_stats_recursive(&path, stats)?;
        } else if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(METADATA_SUFFIX))
        {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(meta) = serde_json::from_str::<BlobMetadata>(&content) {
                    stats.used_bytes += meta.size;
                    stats.blob_count += 1;
                }
            }
        }
    }
    Ok(())
}
