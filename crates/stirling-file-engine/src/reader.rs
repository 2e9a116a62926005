//! Share bundle reader
//!
//! The inverse of the builder: probe for the manifest, validate it, extract
//! every declared entry in manifest order. Bytes without a manifest are not
//! an error; they are simply a plain file and the caller treats them as such.

use crate::error::{EngineError, Result};
use crate::manifest::{BundleEntry, BundleManifest, MANIFEST_NAME};
use crate::store::StubStore;
use crate::types::{FileId, FileStub, RemoteLink};
use chrono::Utc;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use stirling_blob_store::{BlobMetadata, BlobStore};
use tracing::info;
use zip::result::ZipError;
use zip::ZipArchive;

/// One file extracted from a bundle, tagged with its manifest metadata.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub name: String,
    pub content_type: String,
    pub last_modified: i64,
    pub bytes: Vec<u8>,
    pub entry: BundleEntry,
}

/// A parsed bundle: manifest, authoritative root order, and the extracted
/// files in per-root version order.
#[derive(Debug)]
pub struct ShareBundle {
    pub manifest: BundleManifest,
    pub root_order: Vec<FileId>,
    pub files: Vec<ExtractedFile>,
}

impl ShareBundle {
    /// The highest-version file of each root, in root order. Because `files`
    /// is sorted ascending per root, that is simply the last file seen per
    /// root while iterating.
    pub fn latest_per_root(&self) -> Vec<&ExtractedFile> {
        self.root_order
            .iter()
            .filter_map(|root| {
                self.files
                    .iter()
                    .filter(|f| self.manifest.entry_root(&f.entry) == root)
                    .next_back()
            })
            .collect()
    }
}

/// Parse archive bytes into a [`ShareBundle`].
///
/// Returns `Ok(None)` when the bytes are not a bundle (not a ZIP, or a ZIP
/// without `stirling-share.json`) - graceful degradation, the caller keeps
/// the bytes as a single plain file. A manifest row whose archive entry is
/// missing is a hard error: the bundle is corrupt and must not be silently
/// truncated.
pub fn read_bundle(bytes: &[u8]) -> Result<Option<ShareBundle>> {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(_) => return Ok(None),
    };

    let manifest_text = match archive.by_name(MANIFEST_NAME) {
        Ok(mut entry) => {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            text
        }
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let manifest: BundleManifest =
        serde_json::from_str(&manifest_text).map_err(EngineError::InvalidManifest)?;

    let root_order = manifest.root_order();
    let sorted_entries = manifest.sorted_entries();

    let mut files = Vec::with_capacity(sorted_entries.len());
    for entry in sorted_entries {
        let mut archived = archive.by_name(&entry.file_path).map_err(|e| match e {
            ZipError::FileNotFound => EngineError::CorruptBundle(entry.file_path.clone()),
            other => other.into(),
        })?;
        let mut bytes = Vec::with_capacity(entry.size as usize);
        archived.read_to_end(&mut bytes)?;
        drop(archived);

        files.push(ExtractedFile {
            name: entry.name.clone(),
            content_type: entry.mime_type.clone(),
            last_modified: entry.last_modified,
            bytes,
            entry,
        });
    }

    info!(
        op = "bundle.read.ok",
        roots = root_order.len(),
        files = files.len()
    );

    Ok(Some(ShareBundle {
        manifest,
        root_order,
        files,
    }))
}

/// Rebuild a downloaded bundle's chains in the local store under fresh ids,
/// storing each revision's bytes in the blob store and stamping remote
/// linkage when given. Returns the new ids of the latest revision per root,
/// in root order - the files a caller would open.
pub fn import_bundle(
    store: &mut StubStore,
    blobs: &dyn BlobStore,
    bundle: &ShareBundle,
    remote: Option<RemoteLink>,
) -> Result<Vec<FileId>> {
    // Ids inside the bundle belong to the sender; mint fresh local ids and
    // remap the parent/root links through this table.
    let id_map: HashMap<FileId, FileId> = bundle
        .files
        .iter()
        .map(|f| (f.entry.logical_id.clone(), FileId::new()))
        .collect();

    for file in &bundle.files {
        let new_id = id_map[&file.entry.logical_id].clone();

        blobs.put_bytes(
            new_id.as_str(),
            &file.bytes,
            BlobMetadata::new(
                file.name.as_str(),
                file.content_type.as_str(),
                file.bytes.len() as u64,
                file.last_modified,
            ),
        )?;

        let entry_root = bundle.manifest.entry_root(&file.entry);
        // A mapped root that is this file itself means "I am the root"; a
        // root missing from the bundle degrades the file to a local root.
        let original_file_id = match id_map.get(entry_root) {
            Some(mapped) if *mapped != new_id => Some(mapped.clone()),
            _ => None,
        };
        let parent_file_id = file
            .entry
            .parent_logical_id
            .as_ref()
            .and_then(|p| id_map.get(p))
            .cloned();

        let mut stub = FileStub {
            id: new_id,
            name: file.name.clone(),
            mime_type: file.content_type.clone(),
            size: file.bytes.len() as u64,
            last_modified: file.last_modified,
            quick_key: crate::quickkey::quick_key(
                &file.name,
                file.bytes.len() as u64,
                file.last_modified,
            ),
            created_at: Utc::now().timestamp_millis(),
            original_file_id,
            parent_file_id,
            version_number: file.entry.version_number,
            is_leaf: file.entry.is_leaf,
            tool_history: file.entry.tool_history.clone().unwrap_or_default(),
            remote_storage_id: None,
            remote_storage_updated_at: None,
            remote_owned_by_current_user: true,
            remote_shared_via_link: false,
        };
        if let Some(link) = &remote {
            stub.apply_remote_link(link);
        }

        store.insert_imported(stub);
    }

    store.commit_import()?;

    let latest_ids = bundle
        .latest_per_root()
        .into_iter()
        .map(|f| id_map[&f.entry.logical_id].clone())
        .collect();

    info!(
        op = "bundle.import.ok",
        files = bundle.files.len(),
        roots = bundle.root_order.len()
    );

    Ok(latest_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleBuilder;
    use crate::history::{chain_leaf, history_chain};
    use crate::types::{RemoteFileId, RotateParams, ToolOperation};
    use std::io::Write;
    use stirling_blob_store::FilesystemBlobStore;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn rotate() -> ToolOperation {
        ToolOperation::Rotate(RotateParams { degrees: 90 })
    }

    fn put(blobs: &FilesystemBlobStore, stub: &FileStub, bytes: &[u8]) {
        blobs
            .put_bytes(
                stub.id.as_str(),
                bytes,
                BlobMetadata::new(
                    stub.name.as_str(),
                    stub.mime_type.as_str(),
                    bytes.len() as u64,
                    stub.last_modified,
                ),
            )
            .unwrap();
    }

    /// Two chains: a.pdf (v1 500B -> v2 600B) and b.pdf (v1 only).
    fn fixture() -> (TempDir, StubStore, FilesystemBlobStore, FileId, FileId) {
        let tmp = TempDir::new().unwrap();
        let mut store = StubStore::open(tmp.path()).unwrap();
        let blobs = FilesystemBlobStore::new(tmp.path().join("blobs"));

        let a = store
            .insert_root(FileStub::new_root("a.pdf", "application/pdf", 500, 0), false)
            .unwrap();
        put(&blobs, store.get(&a).unwrap(), &[0xAAu8; 500]);
        let v2 = store
            .append_revision(&a, rotate(), "a_v2.pdf", "application/pdf", 600, 1)
            .unwrap();
        put(&blobs, &v2, &[0xABu8; 600]);

        let b = store
            .insert_root(FileStub::new_root("b.pdf", "application/pdf", 300, 0), false)
            .unwrap();
        put(&blobs, store.get(&b).unwrap(), &[0xBBu8; 300]);

        (tmp, store, blobs, a, b)
    }

    #[test]
    fn test_round_trip_latest_per_root() {
        let (_tmp, store, blobs, a, b) = fixture();
        let snap = store.snapshot();

        let built = BundleBuilder::new(&snap, &blobs)
            .build_history_bundle(&[a.clone(), b.clone()])
            .unwrap();
        let bundle = read_bundle(&built.bytes).unwrap().expect("is a bundle");

        assert_eq!(bundle.root_order, vec![a, b]);
        assert_eq!(bundle.files.len(), 3);

        let latest = bundle.latest_per_root();
        assert_eq!(latest.len(), 2);
        // Latest of chain a is v2, byte-identical to the stored leaf bytes.
        assert_eq!(latest[0].name, "a_v2.pdf");
        assert_eq!(latest[0].bytes, vec![0xABu8; 600]);
        assert_eq!(latest[1].name, "b.pdf");
        assert_eq!(latest[1].bytes, vec![0xBBu8; 300]);
    }

    #[test]
    fn test_multi_root_order_never_resorted() {
        let (_tmp, store, blobs, a, b) = fixture();
        let snap = store.snapshot();

        // b first despite a being larger and alphabetically earlier.
        let built = BundleBuilder::new(&snap, &blobs)
            .build_history_bundle(&[b.clone(), a.clone()])
            .unwrap();
        let bundle = read_bundle(&built.bytes).unwrap().unwrap();

        let latest: Vec<&str> = bundle.latest_per_root().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(latest, vec!["b.pdf", "a_v2.pdf"]);
    }

    #[test]
    fn test_plain_bytes_degrade_gracefully() {
        assert!(read_bundle(b"%PDF-1.7 not a zip at all").unwrap().is_none());
    }

    #[test]
    fn test_zip_without_manifest_is_not_a_bundle() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("some.pdf", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"pdf bytes").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(read_bundle(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_declared_entry_missing_from_archive_is_corrupt() {
        let (_tmp, store, blobs, a, _b) = fixture();
        let snap = store.snapshot();
        let built = BundleBuilder::new(&snap, &blobs)
            .build_history_bundle(std::slice::from_ref(&a))
            .unwrap();

        // Re-author the archive with the manifest only: every declared row
        // now points at a missing entry.
        let manifest_json = serde_json::to_vec_pretty(&built.manifest).unwrap();
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(MANIFEST_NAME, SimpleFileOptions::default()).unwrap();
        writer.write_all(&manifest_json).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = read_bundle(&bytes).unwrap_err();
        assert!(matches!(err, EngineError::CorruptBundle(_)));
    }

    #[test]
    fn test_garbled_manifest_is_an_error() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(MANIFEST_NAME, SimpleFileOptions::default()).unwrap();
        writer.write_all(b"{ not json").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = read_bundle(&bytes).unwrap_err();
        assert!(matches!(err, EngineError::InvalidManifest(_)));
    }

    #[test]
    fn test_import_rebuilds_chains_under_fresh_ids() {
        let (_tmp, store, blobs, a, b) = fixture();
        let snap = store.snapshot();
        let built = BundleBuilder::new(&snap, &blobs)
            .build_history_bundle(&[a.clone(), b.clone()])
            .unwrap();
        let bundle = read_bundle(&built.bytes).unwrap().unwrap();

        // Import into a separate device's store.
        let dest = TempDir::new().unwrap();
        let mut dest_store = StubStore::open(dest.path()).unwrap();
        let dest_blobs = FilesystemBlobStore::new(dest.path().join("blobs"));

        let link = RemoteLink {
            remote_id: RemoteFileId::new(7),
            updated_at: 123,
            owned_by_current_user: false,
            shared_via_link: true,
        };
        let latest = import_bundle(&mut dest_store, &dest_blobs, &bundle, Some(link)).unwrap();

        assert_eq!(latest.len(), 2);
        assert_eq!(dest_store.len(), 3);
        // Fresh ids, not the sender's.
        assert!(dest_store.get(&a).is_none());

        let imported_leaf = dest_store.get(&latest[0]).unwrap();
        assert_eq!(imported_leaf.name, "a_v2.pdf");
        assert_eq!(imported_leaf.remote_storage_id, Some(RemoteFileId::new(7)));
        assert!(!imported_leaf.remote_owned_by_current_user);

        // Chain links survived the id remap.
        let dest_snap = dest_store.snapshot();
        let chain = history_chain(&dest_snap, &latest[0]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].version_number, 1);
        assert_eq!(chain_leaf(&chain).unwrap().id, latest[0]);

        // Bytes landed in the destination blob store.
        assert_eq!(dest_blobs.get_bytes(latest[0].as_str()).unwrap(), vec![0xABu8; 600]);
    }
}
