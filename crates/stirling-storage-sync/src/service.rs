//! Upload / reconciliation service
//!
//! Packages history chains for the remote store and reconciles the response.
//! The whole operation is all-or-nothing: chain resolution and payload
//! assembly happen before the first network call, and nothing is stamped
//! locally until the caller receives a successful outcome.

use crate::client::{normalize_updated_at, FilePart, RemoteStorageClient, UploadPayload};
use crate::error::{Result, SyncError};
use stirling_blob_store::{BlobError, BlobStore};
use stirling_file_engine::{
    chain_leaf, history_chain, BundleBuilder, EngineError, FileId, FileSnapshot, FileStub,
    RemoteFileId, RemoteLink,
};
use tracing::info;

const FLAT_BUNDLE_NAME: &str = "stirling-files.zip";
const HISTORY_BUNDLE_NAME: &str = "stirling-history.zip";
const AUDIT_LOG_NAME: &str = "stirling-audit-log.json";
const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Result of a completed upload. `chain` is the combined, de-duplicated stub
/// list across every uploaded root, so the caller can stamp each stub with
/// the chain-wide remote linkage.
#[derive(Debug)]
pub struct ChainUploadOutcome {
    pub remote_id: RemoteFileId,
    /// Normalized server `updatedAt`, epoch millis
    pub updated_at: i64,
    pub chain: Vec<FileStub>,
}

impl ChainUploadOutcome {
    /// Linkage record to persist onto every stub in `chain`.
    pub fn remote_link(&self) -> RemoteLink {
        RemoteLink {
            remote_id: self.remote_id,
            updated_at: self.updated_at,
            owned_by_current_user: true,
            shared_via_link: false,
        }
    }
}

/// Drives uploads against a [`RemoteStorageClient`].
pub struct UploadService<'a> {
    client: &'a dyn RemoteStorageClient,
}

impl<'a> UploadService<'a> {
    pub fn new(client: &'a dyn RemoteStorageClient) -> Self {
        Self { client }
    }

    /// Upload a single history chain. With `existing` set the remote copy is
    /// replaced in place and keeps its id; otherwise a new remote file is
    /// created and its id captured from the response.
    pub async fn upload_chain(
        &self,
        snapshot: &FileSnapshot,
        blobs: &dyn BlobStore,
        id: &FileId,
        existing: Option<RemoteFileId>,
    ) -> Result<ChainUploadOutcome> {
        self.upload_chains(snapshot, blobs, std::slice::from_ref(id), existing)
            .await
    }

    /// Upload one or more history chains as a single remote file.
    ///
    /// The primary payload is the leaf's raw bytes for a single chain, or an
    /// ad-hoc bundle of all leaves for several, so the server always receives
    /// exactly one coherent artifact. A full history bundle and the
    /// pretty-printed manifest (as audit log) are always attached.
    pub async fn upload_chains(
        &self,
        snapshot: &FileSnapshot,
        blobs: &dyn BlobStore,
        ids: &[FileId],
        existing: Option<RemoteFileId>,
    ) -> Result<ChainUploadOutcome> {
        if ids.is_empty() {
            return Err(SyncError::NoFiles);
        }

        // Resolve every chain up front; an unresolvable id aborts the whole
        // operation before any bytes move.
        let mut chains: Vec<Vec<FileStub>> = Vec::new();
        let mut seen_roots: Vec<FileId> = Vec::new();
        for id in ids {
            let chain = history_chain(snapshot, id);
            if chain.is_empty() {
                return Err(EngineError::ChainNotFound(id.clone()).into());
            }
            let root = chain[0].root_id().clone();
            if seen_roots.contains(&root) {
                continue;
            }
            seen_roots.push(root);
            chains.push(chain);
        }

        let mut leaves: Vec<FileStub> = Vec::new();
        let mut combined: Vec<FileStub> = Vec::new();
        for chain in &chains {
            let leaf = chain_leaf(chain)
                .ok_or_else(|| EngineError::ChainNotFound(chain[0].id.clone()))?;
            leaves.push(leaf.clone());
            combined.extend(chain.iter().cloned());
        }

        let builder = BundleBuilder::new(snapshot, blobs);
        let history = builder.build_history_bundle(ids)?;
        let audit_bytes = serde_json::to_vec_pretty(&history.manifest)?;

        let file = if leaves.len() == 1 {
            let leaf = &leaves[0];
            let bytes = blobs.get_bytes(leaf.id.as_str()).map_err(|e| match e {
                BlobError::NotFound(_) => EngineError::MissingFileData(leaf.name.clone()),
                other => EngineError::from(other),
            })?;
            FilePart {
                file_name: leaf.name.clone(),
                content_type: leaf.mime_type.clone(),
                bytes,
            }
        } else {
            let flat = builder.build_flat_bundle(&leaves)?;
            FilePart {
                file_name: FLAT_BUNDLE_NAME.to_string(),
                content_type: ZIP_CONTENT_TYPE.to_string(),
                bytes: flat.bytes,
            }
        };

        let payload = UploadPayload {
            file,
            history_bundle: FilePart {
                file_name: HISTORY_BUNDLE_NAME.to_string(),
                content_type: ZIP_CONTENT_TYPE.to_string(),
                bytes: history.bytes,
            },
            audit_log: FilePart {
                file_name: AUDIT_LOG_NAME.to_string(),
                content_type: "application/json".to_string(),
                bytes: audit_bytes,
            },
        };

        let response = match existing {
            Some(remote_id) => self.client.update_file(remote_id, payload).await?,
            None => self.client.create_file(payload).await?,
        };

        let remote_id = match existing {
            Some(remote_id) => remote_id,
            None => response
                .id
                .map(RemoteFileId::new)
                .ok_or(SyncError::MissingRemoteId)?,
        };
        let updated_at = normalize_updated_at(response.updated_at.as_ref());

        info!(
            op = "storage.upload.ok",
            remote_id = %remote_id,
            roots = chains.len(),
            revisions = combined.len(),
            updated = existing.is_some()
        );

        Ok(ChainUploadOutcome {
            remote_id,
            updated_at,
            chain: combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use stirling_blob_store::{BlobMetadata, FilesystemBlobStore};
    use stirling_file_engine::{
        read_bundle, RotateParams, StubStore, ToolOperation,
    };
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy)]
    enum Call {
        Create,
        Update(RemoteFileId),
    }

    /// Test double recording calls and replaying canned responses.
    struct MockClient {
        calls: Mutex<Vec<Call>>,
        payloads: Mutex<Vec<UploadPayload>>,
        create_response: crate::client::StoredFileResponse,
    }

    impl MockClient {
        fn new(create_response: crate::client::StoredFileResponse) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                payloads: Mutex::new(Vec::new()),
                create_response,
            }
        }

        fn with_fresh_id(id: i64) -> Self {
            Self::new(crate::client::StoredFileResponse {
                id: Some(id),
                updated_at: Some(serde_json::json!(1_700_000_000_000i64)),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteStorageClient for MockClient {
        async fn create_file(
            &self,
            payload: UploadPayload,
        ) -> crate::error::Result<crate::client::StoredFileResponse> {
            self.calls.lock().unwrap().push(Call::Create);
            self.payloads.lock().unwrap().push(payload);
            Ok(self.create_response.clone())
        }

        async fn update_file(
            &self,
            id: RemoteFileId,
            payload: UploadPayload,
        ) -> crate::error::Result<crate::client::StoredFileResponse> {
            self.calls.lock().unwrap().push(Call::Update(id));
            self.payloads.lock().unwrap().push(payload);
            // Update responses carry updatedAt only.
            Ok(crate::client::StoredFileResponse {
                id: None,
                updated_at: Some(serde_json::json!("2024-01-01T00:00:00Z")),
            })
        }
    }

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

    /// Chain a.pdf v1 (500B) -> a_v2.pdf v2 (600B), plus single-revision b.pdf.
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

    #[tokio::test]
    async fn test_create_then_idempotent_update() {
        let (_tmp, mut store, blobs, a, _b) = fixture();
        let snap = store.snapshot();

        let client = MockClient::with_fresh_id(42);
        let service = UploadService::new(&client);

        // First upload: no existing id, create path assigns one.
        let outcome = service.upload_chain(&snap, &blobs, &a, None).await.unwrap();
        assert_eq!(outcome.remote_id, RemoteFileId::new(42));
        assert_eq!(outcome.updated_at, 1_700_000_000_000);
        assert_eq!(outcome.chain.len(), 2);

        // Caller stamps the whole chain.
        let stamped = store.set_remote_link(&a, &outcome.remote_link()).unwrap();
        assert_eq!(stamped, 2);

        // Second upload with the assigned id replaces in place, same id back.
        let snap = store.snapshot();
        let outcome = service
            .upload_chain(&snap, &blobs, &a, Some(RemoteFileId::new(42)))
            .await
            .unwrap();
        assert_eq!(outcome.remote_id, RemoteFileId::new(42));
        assert_eq!(outcome.updated_at, 1_704_067_200_000);

        let calls = client.calls.lock().unwrap();
        assert!(matches!(calls[0], Call::Create));
        assert!(matches!(calls[1], Call::Update(id) if id == RemoteFileId::new(42)));
    }

    #[tokio::test]
    async fn test_single_chain_primary_is_leaf_bytes() {
        let (_tmp, store, blobs, a, _b) = fixture();
        let snap = store.snapshot();

        let client = MockClient::with_fresh_id(1);
        let service = UploadService::new(&client);
        service.upload_chain(&snap, &blobs, &a, None).await.unwrap();

        let payloads = client.payloads.lock().unwrap();
        let payload = &payloads[0];
        assert_eq!(payload.file.file_name, "a_v2.pdf");
        assert_eq!(payload.file.bytes, vec![0xABu8; 600]);

        // History bundle carries the full chain, not just the leaf.
        let history = read_bundle(&payload.history_bundle.bytes).unwrap().unwrap();
        assert_eq!(history.files.len(), 2);

        // Audit log is the pretty-printed manifest.
        let audit: serde_json::Value = serde_json::from_slice(&payload.audit_log.bytes).unwrap();
        assert_eq!(audit["schemaVersion"], 1);
        assert_eq!(audit["entries"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_multi_root_primary_is_leaf_bundle() {
        let (_tmp, store, blobs, a, b) = fixture();
        let snap = store.snapshot();

        let client = MockClient::with_fresh_id(9);
        let service = UploadService::new(&client);
        let outcome = service
            .upload_chains(&snap, &blobs, &[a.clone(), b.clone()], None)
            .await
            .unwrap();
        assert_eq!(outcome.chain.len(), 3);

        let payloads = client.payloads.lock().unwrap();
        let payload = &payloads[0];
        assert_eq!(payload.file.content_type, "application/zip");

        // The primary artifact is itself a readable bundle of the two leaves.
        let primary = read_bundle(&payload.file.bytes).unwrap().unwrap();
        let latest: Vec<&str> = primary
            .latest_per_root()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(latest, vec!["a_v2.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_missing_create_id_is_an_error() {
        let (_tmp, store, blobs, a, _b) = fixture();
        let snap = store.snapshot();

        let client = MockClient::new(crate::client::StoredFileResponse {
            id: None,
            updated_at: None,
        });
        let service = UploadService::new(&client);

        let err = service.upload_chain(&snap, &blobs, &a, None).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingRemoteId));
    }

    #[tokio::test]
    async fn test_unresolvable_chain_aborts_before_network() {
        let (_tmp, store, blobs, _a, _b) = fixture();
        let snap = store.snapshot();

        let client = MockClient::with_fresh_id(1);
        let service = UploadService::new(&client);

        let err = service
            .upload_chain(&snap, &blobs, &FileId::from("ghost"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Engine(EngineError::ChainNotFound(_))));
        assert_eq!(client.call_count(), 0);

        let err = service.upload_chains(&snap, &blobs, &[], None).await.unwrap_err();
        assert!(matches!(err, SyncError::NoFiles));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_leaf_bytes_abort_before_network() {
        let tmp = TempDir::new().unwrap();
        let mut store = StubStore::open(tmp.path()).unwrap();
        let blobs = FilesystemBlobStore::new(tmp.path().join("blobs"));
        let a = store
            .insert_root(FileStub::new_root("a.pdf", "application/pdf", 500, 0), false)
            .unwrap();
        // Stub tracked but blob never stored.

        let snap = store.snapshot();
        let client = MockClient::with_fresh_id(1);
        let service = UploadService::new(&client);

        let err = service.upload_chain(&snap, &blobs, &a, None).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Engine(EngineError::MissingFileData(name)) if name == "a.pdf"
        ));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_chain_ids_collapse() {
        let (_tmp, store, blobs, a, _b) = fixture();
        let snap = store.snapshot();

        let client = MockClient::with_fresh_id(5);
        let service = UploadService::new(&client);

        // Root and leaf of the same chain: one chain, one leaf payload.
        let leaf_id = store
            .all()
            .iter()
            .find(|s| s.is_leaf && s.root_id() == &a)
            .map(|s| s.id.clone())
            .unwrap();
        let outcome = service
            .upload_chains(&snap, &blobs, &[a.clone(), leaf_id], None)
            .await
            .unwrap();
        assert_eq!(outcome.chain.len(), 2);

        let payloads = client.payloads.lock().unwrap();
        assert_eq!(payloads[0].file.file_name, "a_v2.pdf");
    }
}
