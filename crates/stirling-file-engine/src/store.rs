//! Stub store - durable table of file revision records
//!
//! One record per logical revision, persisted as a JSON index file sibling to
//! the blob root and written atomically (temp file + rename). All reads go
//! through an immutable [`FileSnapshot`] taken from the store; mutations are
//! the single serialized write path and must preserve the chain invariants
//! (one root per chain, gap-free versions, exactly one leaf).

use crate::error::{EngineError, Result};
use crate::quickkey::quick_key_for;
use crate::types::{FileId, FileStub, RemoteLink, ToolOperation};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current schema version for the stub index file
pub const STUB_INDEX_SCHEMA_VERSION: u32 = 1;

/// Filename of the persistent index, stored next to the blob directories
const STUB_INDEX_FILENAME: &str = "stubs-index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StubIndex {
    schema_version: u32,
    stubs: Vec<FileStub>,
}

/// Immutable view over the tracked stubs plus session UI state (selection,
/// pins). Selectors are pure functions of a snapshot; the generation counter
/// lets consumers detect staleness without deep comparison.
#[derive(Debug, Clone, Default)]
pub struct FileSnapshot {
    pub generation: u64,
    /// Tracked ids in insertion order
    pub ids: Vec<FileId>,
    pub by_id: HashMap<FileId, FileStub>,
    pub selected: Vec<FileId>,
    pub pinned: HashSet<FileId>,
}

/// Durable store of [`FileStub`] records.
pub struct StubStore {
    index_path: PathBuf,
    stubs: Vec<FileStub>,
    selected: Vec<FileId>,
    pinned: HashSet<FileId>,
    generation: u64,
}

impl StubStore {
    /// Open (or initialize) the store rooted at `dir`. A missing index file
    /// means an empty store, not an error.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let index_path = dir.as_ref().join(STUB_INDEX_FILENAME);

        let stubs = if index_path.exists() {
            let content = fs::read_to_string(&index_path)?;
            let index: StubIndex = serde_json::from_str(&content)?;
            if index.schema_version > STUB_INDEX_SCHEMA_VERSION {
                return Err(EngineError::UnsupportedSchema(index.schema_version));
            }
            info!(
                op = "stubs.load.ok",
                count = index.stubs.len(),
                schema_version = index.schema_version
            );
            index.stubs
        } else {
            info!(op = "stubs.load.not_found", "No existing stub index, starting fresh");
            Vec::new()
        };

        Ok(Self {
            index_path,
            stubs,
            selected: Vec::new(),
            pinned: HashSet::new(),
            generation: 0,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, id: &FileId) -> Option<&FileStub> {
        self.stubs.iter().find(|s| &s.id == id)
    }

    pub fn all(&self) -> &[FileStub] {
        &self.stubs
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Take an immutable snapshot for selector reads. The snapshot is a full
    /// copy; replacing it is atomic from the readers' point of view.
    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot {
            generation: self.generation,
            ids: self.stubs.iter().map(|s| s.id.clone()).collect(),
            by_id: self
                .stubs
                .iter()
                .map(|s| (s.id.clone(), s.clone()))
                .collect(),
            selected: self.selected.clone(),
            pinned: self.pinned.clone(),
        }
    }

    // =========================================================================
    // Durable mutations
    // =========================================================================

    /// Track a freshly imported file as a new chain root.
    ///
    /// Rejects the insert when another tracked stub carries the same quick
    /// key, unless `allow_duplicates` is set (bundle imports deliberately
    /// re-add files that may already exist locally).
    pub fn insert_root(&mut self, stub: FileStub, allow_duplicates: bool) -> Result<FileId> {
        debug_assert!(stub.is_root(), "insert_root requires a root stub");

        if !allow_duplicates {
            let key = quick_key_for(&stub);
            if self.stubs.iter().any(|s| s.quick_key == key) {
                return Err(EngineError::DuplicateFile(stub.name));
            }
        }

        let id = stub.id.clone();
        info!(op = "stubs.insert_root.ok", id = %id, name = %stub.name);
        self.stubs.push(stub);
        self.commit()?;
        Ok(id)
    }

    /// Append a tool output as the new leaf of `parent_id`'s chain.
    ///
    /// The parent must be the current chain leaf; its leaf flag is cleared so
    /// the chain keeps exactly one leaf.
    pub fn append_revision(
        &mut self,
        parent_id: &FileId,
        operation: ToolOperation,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        last_modified: i64,
    ) -> Result<FileStub> {
        let parent = self
            .stubs
            .iter_mut()
            .find(|s| &s.id == parent_id)
            .ok_or_else(|| EngineError::StubNotFound(parent_id.clone()))?;
        if !parent.is_leaf {
            return Err(EngineError::NotLeaf(parent_id.clone()));
        }

        let child = FileStub::child_of(parent, operation, name, mime_type, size, last_modified);
        parent.is_leaf = false;

        info!(
            op = "stubs.append.ok",
            id = %child.id,
            parent = %parent_id,
            version = child.version_number
        );
        self.stubs.push(child.clone());
        self.commit()?;
        Ok(child)
    }

    /// Apply an in-place metadata update. The closure must preserve the chain
    /// invariants; identity and link fields are not meant to be rewritten.
    pub fn update<F: FnOnce(&mut FileStub)>(&mut self, id: &FileId, apply: F) -> Result<FileStub> {
        let position = self
            .stubs
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| EngineError::StubNotFound(id.clone()))?;
        apply(&mut self.stubs[position]);
        let updated = self.stubs[position].clone();
        self.commit()?;
        Ok(updated)
    }

    /// Clear the leaf flag after a revision became tool input.
    /// Returns false when the id is unknown.
    pub fn mark_processed(&mut self, id: &FileId) -> Result<bool> {
        self.set_leaf_flag(id, false)
    }

    /// Promote a revision back to leaf status.
    /// Returns false when the id is unknown.
    pub fn mark_leaf(&mut self, id: &FileId) -> Result<bool> {
        self.set_leaf_flag(id, true)
    }

    fn set_leaf_flag(&mut self, id: &FileId, is_leaf: bool) -> Result<bool> {
        match self.stubs.iter_mut().find(|s| &s.id == id) {
            Some(stub) => {
                stub.is_leaf = is_leaf;
                self.commit()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stamp remote linkage onto every stub of the chain containing `id`.
    /// Returns the number of stamped stubs.
    pub fn set_remote_link(&mut self, id: &FileId, link: &RemoteLink) -> Result<usize> {
        let root = self
            .get(id)
            .ok_or_else(|| EngineError::ChainNotFound(id.clone()))?
            .root_id()
            .clone();

        let mut count = 0;
        for stub in self.stubs.iter_mut().filter(|s| s.root_id() == &root) {
            stub.apply_remote_link(link);
            count += 1;
        }

        info!(op = "stubs.remote_link.ok", root = %root, remote_id = %link.remote_id, count);
        self.commit()?;
        Ok(count)
    }

    /// Drop remote linkage from every stub of the chain containing `id`,
    /// e.g. after the stored copy was deleted server-side.
    pub fn clear_remote_link(&mut self, id: &FileId) -> Result<usize> {
        let root = self
            .get(id)
            .ok_or_else(|| EngineError::ChainNotFound(id.clone()))?
            .root_id()
            .clone();

        let mut count = 0;
        for stub in self.stubs.iter_mut().filter(|s| s.root_id() == &root) {
            stub.remote_storage_id = None;
            stub.remote_storage_updated_at = None;
            stub.remote_shared_via_link = false;
            count += 1;
        }
        self.commit()?;
        Ok(count)
    }

    /// Remove a single revision.
    ///
    /// Deleting an internal (non-leaf-position) revision is forbidden: a stub
    /// still referenced as some other stub's parent stays. When the removed
    /// revision was the leaf, its parent becomes the leaf again.
    pub fn remove_revision(&mut self, id: &FileId) -> Result<FileStub> {
        let position = self
            .stubs
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| EngineError::StubNotFound(id.clone()))?;

        if self
            .stubs
            .iter()
            .any(|s| s.parent_file_id.as_ref() == Some(id))
        {
            return Err(EngineError::HasDescendants(id.clone()));
        }

        let removed = self.stubs.remove(position);
        if removed.is_leaf {
            if let Some(parent_id) = &removed.parent_file_id {
                if let Some(parent) = self.stubs.iter_mut().find(|s| &s.id == parent_id) {
                    parent.is_leaf = true;
                }
            }
        }

        self.forget_ui_state(std::slice::from_ref(id));
        info!(op = "stubs.remove.ok", id = %id, version = removed.version_number);
        self.commit()?;
        Ok(removed)
    }

    /// Remove every revision of the chain containing `id`. Unknown ids remove
    /// nothing; that is not an error.
    pub fn remove_chain(&mut self, id: &FileId) -> Result<Vec<FileStub>> {
        let Some(root) = self.get(id).map(|s| s.root_id().clone()) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.stubs.len());
        for stub in self.stubs.drain(..) {
            if stub.root_id() == &root {
                removed.push(stub);
            } else {
                kept.push(stub);
            }
        }
        self.stubs = kept;

        let removed_ids: Vec<FileId> = removed.iter().map(|s| s.id.clone()).collect();
        self.forget_ui_state(&removed_ids);

        info!(op = "stubs.remove_chain.ok", root = %root, count = removed.len());
        self.commit()?;
        Ok(removed)
    }

    /// Track an already-linked stub as-is (bundle import path). The caller is
    /// responsible for consistent links and must finish with
    /// [`StubStore::commit_import`].
    pub(crate) fn insert_imported(&mut self, stub: FileStub) {
        self.stubs.push(stub);
    }

    /// Persist after a batch of [`StubStore::insert_imported`] calls.
    pub(crate) fn commit_import(&mut self) -> Result<()> {
        self.commit()
    }

    // =========================================================================
    // Session state (selection, pins) - not persisted
    // =========================================================================

    /// Replace the selection, keeping only tracked ids.
    pub fn set_selected(&mut self, ids: Vec<FileId>) {
        self.selected = ids
            .into_iter()
            .filter(|id| self.get(id).is_some())
            .collect();
        self.generation += 1;
    }

    pub fn pin(&mut self, id: &FileId) -> Result<()> {
        if self.get(id).is_none() {
            return Err(EngineError::StubNotFound(id.clone()));
        }
        self.pinned.insert(id.clone());
        self.generation += 1;
        Ok(())
    }

    pub fn unpin(&mut self, id: &FileId) {
        self.pinned.remove(id);
        self.generation += 1;
    }

    fn forget_ui_state(&mut self, ids: &[FileId]) {
        self.selected.retain(|s| !ids.contains(s));
        for id in ids {
            self.pinned.remove(id);
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn commit(&mut self) -> Result<()> {
        self.generation += 1;
        self.persist()
    }

    /// Atomic write: temp file -> fsync -> rename.
    fn persist(&self) -> Result<()> {
        let index = StubIndex {
            schema_version: STUB_INDEX_SCHEMA_VERSION,
            stubs: self.stubs.clone(),
        };
        let content = serde_json::to_string_pretty(&index)?;

        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.index_path.with_extension(format!("tmp.{}", std::process::id()));
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.index_path) {
            let _ = fs::remove_file(&temp_path);
            warn!(op = "stubs.persist.failed", error = %e, "Atomic rename failed");
            return Err(e.into());
        }

        Ok(())
    }
}
