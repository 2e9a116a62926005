//! Read views over a file snapshot
//!
//! Every function here is a pure function of an explicit [`FileSnapshot`]:
//! no I/O, no hidden state. Consumers take a snapshot once and answer any
//! number of questions from it.

use crate::quickkey::quick_key_for;
use crate::store::FileSnapshot;
use crate::types::{FileId, FileStub};
use std::collections::HashSet;

/// Look up one stub.
pub fn stub<'a>(snap: &'a FileSnapshot, id: &FileId) -> Option<&'a FileStub> {
    snap.by_id.get(id)
}

/// Look up several stubs, or all tracked stubs (in insertion order) when no
/// ids are given. Unknown ids are skipped.
pub fn stubs<'a>(snap: &'a FileSnapshot, ids: Option<&[FileId]>) -> Vec<&'a FileStub> {
    match ids {
        Some(ids) => ids.iter().filter_map(|id| snap.by_id.get(id)).collect(),
        None => snap.ids.iter().filter_map(|id| snap.by_id.get(id)).collect(),
    }
}

/// All tracked ids in insertion order.
pub fn all_ids(snap: &FileSnapshot) -> &[FileId] {
    &snap.ids
}

/// Stubs currently selected in the session.
pub fn selected_stubs<'a>(snap: &'a FileSnapshot) -> Vec<&'a FileStub> {
    snap.selected
        .iter()
        .filter_map(|id| snap.by_id.get(id))
        .collect()
}

pub fn pinned_ids(snap: &FileSnapshot) -> Vec<FileId> {
    snap.ids
        .iter()
        .filter(|id| snap.pinned.contains(*id))
        .cloned()
        .collect()
}

pub fn pinned_stubs<'a>(snap: &'a FileSnapshot) -> Vec<&'a FileStub> {
    snap.ids
        .iter()
        .filter(|id| snap.pinned.contains(*id))
        .filter_map(|id| snap.by_id.get(id))
        .collect()
}

pub fn is_pinned(snap: &FileSnapshot, id: &FileId) -> bool {
    snap.pinned.contains(id)
}

/// Current chain tips only.
pub fn leaf_stubs<'a>(snap: &'a FileSnapshot) -> Vec<&'a FileStub> {
    snap.ids
        .iter()
        .filter_map(|id| snap.by_id.get(id))
        .filter(|s| s.is_leaf)
        .collect()
}

/// Cheap, order-stable change signature over the tracked set:
/// `id:size:lastModified` per file, joined with `;`. Consumers compare two
/// signatures to answer "did the active set change" without deep comparison.
pub fn files_signature(snap: &FileSnapshot) -> String {
    snap.ids
        .iter()
        .filter_map(|id| snap.by_id.get(id))
        .map(|s| format!("{}:{}:{}", s.id, s.size, s.last_modified))
        .collect::<Vec<_>>()
        .join(";")
}

/// Dedup key set rebuilt from the snapshot's persisted metadata.
pub fn snapshot_quick_keys(snap: &FileSnapshot) -> HashSet<String> {
    snap.by_id.values().map(quick_key_for).collect()
}
