//! History chain resolution

use crate::store::FileSnapshot;
use crate::types::{FileId, FileStub};

/// Resolve the full revision chain containing `id`, root first, sorted by
/// version number. Any id in the chain may be given. Returns an empty vec for
/// unknown ids; "nothing there" is an answer, not an error.
pub fn history_chain(snap: &FileSnapshot, id: &FileId) -> Vec<FileStub> {
    let Some(start) = snap.by_id.get(id) else {
        return Vec::new();
    };
    let root = start.root_id().clone();

    // Walk ids in insertion order so equal-version anomalies still resolve
    // deterministically.
    let mut chain: Vec<FileStub> = snap
        .ids
        .iter()
        .filter_map(|i| snap.by_id.get(i))
        .filter(|s| s.root_id() == &root)
        .cloned()
        .collect();
    chain.sort_by_key(|s| s.version_number);
    chain
}

/// The current tip of a resolved chain: the stub flagged as leaf, falling
/// back to the highest version when the flags are inconsistent.
pub fn chain_leaf(chain: &[FileStub]) -> Option<&FileStub> {
    chain
        .iter()
        .find(|s| s.is_leaf)
        .or_else(|| chain.iter().max_by_key(|s| s.version_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StubStore;
    use crate::types::{RotateParams, ToolOperation};
    use tempfile::TempDir;

    fn rotate() -> ToolOperation {
        ToolOperation::Rotate(RotateParams { degrees: 90 })
    }

    #[test]
    fn test_chain_is_root_first_and_gap_free() {
        let tmp = TempDir::new().unwrap();
        let mut store = StubStore::open(tmp.path()).unwrap();

        let root_id = store
            .insert_root(FileStub::new_root("a.pdf", "application/pdf", 500, 0), false)
            .unwrap();
        let v2 = store
            .append_revision(&root_id, rotate(), "a_v2.pdf", "application/pdf", 600, 1)
            .unwrap();
        let v3 = store
            .append_revision(&v2.id, rotate(), "a_v3.pdf", "application/pdf", 700, 2)
            .unwrap();

        let snap = store.snapshot();
        // Resolvable from any id in the chain.
        for id in [&root_id, &v2.id, &v3.id] {
            let chain = history_chain(&snap, id);
            let versions: Vec<u32> = chain.iter().map(|s| s.version_number).collect();
            assert_eq!(versions, vec![1, 2, 3]);
            assert_eq!(&chain[0].id, &root_id);
        }
    }

    #[test]
    fn test_unknown_id_yields_empty_chain() {
        let tmp = TempDir::new().unwrap();
        let store = StubStore::open(tmp.path()).unwrap();
        let snap = store.snapshot();
        assert!(history_chain(&snap, &FileId::from("ghost")).is_empty());
    }

    #[test]
    fn test_leaf_prefers_flag_then_version() {
        let tmp = TempDir::new().unwrap();
        let mut store = StubStore::open(tmp.path()).unwrap();

        let root_id = store
            .insert_root(FileStub::new_root("a.pdf", "application/pdf", 500, 0), false)
            .unwrap();
        let v2 = store
            .append_revision(&root_id, rotate(), "a_v2.pdf", "application/pdf", 600, 1)
            .unwrap();

        let snap = store.snapshot();
        let chain = history_chain(&snap, &root_id);
        assert_eq!(chain_leaf(&chain).unwrap().id, v2.id);

        // Simulate an inconsistent flag: no stub marked leaf. The highest
        // version still wins, protecting bundle correctness.
        let mut chain = chain;
        for stub in &mut chain {
            stub.is_leaf = false;
        }
        assert_eq!(chain_leaf(&chain).unwrap().version_number, 2);

        assert!(chain_leaf(&[]).is_none());
    }
}
