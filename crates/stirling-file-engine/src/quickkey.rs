//! Metadata fingerprints for import deduplication
//!
//! A quick key is cheap on purpose: name, size and modification time are
//! enough to catch the common "same file picked twice" case without hashing
//! content. Two different files that coincidentally share all three WILL
//! collide; that is accepted behavior.

use crate::types::FileStub;
use std::collections::HashSet;

/// Deterministic dedup fingerprint: `name|size|lastModified`.
///
/// The key computed from a live file and the key rebuilt from persisted
/// metadata must be byte-identical for the same logical input.
pub fn quick_key(name: &str, size: u64, last_modified: i64) -> String {
    format!("{name}|{size}|{last_modified}")
}

/// Quick key for an existing stub.
pub fn quick_key_for(stub: &FileStub) -> String {
    quick_key(&stub.name, stub.size, stub.last_modified)
}

/// Build the membership set used to reject re-imports in O(1).
pub fn quick_key_set<'a>(stubs: impl IntoIterator<Item = &'a FileStub>) -> HashSet<String> {
    stubs.into_iter().map(quick_key_for).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_key_format() {
        assert_eq!(
            quick_key("report.pdf", 1024, 1_700_000_000_000),
            "report.pdf|1024|1700000000000"
        );
    }

    #[test]
    fn test_live_and_persisted_paths_agree() {
        let stub = FileStub::new_root("report.pdf", "application/pdf", 1024, 1_700_000_000_000);
        // Key stored at creation equals key rebuilt from metadata alone.
        assert_eq!(stub.quick_key, quick_key_for(&stub));
        assert_eq!(stub.quick_key, quick_key("report.pdf", 1024, 1_700_000_000_000));
    }

    #[test]
    fn test_set_membership() {
        let a = FileStub::new_root("a.pdf", "application/pdf", 1, 10);
        let b = FileStub::new_root("b.pdf", "application/pdf", 2, 20);
        let keys = quick_key_set([&a, &b]);

        assert!(keys.contains(&quick_key("a.pdf", 1, 10)));
        assert!(!keys.contains(&quick_key("a.pdf", 1, 11)));
    }
}
