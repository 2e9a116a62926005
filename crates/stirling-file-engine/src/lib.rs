//! Stirling File Engine - revision history and share-bundle core
//!
//! Tracks every logical revision of a file as a lightweight stub linked into
//! a parent/child chain, deduplicates re-imports by metadata fingerprint, and
//! packages whole chains into portable ZIP bundles with a machine-readable
//! manifest. Raw revision bytes live in a [`stirling_blob_store::BlobStore`];
//! this crate only ever handles them when building or reading bundles.

mod bundle;
mod error;
mod history;
mod manifest;
mod quickkey;
mod reader;
mod selectors;
mod store;
mod types;

pub use bundle::{BuiltBundle, BundleBuilder, DEFAULT_COMPRESSION_LEVEL};
pub use error::{EngineError, Result};
pub use history::{chain_leaf, history_chain};
pub use manifest::{
    entry_path, sanitize_file_name, BundleEntry, BundleManifest, MANIFEST_NAME,
    MANIFEST_SCHEMA_VERSION,
};
pub use quickkey::{quick_key, quick_key_for, quick_key_set};
pub use reader::{import_bundle, read_bundle, ExtractedFile, ShareBundle};
pub use selectors::{
    all_ids, files_signature, is_pinned, leaf_stubs, pinned_ids, pinned_stubs, selected_stubs,
    snapshot_quick_keys, stub, stubs,
};
pub use store::{FileSnapshot, StubStore, STUB_INDEX_SCHEMA_VERSION};
pub use types::{
    CompressParams, FileId, FileStub, MergeParams, OcrParams, RedactParams, RemoteFileId,
    RemoteLink, RotateParams, SplitParams, ToolOperation, WatermarkParams,
};
