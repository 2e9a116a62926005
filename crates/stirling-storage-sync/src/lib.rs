//! Stirling Storage Sync - remote upload and reconciliation
//!
//! Orchestrates the bundle builder against the remote storage endpoint:
//! decides between create and update, always ships full-history provenance
//! alongside the primary payload, and hands back the linkage metadata the
//! stub store persists across the whole chain.

mod client;
mod error;
mod service;

pub use client::{
    normalize_updated_at, FilePart, HttpRemoteStorageClient, RemoteStorageClient,
    StoredFileResponse, SyncConfig, UploadPayload,
};
pub use error::{Result, SyncError};
pub use service::{ChainUploadOutcome, UploadService};
