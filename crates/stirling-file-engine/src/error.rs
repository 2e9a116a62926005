//! File engine errors

use crate::types::FileId;
use stirling_blob_store::BlobError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No history chain found for file {0}")]
    ChainNotFound(FileId),

    #[error("File not found: {0}")]
    StubNotFound(FileId),

    #[error("Missing file data for {0}")]
    MissingFileData(String),

    #[error("Duplicate file: {0}")]
    DuplicateFile(String),

    #[error("Revision {0} is not the current leaf of its chain")]
    NotLeaf(FileId),

    #[error("Revision {0} has later revisions and cannot be deleted")]
    HasDescendants(FileId),

    #[error("Corrupt bundle: missing archive entry {0}")]
    CorruptBundle(String),

    #[error("Invalid bundle manifest: {0}")]
    InvalidManifest(serde_json::Error),

    #[error("Index schema version {0} not supported")]
    UnsupportedSchema(u32),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
