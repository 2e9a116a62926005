//! Storage sync errors

use stirling_file_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Upload requires at least one file")]
    NoFiles,

    #[error("Remote store response missing file id")]
    MissingRemoteId,

    #[error("Remote store returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
