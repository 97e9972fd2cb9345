//! Storage-specific error type wrapping IO and JSON errors.

use std::path::PathBuf;

use synhub_domain::error::SynhubError;

/// Errors originating from the JSON file store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading, writing or renaming the file failed.
    #[error("io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid document.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// The file was written by a newer format.
    #[error("unsupported document version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl From<StorageError> for SynhubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
