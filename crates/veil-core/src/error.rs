//! Error types for the veil-core crate

use thiserror::Error;
use veil_storage::StorageError;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that abort a metadata request
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed path or a directory where a file is required
    #[error("{0}")]
    BadRequest(String),

    /// No entry with the requested name
    #[error("object not found: {0}")]
    NotFound(String),

    /// The owning storage is not of the expected kind
    #[error("{0}")]
    StorageMismatch(String),

    /// Storage or chain lookup failed
    #[error("failed to resolve {path}: {source}")]
    Resolution {
        path: String,
        #[source]
        source: StorageError,
    },

    /// The terminal storage did not produce a fetch link
    #[error("failed to get link for {path}: {source}")]
    Link {
        path: String,
        #[source]
        source: StorageError,
    },

    /// Secret reveal or key stretching failed
    #[error("failed to derive keys for {path}: {source}")]
    KeyDerivation {
        path: String,
        #[source]
        source: StorageError,
    },
}

impl CoreError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::BadRequest(_) | CoreError::StorageMismatch(_) => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Resolution { .. } | CoreError::Link { .. } | CoreError::KeyDerivation { .. } => {
                500
            }
        }
    }
}
