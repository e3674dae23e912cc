//! Error types for the veil-storage crate

use thiserror::Error;
use veil_crypto::CryptoError;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in storages and the mount table
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object or directory not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// No storage is mounted at or above the path
    #[error("no storage mounted for path: {0}")]
    NoStorage(String),

    /// A storage is already mounted at the path
    #[error("storage already mounted at {0}")]
    AlreadyMounted(String),

    /// Storage definition is unusable
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    /// A stored secret could not be revealed
    #[error("failed to reveal {secret}: {source}")]
    Secret {
        secret: &'static str,
        #[source]
        source: CryptoError,
    },

    /// Crypto error
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Whether the error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
