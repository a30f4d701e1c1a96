//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Key cannot be mapped to a storage location.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Backend is not reachable (closed, unmounted, revoked).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
