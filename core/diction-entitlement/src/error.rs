//! Error types for the entitlement engine.

use diction_storage::StorageError;
use thiserror::Error;

/// Entitlement-specific errors.
///
/// Only user actions (login, register) surface these. Background paths log
/// and swallow storage failures instead.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// Email, password or name rejected before contacting anything.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The operation needs a logged-in user.
    #[error("no user is logged in")]
    NotAuthenticated,

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for entitlement operations.
pub type EntitlementResult<T> = Result<T, EntitlementError>;
