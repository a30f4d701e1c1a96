//! Key-value persistence for the diction coach entitlement core.
//!
//! The entitlement engine stores a single JSON blob under a fixed key. This
//! crate defines the async `KeyValueStore` seam it talks to, plus two backends:
//!
//! - `MemoryStore`: volatile, for tests and ephemeral sessions
//! - `FileStore`: one file per key in a data directory
//!
//! Every operation is fallible. Callers decide whether a failure is fatal; the
//! engine treats them all as transient.

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Abstract string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Checks that a key maps to a single, non-hidden file name.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".to_string()));
    }
    if key.starts_with('.') {
        return Err(StorageError::InvalidKey(format!("{key}: leading dot")));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(StorageError::InvalidKey(format!("{key}: unsupported character {c:?}")));
    }
    Ok(())
}
