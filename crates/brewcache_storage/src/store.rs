//! Key-value store trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A persisted key-value store of opaque string blobs.
///
/// brewcache owns every blob format. Stores only keep bytes under names and
/// hand them back unchanged.
///
/// # Invariants
///
/// - `get` returns exactly the value of the last successful `set` for a key
/// - `get` returns `None` for keys never written or removed since
/// - Each single-key call is atomic on its own
/// - `set_many` is atomic across its keys when the implementor overrides it;
///   the default implementation writes the keys one after another
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Stores several entries.
    ///
    /// Backends that can commit all entries in one write should override this.
    ///
    /// # Errors
    ///
    /// Returns the first write error. With the default implementation, entries
    /// before the failing one stay written.
    async fn set_many(&self, entries: Vec<(String, String)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    /// Lists all keys currently stored, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn keys(&self) -> StorageResult<Vec<String>>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key).await
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> StorageResult<()> {
        (**self).set_many(entries).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        (**self).keys().await
    }
}
