//! Storage failure injection.

use async_trait::async_trait;
use brewcache_storage::{InMemoryStore, KeyValueStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wraps a store and fails reads or writes on demand.
pub struct FlakyStore {
    inner: Arc<dyn KeyValueStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    /// Wraps `inner`; nothing fails until switched on.
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Wraps a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Makes `get` and `keys` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set`, `remove` and `set_many` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.remove(key).await
    }

    async fn set_many(&self, entries: Vec<(String, String)>) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.set_many(entries).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.keys().await
    }
}
