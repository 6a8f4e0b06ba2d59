//! Cache, journal and metadata over one store.

use crate::cache::{EnvelopeSet, LocalCache};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, OperationQueue};
use crate::metadata::SyncMetadataStore;
use crate::record::Record;
use brewcache_storage::KeyValueStore;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

/// The local half of the offline store for one record type.
///
/// Owns the write lock that serializes read-modify-write cycles on the cache
/// and the journal. Holders of the lock load both structures, mutate them in
/// memory and [`commit`](Self::commit) them as one batch. The lock must not be
/// held across remote calls.
pub struct LocalState<T> {
    store: Arc<dyn KeyValueStore>,
    cache: LocalCache<T>,
    journal: Journal,
    metadata: SyncMetadataStore,
    max_retries: u32,
    write_lock: Mutex<()>,
}

impl<T: Record> LocalState<T> {
    /// Creates the local state over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: LocalCache::new(Arc::clone(&store), config, clock),
            journal: Journal::new(Arc::clone(&store), config),
            metadata: SyncMetadataStore::new(Arc::clone(&store), config),
            max_retries: config.max_retries,
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// The entity cache.
    pub fn cache(&self) -> &LocalCache<T> {
        &self.cache
    }

    /// The operation journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The sync metadata record.
    pub fn metadata(&self) -> &SyncMetadataStore {
        &self.metadata
    }

    /// Retry limit stamped onto new operations.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Current time from the cache clock.
    pub fn now(&self) -> i64 {
        self.cache.now()
    }

    /// Acquires the write lock.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Loads the cache and the journal.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if either structure cannot be read.
    pub async fn load(&self) -> CoreResult<(EnvelopeSet<T>, OperationQueue)> {
        let set = self.cache.load().await?;
        let queue = self.journal.load().await?;
        Ok((set, queue))
    }

    /// Writes the cache and the journal as one batch.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if encoding or the batch write fails; neither
    /// structure is then changed on a store whose `set_many` is atomic.
    pub async fn commit(&self, set: &EnvelopeSet<T>, queue: &OperationQueue) -> CoreResult<()> {
        let entities = self.cache.encode(set)?;
        let operations = self.journal.encode(queue)?;
        trace!(
            entities = set.len(),
            operations = queue.len(),
            "committing cache and journal"
        );
        let key = entities.0.clone();
        self.store
            .set_many(vec![entities, operations])
            .await
            .map_err(|e| CoreError::unavailable(key, e))
    }
}
