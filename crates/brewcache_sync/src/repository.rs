//! Offline-first repository facade.

use crate::error::SyncResult;
use crate::reconciler::{Reconciler, SyncReport, SyncState, SyncStats};
use crate::remote::RemoteApi;
use brewcache_core::{
    CacheConfig, Clock, CoreError, CoreResult, Envelope, LocalState, PendingOperation, Record,
    SyncMetadata, SystemClock,
};
use brewcache_storage::KeyValueStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// The presentation layer's view of one record type.
///
/// Every mutation writes the cache and journals one operation in a single
/// commit, then returns without touching the network. Remote convergence is
/// left to [`sync_pending_operations`](Self::sync_pending_operations).
///
/// # Example
///
/// ```rust,ignore
/// let repo = OfflineRepository::new(store, remote, CacheConfig::default());
/// let recipe = repo.create(Recipe::new("u1", "IPA")).await?;
/// assert!(recipe.id.starts_with("temp_"));
/// let report = repo.sync_pending_operations().await?;
/// ```
pub struct OfflineRepository<T: Record, R: RemoteApi<T>> {
    local: Arc<LocalState<T>>,
    reconciler: Reconciler<T, R>,
}

impl<T: Record, R: RemoteApi<T>> OfflineRepository<T, R> {
    /// Creates a repository using the system clock.
    pub fn new(store: Arc<dyn KeyValueStore>, remote: R, config: CacheConfig) -> Self {
        Self::with_clock(store, remote, config, Arc::new(SystemClock))
    }

    /// Creates a repository with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        remote: R,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let local = Arc::new(LocalState::new(store, &config, clock));
        let reconciler = Reconciler::new(Arc::clone(&local), remote);
        Self { local, reconciler }
    }

    /// The reconciler driving this repository.
    pub fn reconciler(&self) -> &Reconciler<T, R> {
        &self.reconciler
    }

    /// The remote API.
    pub fn remote(&self) -> &R {
        self.reconciler.remote()
    }

    /// Lists the owner's live records, newest first.
    pub async fn list(&self, owner_id: &str) -> CoreResult<Vec<T>> {
        self.local.cache().list(owner_id).await
    }

    /// Lists the owner's live records with their sync bookkeeping.
    pub async fn list_envelopes(&self, owner_id: &str) -> CoreResult<Vec<Envelope<T>>> {
        self.local.cache().list_envelopes(owner_id).await
    }

    /// Looks up one envelope, tombstones included.
    pub async fn get(&self, id: &str) -> CoreResult<Option<Envelope<T>>> {
        self.local.cache().get(id).await
    }

    /// Stores a new record under a temporary id and journals its create.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if the cache or journal cannot be read or written.
    pub async fn create(&self, record: T) -> CoreResult<T> {
        let _lock = self.local.lock().await;
        let (mut set, mut queue) = self.local.load().await?;
        let now = self.local.now();

        let created = set.insert_local(record, self.local.cache().new_temp_id(), now);
        queue.push(PendingOperation::create(
            T::ENTITY_TYPE,
            created.id(),
            self.payload(&created)?,
            now,
            self.local.max_retries(),
        ));
        self.local.commit(&set, &queue).await?;

        debug!(entity_type = T::ENTITY_TYPE, id = %created.id(), "created locally");
        Ok(created)
    }

    /// Merges `patch` into a live record and journals an update.
    ///
    /// A temporary id whose create was dropped gets a fresh create instead, so
    /// the edit still reaches the server.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` is missing or tombstoned
    /// - `InvalidPatch` if the patch does not fit the record
    /// - `CacheUnavailable` on storage failure
    pub async fn update(&self, id: &str, patch: &Value) -> CoreResult<T> {
        let _lock = self.local.lock().await;
        let (mut set, mut queue) = self.local.load().await?;
        let now = self.local.now();

        let updated = set.update(id, patch, now)?;
        let payload = self.payload(&updated)?;
        let op = if self.local.cache().is_temporary(id) && !queue.has_create_for(id) {
            PendingOperation::create(T::ENTITY_TYPE, id, payload, now, self.local.max_retries())
        } else {
            PendingOperation::update(T::ENTITY_TYPE, id, payload, now, self.local.max_retries())
        };
        debug!(entity_type = T::ENTITY_TYPE, id, op_type = %op.op_type, "updated locally");
        queue.push(op);
        self.local.commit(&set, &queue).await?;
        Ok(updated)
    }

    /// Tombstones a record and journals its delete.
    ///
    /// A temporary id with no queued create never reached the server and is
    /// removed outright.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` is missing, tombstoned, or owned by someone else
    /// - `CacheUnavailable` on storage failure
    pub async fn delete(&self, id: &str, owner_id: &str) -> CoreResult<()> {
        let _lock = self.local.lock().await;
        let (mut set, mut queue) = self.local.load().await?;
        let now = self.local.now();

        set.tombstone(id, owner_id, now)?;
        if self.local.cache().is_temporary(id) && !queue.has_create_for(id) {
            set.remove(id);
            let discarded = queue.discard_entity(id);
            debug!(id, discarded, "removed never-synced record");
        } else {
            queue.push(PendingOperation::delete(
                T::ENTITY_TYPE,
                id,
                now,
                self.local.max_retries(),
            ));
            debug!(entity_type = T::ENTITY_TYPE, id, "tombstoned locally");
        }
        self.local.commit(&set, &queue).await
    }

    /// Runs one reconciliation pass.
    ///
    /// # Errors
    ///
    /// `SyncInProgress` if a pass is already running, `Core` on storage
    /// failure. Remote failures are reported in the returned [`SyncReport`].
    pub async fn sync_pending_operations(&self) -> SyncResult<SyncReport> {
        self.reconciler.run_pass().await
    }

    /// Number of queued operations; 0 if the journal cannot be read.
    pub async fn pending_operations_count(&self) -> usize {
        self.local.journal().count().await
    }

    /// Queued operations in FIFO order.
    pub async fn pending_operations(&self) -> CoreResult<Vec<PendingOperation>> {
        self.local.journal().dequeue_all().await
    }

    /// Empties the journal.
    ///
    /// Cached records keep their pending status; nothing will sync them until
    /// they are edited again.
    pub async fn clear_sync_queue(&self) -> CoreResult<()> {
        let _lock = self.local.lock().await;
        self.local.journal().clear().await?;
        info!("sync queue cleared");
        Ok(())
    }

    /// Records whose last operation was dropped after exhausting retries.
    pub async fn failed_entities(&self) -> CoreResult<Vec<Envelope<T>>> {
        self.local.cache().failed().await
    }

    /// Re-journals every failed record and flips it back to pending.
    ///
    /// The operation is chosen from the record's current state: a delete for
    /// tombstones, a create for temporary ids, an update otherwise. A
    /// tombstone that never reached the server is removed instead. Records
    /// that still have queued operations are left as they are.
    ///
    /// Returns the number of records requeued or removed.
    pub async fn requeue_failed(&self) -> CoreResult<usize> {
        let _lock = self.local.lock().await;
        let (mut set, mut queue) = self.local.load().await?;
        let now = self.local.now();
        let max_retries = self.local.max_retries();

        let failed: Vec<Envelope<T>> = set
            .failed()
            .into_iter()
            .filter(|envelope| !queue.references(&envelope.id))
            .cloned()
            .collect();

        for envelope in &failed {
            let id = envelope.id.as_str();
            let temporary = self.local.cache().is_temporary(id);
            match (envelope.is_deleted, temporary) {
                (true, true) => {
                    set.remove(id);
                    continue;
                }
                (true, false) => {
                    queue.push(PendingOperation::delete(T::ENTITY_TYPE, id, now, max_retries));
                }
                (false, true) => {
                    let payload = self.payload(&envelope.data)?;
                    queue.push(PendingOperation::create(T::ENTITY_TYPE, id, payload, now, max_retries));
                }
                (false, false) => {
                    let payload = self.payload(&envelope.data)?;
                    queue.push(PendingOperation::update(T::ENTITY_TYPE, id, payload, now, max_retries));
                }
            }
            set.mark_pending(id, now);
        }

        if !failed.is_empty() {
            self.local.commit(&set, &queue).await?;
            info!(entity_type = T::ENTITY_TYPE, count = failed.len(), "requeued failed records");
        }
        Ok(failed.len())
    }

    /// The "last sync attempt" record.
    pub async fn sync_metadata(&self) -> CoreResult<SyncMetadata> {
        self.local.metadata().load().await
    }

    /// Whether a pass is running.
    pub fn sync_state(&self) -> SyncState {
        self.reconciler.state()
    }

    /// Statistics across passes.
    pub fn sync_stats(&self) -> SyncStats {
        self.reconciler.stats()
    }

    fn payload(&self, record: &T) -> CoreResult<Value> {
        serde_json::to_value(record).map_err(|e| CoreError::unavailable(self.local.cache().key(), e))
    }
}
