//! Pending operation journal.

use crate::config::CacheConfig;
use crate::error::{CoreError, CoreResult};
use crate::operation::{OperationType, PendingOperation};
use brewcache_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// The loaded operation queue, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationQueue {
    operations: Vec<PendingOperation>,
}

impl OperationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Iterates in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.operations.iter()
    }

    /// Appends an operation.
    pub fn push(&mut self, op: PendingOperation) {
        self.operations.push(op);
    }

    /// Looks up an operation by id.
    pub fn get(&self, op_id: &str) -> Option<&PendingOperation> {
        self.operations.iter().find(|op| op.id == op_id)
    }

    /// Removes an operation by id.
    pub fn remove(&mut self, op_id: &str) -> Option<PendingOperation> {
        let pos = self.operations.iter().position(|op| op.id == op_id)?;
        Some(self.operations.remove(pos))
    }

    /// Bumps the retry counter and returns the new value.
    pub fn increment_retry(&mut self, op_id: &str) -> Option<u32> {
        let op = self.operations.iter_mut().find(|op| op.id == op_id)?;
        op.retry_count = op.retry_count.saturating_add(1);
        Some(op.retry_count)
    }

    /// Points every operation on `from` at `to`. Returns how many changed.
    pub fn remap_entity(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        for op in self.operations.iter_mut().filter(|op| op.entity_id == from) {
            op.entity_id = to.to_string();
            changed += 1;
        }
        changed
    }

    /// Returns true if any queued operation targets `entity_id`.
    pub fn references(&self, entity_id: &str) -> bool {
        self.operations.iter().any(|op| op.entity_id == entity_id)
    }

    /// Returns true if a create for `entity_id` is still queued.
    pub fn has_create_for(&self, entity_id: &str) -> bool {
        self.operations
            .iter()
            .any(|op| op.entity_id == entity_id && op.op_type == OperationType::Create)
    }

    /// Drops every operation that targets `entity_id`. Returns how many.
    pub fn discard_entity(&mut self, entity_id: &str) -> usize {
        let before = self.operations.len();
        self.operations.retain(|op| op.entity_id != entity_id);
        before - self.operations.len()
    }

    /// Consumes the queue into its operations.
    pub fn into_vec(self) -> Vec<PendingOperation> {
        self.operations
    }
}

/// The persisted pending operation journal.
///
/// Independent of the cache: it records intent, so a pass can be retried after
/// a restart without re-deriving what changed.
#[derive(Clone)]
pub struct Journal {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl Journal {
    /// Creates a journal over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            key: config.operations_key.clone(),
        }
    }

    /// Store key of the journal.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the queue. Missing or blank storage is an empty queue.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if the store fails or the blob does not decode.
    pub async fn load(&self) -> CoreResult<OperationQueue> {
        let raw = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))?;

        match raw {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|e| CoreError::unavailable(&self.key, e))
            }
            _ => Ok(OperationQueue::new()),
        }
    }

    /// Encodes the queue as a `(key, blob)` store entry.
    pub fn encode(&self, queue: &OperationQueue) -> CoreResult<(String, String)> {
        let blob =
            serde_json::to_string(queue).map_err(|e| CoreError::unavailable(&self.key, e))?;
        Ok((self.key.clone(), blob))
    }

    /// Persists the queue.
    pub async fn save(&self, queue: &OperationQueue) -> CoreResult<()> {
        let (key, blob) = self.encode(queue)?;
        self.store
            .set(&key, blob)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))
    }

    /// Appends an operation to the end of the journal.
    pub async fn enqueue(&self, op: PendingOperation) -> CoreResult<()> {
        let mut queue = self.load().await?;
        queue.push(op);
        self.save(&queue).await
    }

    /// Returns a snapshot of the journal in insertion order.
    pub async fn dequeue_all(&self) -> CoreResult<Vec<PendingOperation>> {
        Ok(self.load().await?.into_vec())
    }

    /// Deletes an operation. Returns false if it was already gone.
    pub async fn remove(&self, op_id: &str) -> CoreResult<bool> {
        let mut queue = self.load().await?;
        if queue.remove(op_id).is_none() {
            return Ok(false);
        }
        self.save(&queue).await?;
        Ok(true)
    }

    /// Persists one more failed attempt. Returns the new count, or `None` if
    /// the operation is gone.
    pub async fn increment_retry(&self, op_id: &str) -> CoreResult<Option<u32>> {
        let mut queue = self.load().await?;
        let count = queue.increment_retry(op_id);
        if count.is_some() {
            self.save(&queue).await?;
        }
        Ok(count)
    }

    /// Rewrites every operation on `from` to target `to`.
    pub async fn remap_entity(&self, from: &str, to: &str) -> CoreResult<usize> {
        let mut queue = self.load().await?;
        let changed = queue.remap_entity(from, to);
        if changed > 0 {
            self.save(&queue).await?;
        }
        Ok(changed)
    }

    /// Returns true if any queued operation targets `entity_id`.
    pub async fn references(&self, entity_id: &str) -> CoreResult<bool> {
        Ok(self.load().await?.references(entity_id))
    }

    /// Number of outstanding operations.
    ///
    /// Backs a UI badge, so read failures degrade to 0 instead of erroring.
    pub async fn count(&self) -> usize {
        match self.load().await {
            Ok(queue) => queue.len(),
            Err(e) => {
                warn!(error = %e, "failed to read pending operations, reporting 0");
                0
            }
        }
    }

    /// Empties the journal.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if the store refuses the removal; a silent failure
    /// here would strand operations.
    pub async fn clear(&self) -> CoreResult<()> {
        self.store
            .remove(&self.key)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))
    }
}
