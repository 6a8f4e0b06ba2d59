//! Sync metadata record.

use crate::config::CacheConfig;
use crate::error::{CoreError, CoreResult};
use brewcache_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Counts from the most recent reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Operations confirmed by the server.
    pub processed: u32,
    /// Operations that failed (requeued or dropped).
    pub failed: u32,
}

/// What the UI shows as "last sync attempt".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// End time of the most recent pass, successful or not.
    pub last_sync: Option<i64>,
    /// Counts from that pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<SyncSummary>,
}

/// Persists [`SyncMetadata`] under its own key.
#[derive(Clone)]
pub struct SyncMetadataStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SyncMetadataStore {
    /// Creates a metadata store over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            key: config.metadata_key.clone(),
        }
    }

    /// Loads the metadata; missing storage yields the default.
    pub async fn load(&self) -> CoreResult<SyncMetadata> {
        let raw = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))?;

        match raw {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|e| CoreError::unavailable(&self.key, e))
            }
            _ => Ok(SyncMetadata::default()),
        }
    }

    /// Records the end of a pass at `now`.
    pub async fn record_pass(&self, now: i64, summary: SyncSummary) -> CoreResult<()> {
        let metadata = SyncMetadata {
            last_sync: Some(now),
            last_summary: Some(summary),
        };
        let blob =
            serde_json::to_string(&metadata).map_err(|e| CoreError::unavailable(&self.key, e))?;
        self.store
            .set(&self.key, blob)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))
    }
}
