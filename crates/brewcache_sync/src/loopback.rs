//! In-process remote for demos and end-to-end tests.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::RemoteApi;
use async_trait::async_trait;
use brewcache_core::Record;
use brewcache_storage::KeyValueStore;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const NEXT_ID_KEY: &str = "remote:next_id";

/// A loopback "server" that keeps records in its own store.
///
/// Assigns sequential numeric ids, so server ids never collide with temporary
/// ids. Switching it offline makes every call fail with a retryable transport
/// error, which is how the CLI and the tests simulate losing connectivity.
pub struct LoopbackRemote<T> {
    store: Arc<dyn KeyValueStore>,
    records_key: String,
    offline: AtomicBool,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> LoopbackRemote<T> {
    /// Creates a loopback remote over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            records_key: format!("remote:{}", T::ENTITY_TYPE),
            offline: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns true if calls are being refused.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Every record the server holds, by id.
    pub async fn records(&self) -> RemoteResult<Vec<T>> {
        Ok(self.load().await?.into_values().collect())
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.is_offline() {
            Err(RemoteError::transport_retryable("server unreachable"))
        } else {
            Ok(())
        }
    }

    async fn load(&self) -> RemoteResult<BTreeMap<String, T>> {
        let raw = self.store.get(&self.records_key).await.map_err(internal)?;
        match raw {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(internal),
            _ => Ok(BTreeMap::new()),
        }
    }

    async fn next_id(&self) -> RemoteResult<u64> {
        let raw = self.store.get(NEXT_ID_KEY).await.map_err(internal)?;
        match raw {
            Some(raw) => raw.trim().parse().map_err(internal),
            None => Ok(1),
        }
    }

    async fn save(&self, records: &BTreeMap<String, T>, next_id: u64) -> RemoteResult<()> {
        let blob = serde_json::to_string(records).map_err(internal)?;
        self.store
            .set_many(vec![
                (self.records_key.clone(), blob),
                (NEXT_ID_KEY.to_string(), next_id.to_string()),
            ])
            .await
            .map_err(internal)
    }
}

fn internal(err: impl std::fmt::Display) -> RemoteError {
    RemoteError::ServerError(err.to_string())
}

#[async_trait]
impl<T: Record> RemoteApi<T> for LoopbackRemote<T> {
    async fn create(&self, record: &T) -> RemoteResult<T> {
        self.check_online()?;
        let _lock = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let id = self.next_id().await?;

        let mut saved = record.clone();
        saved.set_id(id.to_string());
        records.insert(saved.id().to_string(), saved.clone());
        self.save(&records, id + 1).await?;

        debug!(entity_type = T::ENTITY_TYPE, id, "loopback created record");
        Ok(saved)
    }

    async fn update(&self, id: &str, record: &T) -> RemoteResult<T> {
        self.check_online()?;
        let _lock = self.write_lock.lock().await;
        let mut records = self.load().await?;
        if !records.contains_key(id) {
            return Err(RemoteError::NotFound(id.to_string()));
        }

        let mut saved = record.clone();
        saved.set_id(id.to_string());
        records.insert(id.to_string(), saved.clone());
        self.save(&records, self.next_id().await?).await?;
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.check_online()?;
        let _lock = self.write_lock.lock().await;
        let mut records = self.load().await?;
        if records.remove(id).is_none() {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        self.save(&records, self.next_id().await?).await
    }
}
