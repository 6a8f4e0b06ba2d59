//! Local entity cache.

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::envelope::{Envelope, SyncStatus};
use crate::error::{CoreError, CoreResult};
use crate::record::{is_temporary_id, new_temp_id, Record};
use brewcache_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// The loaded envelope collection.
///
/// Holds every transition of the cache as a pure function on the in-memory
/// collection. Persisted as a JSON array in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeSet<T> {
    envelopes: Vec<Envelope<T>>,
}

impl<T> Default for EnvelopeSet<T> {
    fn default() -> Self {
        Self {
            envelopes: Vec::new(),
        }
    }
}

impl<T: Record> EnvelopeSet<T> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection from existing envelopes.
    pub fn from_envelopes(envelopes: Vec<Envelope<T>>) -> Self {
        Self { envelopes }
    }

    /// Number of envelopes, tombstones included.
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Returns true if the collection holds no envelopes at all.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Iterates over every envelope, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &Envelope<T>> {
        self.envelopes.iter()
    }

    /// Looks up an envelope by id, tombstones included.
    pub fn get(&self, id: &str) -> Option<&Envelope<T>> {
        self.envelopes.iter().find(|e| e.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.envelopes.iter().position(|e| e.id == id)
    }

    fn visible_position(&self, id: &str) -> CoreResult<usize> {
        self.envelopes
            .iter()
            .position(|e| e.id == id && e.is_visible())
            .ok_or_else(|| CoreError::not_found(id))
    }

    /// Returns the owner's live envelopes, newest record first.
    ///
    /// Ties on the creation timestamp list the later insertion first. Ids are
    /// rewritten in place, so the order survives a sync.
    pub fn visible_for(&self, owner_id: &str) -> Vec<&Envelope<T>> {
        let mut visible: Vec<&Envelope<T>> = self
            .envelopes
            .iter()
            .rev()
            .filter(|e| e.is_visible() && e.data.owner_id() == owner_id)
            .collect();
        // Stable sort keeps reverse insertion order among equal timestamps.
        visible.sort_by(|a, b| b.data.created_at().cmp(&a.data.created_at()));
        visible
    }

    /// Appends a locally created record under `id`.
    pub fn insert_local(&mut self, mut record: T, id: String, now: i64) -> T {
        record.set_id(id.clone());
        record.set_created_at(now);
        record.set_updated_at(now);
        self.envelopes
            .push(Envelope::pending(id, record.clone(), now));
        record
    }

    /// Merges `patch` into a live record and marks it pending.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `id` is missing or tombstoned
    /// - `InvalidPatch` if the patch is not an object or does not fit the record
    pub fn update(&mut self, id: &str, patch: &Value, now: i64) -> CoreResult<T> {
        let pos = self.visible_position(id)?;
        let envelope = &mut self.envelopes[pos];

        let mut merged = merge_patch(&envelope.data, patch)?;
        merged.set_updated_at(now);
        envelope.data = merged.clone();
        envelope.mark_pending(now);
        Ok(merged)
    }

    /// Tombstones a live record owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is missing, already tombstoned, or owned by someone
    /// else.
    pub fn tombstone(&mut self, id: &str, owner_id: &str, now: i64) -> CoreResult<()> {
        let pos = self.visible_position(id)?;
        let envelope = &mut self.envelopes[pos];
        if envelope.data.owner_id() != owner_id {
            return Err(CoreError::not_found(id));
        }
        envelope.tombstone(now);
        Ok(())
    }

    /// Replaces a record with the server's version and marks it synced.
    ///
    /// The envelope moves to the server id when it differs from `local_id`.
    /// A missing envelope is inserted, which repairs a journal entry whose
    /// cache write never landed.
    pub fn apply_server_result(&mut self, local_id: &str, mut server: T, now: i64) {
        if server.id().is_empty() {
            server.set_id(local_id.to_string());
        }
        let server_id = server.id().to_string();

        if server_id != local_id {
            if let Some(dup) = self.position(&server_id) {
                self.envelopes.remove(dup);
            }
        }

        match self.position(local_id) {
            Some(pos) => {
                let envelope = &mut self.envelopes[pos];
                envelope.id = server_id;
                envelope.data = server;
                envelope.mark_synced(now);
            }
            None => {
                debug!(id = %server_id, "inserting confirmed record missing from cache");
                self.envelopes.push(Envelope::synced(server_id, server, now));
            }
        }
    }

    /// Moves an envelope from `from` to `to` without touching its data or
    /// status. Returns false if `from` is absent.
    pub fn remap_id(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.position(from).is_some();
        }
        match self.position(from) {
            Some(pos) => {
                let envelope = &mut self.envelopes[pos];
                envelope.id = to.to_string();
                envelope.data.set_id(to.to_string());
                true
            }
            None => false,
        }
    }

    /// Physically removes an envelope.
    pub fn remove(&mut self, id: &str) -> Option<Envelope<T>> {
        self.position(id).map(|pos| self.envelopes.remove(pos))
    }

    /// Marks an envelope as permanently out of sync.
    pub fn mark_failed(&mut self, id: &str, message: &str) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.envelopes[pos].mark_error(message);
                true
            }
            None => false,
        }
    }

    /// Flips an envelope back to pending.
    pub fn mark_pending(&mut self, id: &str, now: i64) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.envelopes[pos].mark_pending(now);
                true
            }
            None => false,
        }
    }

    /// Envelopes whose last operation was dropped, tombstones included.
    pub fn failed(&self) -> Vec<&Envelope<T>> {
        self.envelopes
            .iter()
            .filter(|e| e.sync_status == SyncStatus::Error)
            .collect()
    }
}

/// Shallow-merges a JSON object into a record.
///
/// The record's id, creation time and owner are not patchable.
fn merge_patch<T: Record>(record: &T, patch: &Value) -> CoreResult<T> {
    let fields = patch
        .as_object()
        .ok_or_else(|| CoreError::InvalidPatch("patch must be a JSON object".into()))?;

    let mut value =
        serde_json::to_value(record).map_err(|e| CoreError::InvalidPatch(e.to_string()))?;
    let target = value
        .as_object_mut()
        .ok_or_else(|| CoreError::InvalidPatch("record is not a JSON object".into()))?;
    for (key, field) in fields {
        target.insert(key.clone(), field.clone());
    }

    let mut merged: T =
        serde_json::from_value(value).map_err(|e| CoreError::InvalidPatch(e.to_string()))?;
    if merged.owner_id() != record.owner_id() {
        return Err(CoreError::InvalidPatch("owner cannot be changed".into()));
    }
    merged.set_id(record.id().to_string());
    merged.set_created_at(record.created_at());
    Ok(merged)
}

/// The persisted local cache for one record type.
///
/// Reads and writes the whole [`EnvelopeSet`] under one store key. Every
/// method here loads, applies one transition and saves; use [`Self::load`]
/// and [`Self::encode`] to stage a write alongside other keys.
pub struct LocalCache<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    temp_id_prefix: String,
    clock: Arc<dyn Clock>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for LocalCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            temp_id_prefix: self.temp_id_prefix.clone(),
            clock: Arc::clone(&self.clock),
            _record: PhantomData,
        }
    }
}

impl<T: Record> LocalCache<T> {
    /// Creates a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            key: config.entities_key_for(T::ENTITY_TYPE),
            temp_id_prefix: config.temp_id_prefix.clone(),
            clock,
            _record: PhantomData,
        }
    }

    /// Store key of the collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current time from the cache clock.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Generates a fresh temporary id.
    pub fn new_temp_id(&self) -> String {
        new_temp_id(&self.temp_id_prefix)
    }

    /// Returns true if `id` is a temporary id.
    pub fn is_temporary(&self, id: &str) -> bool {
        is_temporary_id(id, &self.temp_id_prefix)
    }

    /// Loads the collection. Missing or blank storage is an empty collection.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if the store fails or the blob does not decode.
    pub async fn load(&self) -> CoreResult<EnvelopeSet<T>> {
        let raw = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))?;

        match raw {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|e| CoreError::unavailable(&self.key, e))
            }
            _ => Ok(EnvelopeSet::new()),
        }
    }

    /// Encodes the collection as a `(key, blob)` store entry.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if a record fails to serialize.
    pub fn encode(&self, set: &EnvelopeSet<T>) -> CoreResult<(String, String)> {
        let blob = serde_json::to_string(set).map_err(|e| CoreError::unavailable(&self.key, e))?;
        Ok((self.key.clone(), blob))
    }

    /// Persists the collection.
    ///
    /// # Errors
    ///
    /// `CacheUnavailable` if encoding or the write fails.
    pub async fn save(&self, set: &EnvelopeSet<T>) -> CoreResult<()> {
        let (key, blob) = self.encode(set)?;
        self.store
            .set(&key, blob)
            .await
            .map_err(|e| CoreError::unavailable(&self.key, e))
    }

    /// Lists the owner's live envelopes, newest record first.
    pub async fn list_envelopes(&self, owner_id: &str) -> CoreResult<Vec<Envelope<T>>> {
        let set = self.load().await?;
        Ok(set.visible_for(owner_id).into_iter().cloned().collect())
    }

    /// Lists the owner's live records, newest first.
    pub async fn list(&self, owner_id: &str) -> CoreResult<Vec<T>> {
        let set = self.load().await?;
        Ok(set
            .visible_for(owner_id)
            .into_iter()
            .map(|e| e.data.clone())
            .collect())
    }

    /// Looks up an envelope, tombstones included.
    pub async fn get(&self, id: &str) -> CoreResult<Option<Envelope<T>>> {
        Ok(self.load().await?.get(id).cloned())
    }

    /// Stores a new record under a temporary id and returns it.
    pub async fn create(&self, record: T) -> CoreResult<T> {
        let mut set = self.load().await?;
        let created = set.insert_local(record, self.new_temp_id(), self.now());
        self.save(&set).await?;
        Ok(created)
    }

    /// Merges `patch` into a live record.
    pub async fn update(&self, id: &str, patch: &Value) -> CoreResult<T> {
        let mut set = self.load().await?;
        let updated = set.update(id, patch, self.now())?;
        self.save(&set).await?;
        Ok(updated)
    }

    /// Tombstones a live record owned by `owner_id`.
    pub async fn delete(&self, id: &str, owner_id: &str) -> CoreResult<()> {
        let mut set = self.load().await?;
        set.tombstone(id, owner_id, self.now())?;
        self.save(&set).await
    }

    /// Replaces a record with the server's version; see
    /// [`EnvelopeSet::apply_server_result`].
    pub async fn apply_server_result(&self, local_id: &str, server: T) -> CoreResult<()> {
        let mut set = self.load().await?;
        set.apply_server_result(local_id, server, self.now());
        self.save(&set).await
    }

    /// Physically removes a tombstone after its delete was confirmed.
    pub async fn remove_confirmed_tombstone(&self, id: &str) -> CoreResult<()> {
        let mut set = self.load().await?;
        if set.remove(id).is_some() {
            self.save(&set).await?;
        }
        Ok(())
    }

    /// Marks a record as permanently out of sync.
    pub async fn mark_failed(&self, id: &str, message: &str) -> CoreResult<()> {
        let mut set = self.load().await?;
        if set.mark_failed(id, message) {
            self.save(&set).await?;
        }
        Ok(())
    }

    /// Envelopes whose last operation was dropped.
    pub async fn failed(&self) -> CoreResult<Vec<Envelope<T>>> {
        Ok(self.load().await?.failed().into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use brewcache_storage::InMemoryStore;
    use proptest::prelude::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Brew {
        id: String,
        owner_id: String,
        name: String,
        #[serde(default)]
        abv: f64,
        created_at: i64,
        updated_at: i64,
    }

    impl Brew {
        fn new(owner: &str, name: &str) -> Self {
            Self {
                id: String::new(),
                owner_id: owner.into(),
                name: name.into(),
                abv: 0.0,
                created_at: 0,
                updated_at: 0,
            }
        }
    }

    impl Record for Brew {
        const ENTITY_TYPE: &'static str = "brew";

        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn owner_id(&self) -> &str {
            &self.owner_id
        }
        fn created_at(&self) -> i64 {
            self.created_at
        }
        fn set_created_at(&mut self, at: i64) {
            self.created_at = at;
        }
        fn set_updated_at(&mut self, at: i64) {
            self.updated_at = at;
        }
    }

    fn cache() -> (LocalCache<Brew>, Arc<InMemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = LocalCache::new(store.clone(), &CacheConfig::default(), clock.clone());
        (cache, store, clock)
    }

    #[tokio::test]
    async fn empty_storage_lists_nothing() {
        let (cache, _, _) = cache();
        assert!(cache.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_temp_id_and_pending() {
        let (cache, _, _) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();

        assert!(created.id.starts_with("temp_"));
        assert_eq!(created.created_at, 1_000);

        let envelope = cache.get(&created.id).await.unwrap().unwrap();
        assert_eq!(envelope.sync_status, SyncStatus::Pending);
        assert!(envelope.needs_sync);
        assert_eq!(envelope.last_modified, 1_000);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped_to_owner() {
        let (cache, _, clock) = cache();
        let first = cache.create(Brew::new("u1", "Stout")).await.unwrap();
        clock.advance(10);
        let second = cache.create(Brew::new("u1", "Porter")).await.unwrap();
        clock.advance(10);
        cache.create(Brew::new("u2", "Lager")).await.unwrap();
        clock.advance(10);
        let third = cache.create(Brew::new("u1", "Saison")).await.unwrap();

        let ids: Vec<String> = cache.list("u1").await.unwrap().into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn list_is_idempotent() {
        let (cache, _, clock) = cache();
        cache.create(Brew::new("u1", "A")).await.unwrap();
        clock.advance(1);
        cache.create(Brew::new("u1", "B")).await.unwrap();

        assert_eq!(cache.list("u1").await.unwrap(), cache.list("u1").await.unwrap());
    }

    #[tokio::test]
    async fn update_merges_patch_and_bumps_timestamps() {
        let (cache, _, clock) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();
        clock.advance(50);

        let updated = cache
            .update(&created.id, &json!({"name": "Hazy IPA", "abv": 6.5, "id": "evil"}))
            .await
            .unwrap();

        assert_eq!(updated.name, "Hazy IPA");
        assert_eq!(updated.abv, 6.5);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, 1_000);
        assert_eq!(updated.updated_at, 1_050);
        assert_eq!(cache.get(&created.id).await.unwrap().unwrap().last_modified, 1_050);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let (cache, _, _) = cache();
        let err = cache.update("nope", &json!({"name": "x"})).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_rejects_owner_change_and_non_objects() {
        let (cache, _, _) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();

        let err = cache.update(&created.id, &json!({"owner_id": "u2"})).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch(_)));

        let err = cache.update(&created.id, &json!(["name"])).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidPatch(_)));
    }

    #[tokio::test]
    async fn delete_keeps_tombstone_but_hides_it() {
        let (cache, _, clock) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();
        clock.advance(5);
        cache.delete(&created.id, "u1").await.unwrap();

        assert!(cache.list("u1").await.unwrap().is_empty());
        let tombstone = cache.get(&created.id).await.unwrap().unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.deleted_at, Some(1_005));
        assert_eq!(tombstone.sync_status, SyncStatus::Pending);

        let err = cache.update(&created.id, &json!({"name": "back"})).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_requires_owner() {
        let (cache, _, _) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();
        let err = cache.delete(&created.id, "u2").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(cache.list("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_millisecond_creates_keep_insertion_order_across_sync() {
        let (cache, _, _) = cache();
        let older = cache.create(Brew::new("u1", "Mild")).await.unwrap();
        let newer = cache.create(Brew::new("u1", "Bitter")).await.unwrap();

        let names = |list: Vec<Brew>| list.into_iter().map(|b| b.name).collect::<Vec<_>>();
        assert_eq!(names(cache.list("u1").await.unwrap()), vec!["Bitter", "Mild"]);

        // Server ids chosen to sort opposite to insertion order.
        let mut server = newer.clone();
        server.id = "1".into();
        cache.apply_server_result(&newer.id, server).await.unwrap();
        let mut server = older.clone();
        server.id = "9".into();
        cache.apply_server_result(&older.id, server).await.unwrap();

        assert_eq!(names(cache.list("u1").await.unwrap()), vec!["Bitter", "Mild"]);
    }

    #[tokio::test]
    async fn apply_server_result_rewrites_temp_id() {
        let (cache, _, _) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();

        let mut server = created.clone();
        server.id = "42".into();
        cache.apply_server_result(&created.id, server).await.unwrap();

        assert!(cache.get(&created.id).await.unwrap().is_none());
        let envelope = cache.get("42").await.unwrap().unwrap();
        assert_eq!(envelope.sync_status, SyncStatus::Synced);
        assert!(!envelope.needs_sync);
        assert_eq!(envelope.data.id, "42");
    }

    #[tokio::test]
    async fn apply_server_result_inserts_missing_envelope() {
        let (cache, _, _) = cache();
        let mut server = Brew::new("u1", "IPA");
        server.id = "7".into();
        cache.apply_server_result("temp_lost", server).await.unwrap();

        let listed = cache.list("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "7");
    }

    #[tokio::test]
    async fn remove_confirmed_tombstone_drops_entry() {
        let (cache, _, _) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();
        cache.delete(&created.id, "u1").await.unwrap();
        cache.remove_confirmed_tombstone(&created.id).await.unwrap();
        assert!(cache.get(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_failed_is_listed() {
        let (cache, _, _) = cache();
        let created = cache.create(Brew::new("u1", "IPA")).await.unwrap();
        cache.mark_failed(&created.id, "Max retries reached").await.unwrap();

        let failed = cache.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].sync_status, SyncStatus::Error);
        assert_eq!(cache.list("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupted_blob_is_cache_unavailable() {
        let (cache, store, _) = cache();
        store.set("entities:brew", "{oops".into()).await.unwrap();

        let err = cache.list("u1").await.unwrap_err();
        assert!(err.is_unavailable());
        let err = cache.create(Brew::new("u1", "IPA")).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn remap_id_keeps_pending_data() {
        let mut set = EnvelopeSet::new();
        let created = set.insert_local(Brew::new("u1", "IPA"), "temp_1".into(), 1);
        set.update(&created.id, &json!({"name": "Edited"}), 2).unwrap();

        assert!(set.remap_id("temp_1", "42"));
        let envelope = set.get("42").unwrap();
        assert_eq!(envelope.data.name, "Edited");
        assert_eq!(envelope.data.id, "42");
        assert_eq!(envelope.sync_status, SyncStatus::Pending);
        assert!(!set.remap_id("temp_1", "43"));
    }

    proptest! {
        #[test]
        fn tombstones_never_listed(deletes in prop::collection::vec(any::<bool>(), 1..24)) {
            let mut set = EnvelopeSet::new();
            for (i, delete) in deletes.iter().enumerate() {
                let created = set.insert_local(Brew::new("u1", "b"), format!("temp_{i}"), i as i64);
                if *delete {
                    set.tombstone(&created.id, "u1", i as i64).unwrap();
                    if i % 3 == 0 {
                        set.mark_failed(&created.id, "dropped");
                    }
                }
            }

            let visible = set.visible_for("u1");
            prop_assert_eq!(visible.len(), deletes.iter().filter(|d| !**d).count());
            prop_assert!(visible.iter().all(|e| !e.is_deleted));
            prop_assert!(visible
                .windows(2)
                .all(|w| w[0].data.created_at >= w[1].data.created_at));
        }
    }
}
