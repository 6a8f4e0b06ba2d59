//! A remote whose behavior is scripted by the test.

use async_trait::async_trait;
use brewcache_core::{OperationType, Record};
use brewcache_sync::{RemoteApi, RemoteError, RemoteResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// One call received by a [`ScriptedRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall<T> {
    /// Which endpoint was called.
    pub op_type: OperationType,
    /// The id the call targeted; the local id of the record for creates.
    pub entity_id: String,
    /// The record sent, for creates and updates.
    pub record: Option<T>,
}

/// Pauses the next remote call until released.
#[derive(Clone, Default)]
pub struct RemoteGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl RemoteGate {
    /// Waits until a call is blocked on the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the blocked call continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// An in-memory remote with scripted answers.
///
/// By default every call succeeds and creates get sequential ids starting at
/// `"1"`. Tests can queue specific create ids, fail every call on an id, fail
/// the next few calls, or hold the next call at a [`RemoteGate`].
pub struct ScriptedRemote<T> {
    records: Mutex<BTreeMap<String, T>>,
    calls: Mutex<Vec<RemoteCall<T>>>,
    create_ids: Mutex<VecDeque<String>>,
    failing_ids: Mutex<HashMap<String, String>>,
    fail_next: Mutex<VecDeque<String>>,
    gate: Mutex<Option<RemoteGate>>,
    next_id: Mutex<u64>,
}

impl<T: Record> ScriptedRemote<T> {
    /// Creates a remote where every call succeeds.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            create_ids: Mutex::new(VecDeque::new()),
            failing_ids: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            next_id: Mutex::new(1),
        }
    }

    /// Uses `id` for the next successful create.
    pub fn queue_create_id(&self, id: &str) {
        self.create_ids.lock().push_back(id.to_string());
    }

    /// Fails every call that targets `entity_id` with `message`.
    pub fn fail_id(&self, entity_id: &str, message: &str) {
        self.failing_ids
            .lock()
            .insert(entity_id.to_string(), message.to_string());
    }

    /// Stops failing calls on `entity_id`.
    pub fn heal_id(&self, entity_id: &str) {
        self.failing_ids.lock().remove(entity_id);
    }

    /// Fails the next call, whatever it targets.
    pub fn fail_next(&self, message: &str) {
        self.fail_next.lock().push_back(message.to_string());
    }

    /// Holds the next call until the returned gate is released.
    pub fn hold_next(&self) -> RemoteGate {
        let gate = RemoteGate::default();
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RemoteCall<T>> {
        self.calls.lock().clone()
    }

    /// Records the server holds.
    pub fn server_records(&self) -> Vec<T> {
        self.records.lock().values().cloned().collect()
    }

    /// Puts a record on the server directly.
    pub fn seed(&self, record: T) {
        self.records.lock().insert(record.id().to_string(), record);
    }

    async fn enter(&self, op_type: OperationType, entity_id: &str, record: Option<&T>) -> RemoteResult<()> {
        self.calls.lock().push(RemoteCall {
            op_type,
            entity_id: entity_id.to_string(),
            record: record.cloned(),
        });

        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(message) = self.fail_next.lock().pop_front() {
            return Err(RemoteError::transport_retryable(message));
        }
        if let Some(message) = self.failing_ids.lock().get(entity_id) {
            return Err(RemoteError::ServerError(message.clone()));
        }
        Ok(())
    }

    fn assign_id(&self) -> String {
        if let Some(id) = self.create_ids.lock().pop_front() {
            return id;
        }
        let mut next = self.next_id.lock();
        let id = next.to_string();
        *next += 1;
        id
    }
}

impl<T: Record> Default for ScriptedRemote<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> RemoteApi<T> for ScriptedRemote<T> {
    async fn create(&self, record: &T) -> RemoteResult<T> {
        self.enter(OperationType::Create, record.id(), Some(record)).await?;
        let mut saved = record.clone();
        saved.set_id(self.assign_id());
        self.records
            .lock()
            .insert(saved.id().to_string(), saved.clone());
        Ok(saved)
    }

    async fn update(&self, id: &str, record: &T) -> RemoteResult<T> {
        self.enter(OperationType::Update, id, Some(record)).await?;
        let mut records = self.records.lock();
        if !records.contains_key(id) {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        let mut saved = record.clone();
        saved.set_id(id.to_string());
        records.insert(id.to_string(), saved.clone());
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.enter(OperationType::Delete, id, None).await?;
        match self.records.lock().remove(id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(id.to_string())),
        }
    }
}
