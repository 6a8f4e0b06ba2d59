//! Pending operations.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Kind of local mutation to replay remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Entity was created locally.
    Create,
    /// Entity was edited locally.
    Update,
    /// Entity was tombstoned locally.
    Delete,
}

impl OperationType {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A durable, queued intent to replay one local mutation.
///
/// # Fields
///
/// - `id`: unique operation id
/// - `op_type`: create, update or delete
/// - `entity_type`: record discriminator
/// - `entity_id`: local id the operation targets (temporary for creates)
/// - `data`: full record for create/update, absent for delete
/// - `retry_count` / `max_retries`: bounded retry bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Unique operation id.
    pub id: String,
    /// Operation type.
    #[serde(rename = "type")]
    pub op_type: OperationType,
    /// Record discriminator.
    pub entity_type: String,
    /// Target entity id.
    pub entity_id: String,
    /// Record payload (create/update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// When the operation was journaled.
    pub timestamp: i64,
    /// Failed attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Attempts allowed before the operation is dropped.
    pub max_retries: u32,
}

impl PendingOperation {
    fn new(
        op_type: OperationType,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        data: Option<Value>,
        timestamp: i64,
        max_retries: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op_type,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            data,
            timestamp,
            retry_count: 0,
            max_retries,
        }
    }

    /// Creates a create operation.
    pub fn create(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        data: Value,
        timestamp: i64,
        max_retries: u32,
    ) -> Self {
        Self::new(
            OperationType::Create,
            entity_type,
            entity_id,
            Some(data),
            timestamp,
            max_retries,
        )
    }

    /// Creates an update operation.
    pub fn update(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        data: Value,
        timestamp: i64,
        max_retries: u32,
    ) -> Self {
        Self::new(
            OperationType::Update,
            entity_type,
            entity_id,
            Some(data),
            timestamp,
            max_retries,
        )
    }

    /// Creates a delete operation.
    pub fn delete(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        timestamp: i64,
        max_retries: u32,
    ) -> Self {
        Self::new(
            OperationType::Delete,
            entity_type,
            entity_id,
            None,
            timestamp,
            max_retries,
        )
    }

    /// Returns true if one more failure exhausts the retry budget.
    pub fn is_last_attempt(&self) -> bool {
        self.retry_count.saturating_add(1) >= self.max_retries
    }

    /// Decodes the payload as a record.
    ///
    /// Returns `None` when the operation carries no payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.data.clone().map(serde_json::from_value)
    }
}
