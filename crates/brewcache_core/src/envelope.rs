//! Cached record envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the server has confirmed the cached state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// The server has this exact state.
    Synced,
    /// A local mutation has not been confirmed yet.
    Pending,
    /// An operation for this record was dropped after exhausting retries.
    Error,
}

impl SyncStatus {
    /// Returns the lowercase name used in the persisted form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A domain record wrapped with sync bookkeeping.
///
/// `needs_sync` always equals `sync_status != Synced`; every transition below
/// keeps the two in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Locally unique id; temporary until the server assigns one.
    pub id: String,
    /// The domain record.
    pub data: T,
    /// Time of the last local mutation or server confirmation.
    pub last_modified: i64,
    /// Sync state.
    pub sync_status: SyncStatus,
    /// Redundant with `sync_status`, kept for cheap filtering.
    pub needs_sync: bool,
    /// Tombstone flag.
    #[serde(default)]
    pub is_deleted: bool,
    /// When the tombstone was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    /// Error text recorded when an operation for this record was dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl<T> Envelope<T> {
    /// Wraps a locally created record awaiting sync.
    pub fn pending(id: impl Into<String>, data: T, now: i64) -> Self {
        Self {
            id: id.into(),
            data,
            last_modified: now,
            sync_status: SyncStatus::Pending,
            needs_sync: true,
            is_deleted: false,
            deleted_at: None,
            last_error: None,
        }
    }

    /// Wraps a record confirmed by the server.
    pub fn synced(id: impl Into<String>, data: T, now: i64) -> Self {
        Self {
            sync_status: SyncStatus::Synced,
            needs_sync: false,
            ..Self::pending(id, data, now)
        }
    }

    /// Returns true unless the envelope is a tombstone.
    pub fn is_visible(&self) -> bool {
        !self.is_deleted
    }

    /// Marks a local mutation at `now`.
    pub fn mark_pending(&mut self, now: i64) {
        self.last_modified = now;
        self.sync_status = SyncStatus::Pending;
        self.needs_sync = true;
        self.last_error = None;
    }

    /// Marks the envelope as matching the server.
    pub fn mark_synced(&mut self, now: i64) {
        self.last_modified = now;
        self.sync_status = SyncStatus::Synced;
        self.needs_sync = false;
        self.last_error = None;
    }

    /// Marks the envelope as permanently out of sync.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Error;
        self.needs_sync = true;
        self.last_error = Some(message.into());
    }

    /// Turns the envelope into a tombstone awaiting a confirmed delete.
    pub fn tombstone(&mut self, now: i64) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.mark_pending(now);
    }
}
