//! # brewcache core
//!
//! Local entity cache and pending operation journal for brewcache.
//!
//! This crate provides:
//! - [`Envelope`]: a cached record plus its sync bookkeeping
//! - [`LocalCache`]: the id → envelope collection under one store key
//! - [`Journal`]: the FIFO queue of pending create/update/delete intents
//! - [`SyncMetadataStore`]: the "last sync attempt" record
//! - [`LocalState`]: all three over one store, with atomic cache + journal commits
//!
//! Every persisted structure has an in-memory half ([`EnvelopeSet`],
//! [`OperationQueue`]) holding the pure transitions, and a persisted half that
//! loads, encodes and saves it. Callers that need to write the cache and the
//! journal as one unit load both, mutate them, and hand the two encoded
//! entries to [`brewcache_storage::KeyValueStore::set_many`].
//!
//! ## Key Invariants
//!
//! - Tombstoned envelopes are never listed
//! - Tombstones stay in storage until the delete is confirmed remotely
//! - Operations leave the journal only on success or retry exhaustion
//! - Offline-created records carry a temporary id until the server assigns one

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod clock;
mod config;
mod envelope;
mod error;
mod journal;
mod metadata;
mod operation;
mod record;
mod state;

pub use cache::{EnvelopeSet, LocalCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use envelope::{Envelope, SyncStatus};
pub use error::{CoreError, CoreResult};
pub use journal::{Journal, OperationQueue};
pub use metadata::{SyncMetadata, SyncMetadataStore, SyncSummary};
pub use operation::{OperationType, PendingOperation};
pub use record::{is_temporary_id, new_temp_id, Record};
pub use state::LocalState;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
