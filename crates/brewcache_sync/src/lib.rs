//! # brewcache sync
//!
//! Sync reconciler and offline repository for brewcache.
//!
//! This crate provides:
//! - [`OfflineRepository`]: list/create/update/delete against the local cache,
//!   journaling every mutation for later replay
//! - [`Reconciler`]: the single-flight pass that replays the journal against
//!   a [`RemoteApi`]
//! - [`spawn_periodic_sync`]: a tokio task running passes on a timer
//! - [`LoopbackRemote`]: an in-process server for demos and tests
//!
//! ## Pass semantics
//!
//! A pass snapshots the journal and attempts each operation in FIFO order:
//! 1. Success applies the server's record to the cache (moving a temporary id
//!    to the server id) and removes the operation
//! 2. Failure bumps the retry count, or drops the operation once the retry
//!    budget is spent and marks the record `error`
//! 3. The pass always ends by recording `last_sync`
//!
//! ## Key Invariants
//!
//! - At most one pass runs at a time per repository
//! - Operations on one entity are attempted in the order they were journaled
//! - Queued operations never reference a temporary id after its create is
//!   confirmed
//! - The remote is never called while the local write lock is held

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod loopback;
mod periodic;
mod reconciler;
mod remote;
mod repository;

pub use config::{BackoffConfig, SyncConfig};
pub use error::{RemoteError, RemoteResult, SyncError, SyncResult};
pub use loopback::LoopbackRemote;
pub use periodic::spawn_periodic_sync;
pub use reconciler::{Reconciler, SyncReport, SyncState, SyncStats};
pub use remote::RemoteApi;
pub use repository::OfflineRepository;
