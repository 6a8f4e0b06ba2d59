//! # brewcache storage
//!
//! Persisted key-value store contract and implementations for brewcache.
//!
//! Stores are **opaque string stores**: they map a key to a serialized blob
//! and never interpret the blob. The local cache, the pending operation
//! journal and the sync metadata each live under their own key.
//!
//! ## Design Principles
//!
//! - Every `get`/`set`/`remove` is independently atomic
//! - `set_many` commits several keys as one unit where the backend can
//! - Must be `Send + Sync`; all calls are async
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - Single JSON document on disk, replaced atomically
//!
//! ## Example
//!
//! ```rust
//! use brewcache_storage::{InMemoryStore, KeyValueStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryStore::new();
//! store.set("greeting", "hello".to_string()).await.unwrap();
//! assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hello"));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
