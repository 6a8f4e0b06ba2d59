//! The domain record contract.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A user-owned domain record that can be cached and synced.
///
/// The record carries its own id, owner and timestamps; the cache rewrites the
/// id when a temporary id is replaced by a server id and stamps the
/// timestamps on local mutations.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Discriminator written into pending operations.
    const ENTITY_TYPE: &'static str;

    /// Returns the record id.
    fn id(&self) -> &str;

    /// Replaces the record id.
    fn set_id(&mut self, id: String);

    /// Returns the id of the owning user.
    fn owner_id(&self) -> &str;

    /// Returns the creation time in milliseconds since the epoch.
    fn created_at(&self) -> i64;

    /// Sets the creation time.
    fn set_created_at(&mut self, at: i64);

    /// Sets the record's own `updated_at`.
    fn set_updated_at(&mut self, at: i64);
}

/// Generates a temporary id with the given prefix.
pub fn new_temp_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

/// Returns true if `id` was generated locally with `prefix`.
pub fn is_temporary_id(id: &str, prefix: &str) -> bool {
    !prefix.is_empty() && id.starts_with(prefix)
}
