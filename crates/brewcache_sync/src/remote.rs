//! Remote API abstraction.

use crate::error::RemoteResult;
use async_trait::async_trait;
use brewcache_core::Record;
use std::sync::Arc;

/// The server side of the sync loop for one record type.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP clients, the in-process [`LoopbackRemote`], scripted
/// mocks for testing). Every call returns the server's canonical form of the
/// record, which replaces the cached one.
///
/// [`LoopbackRemote`]: crate::LoopbackRemote
#[async_trait]
pub trait RemoteApi<T: Record>: Send + Sync {
    /// Creates `record` on the server and returns it with its server id.
    async fn create(&self, record: &T) -> RemoteResult<T>;

    /// Replaces the server's record `id`.
    async fn update(&self, id: &str, record: &T) -> RemoteResult<T>;

    /// Deletes the server's record `id`.
    async fn delete(&self, id: &str) -> RemoteResult<()>;
}

#[async_trait]
impl<T, R> RemoteApi<T> for Arc<R>
where
    T: Record,
    R: RemoteApi<T> + ?Sized,
{
    async fn create(&self, record: &T) -> RemoteResult<T> {
        (**self).create(record).await
    }

    async fn update(&self, id: &str, record: &T) -> RemoteResult<T> {
        (**self).update(id, record).await
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        (**self).delete(id).await
    }
}
