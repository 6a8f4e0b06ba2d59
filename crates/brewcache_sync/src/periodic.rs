//! Background sync task.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::remote::RemoteApi;
use crate::repository::OfflineRepository;
use brewcache_core::Record;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns a task that runs a reconciliation pass on a timer.
///
/// The task waits `sync_interval` between clean passes and backs off after
/// passes that reported failures or hit a storage error. A tick that finds a
/// pass already running is skipped. The task runs until the handle is
/// aborted.
pub fn spawn_periodic_sync<T, R>(
    repo: Arc<OfflineRepository<T, R>>,
    config: SyncConfig,
) -> JoinHandle<()>
where
    T: Record,
    R: RemoteApi<T> + 'static,
{
    tokio::spawn(async move {
        let mut consecutive_failures = 0u32;
        loop {
            tokio::time::sleep(config.next_delay(consecutive_failures)).await;

            match repo.sync_pending_operations().await {
                Ok(report) if report.success => consecutive_failures = 0,
                Ok(report) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    debug!(
                        failed = report.failed,
                        consecutive_failures, "periodic pass had failures, backing off"
                    );
                }
                Err(SyncError::SyncInProgress) => {
                    debug!("sync already running, skipping tick");
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    warn!(error = %e, consecutive_failures, "periodic sync pass failed");
                }
            }
        }
    })
}
