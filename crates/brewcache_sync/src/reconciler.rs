//! Single-flight reconciliation of the journal against the remote API.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteApi;
use brewcache_core::{
    CoreResult, LocalState, OperationType, PendingOperation, Record, SyncSummary,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Whether a reconciliation pass is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass is running.
    Idle,
    /// A pass holds the guard.
    Running,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// True if no operation failed.
    pub success: bool,
    /// Operations confirmed by the server.
    pub processed: u32,
    /// Operations that failed, whether requeued or dropped.
    pub failed: u32,
    /// One message per failure, in processing order.
    pub errors: Vec<String>,
    /// Operations left for the next pass because an earlier operation on the
    /// same entity failed in this one.
    #[serde(default)]
    pub deferred: u32,
}

/// Statistics across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to the end.
    pub passes_completed: u64,
    /// Total operations confirmed.
    pub operations_processed: u64,
    /// Total failed attempts.
    pub operations_failed: u64,
    /// Duration of the last pass.
    pub last_pass_duration: Option<Duration>,
    /// Last pass-level error (local storage), if the last pass hit one.
    /// Includes a failure to persist the pass's sync metadata.
    pub last_error: Option<String>,
}

/// What the server confirmed for one operation.
enum Confirmed<T> {
    Saved(T),
    Deleted,
}

/// Holds the single-flight flag for the lifetime of a pass.
struct PassGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Replays the pending operation journal against a [`RemoteApi`].
///
/// At most one pass runs at a time per reconciler; a second caller gets
/// [`SyncError::SyncInProgress`] immediately. Operations are attempted in
/// journal order and each one is isolated: a failure is recorded and the pass
/// moves on. Later operations on an entity whose operation just failed are
/// deferred to the next pass so one entity's operations never reorder.
///
/// Local mutations may interleave with a pass. The write lock of
/// [`LocalState`] is taken only to apply an outcome, never across a remote
/// call.
pub struct Reconciler<T: Record, R: RemoteApi<T>> {
    local: Arc<LocalState<T>>,
    remote: R,
    running: AtomicBool,
    stats: RwLock<SyncStats>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record, R: RemoteApi<T>> Reconciler<T, R> {
    /// Creates a reconciler over `local` and `remote`.
    pub fn new(local: Arc<LocalState<T>>, remote: R) -> Self {
        Self {
            local,
            remote,
            running: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
            _record: PhantomData,
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        if self.running.load(Ordering::Acquire) {
            SyncState::Running
        } else {
            SyncState::Idle
        }
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The remote this reconciler talks to.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Runs one reconciliation pass.
    ///
    /// Sync metadata is written at the end of every pass that got past the
    /// guard, including passes that stopped on a local storage error. If that
    /// write fails the report is still returned and the failure is kept in
    /// [`SyncStats::last_error`].
    ///
    /// # Errors
    ///
    /// - `SyncInProgress` if another pass is running; nothing is touched
    /// - `Core` if the cache or journal cannot be read or written
    pub async fn run_pass(&self) -> SyncResult<SyncReport> {
        let _guard = PassGuard::acquire(&self.running).ok_or(SyncError::SyncInProgress)?;
        let start = Instant::now();

        let mut report = SyncReport::default();
        let drained = self.drain(&mut report).await;
        report.success = report.failed == 0;

        let summary = SyncSummary {
            processed: report.processed,
            failed: report.failed,
        };
        let recorded = self.local.metadata().record_pass(self.local.now(), summary).await;
        if let Err(e) = &recorded {
            warn!(error = %e, "failed to record sync metadata");
        }

        let duration = start.elapsed();
        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.operations_processed += u64::from(report.processed);
            stats.operations_failed += u64::from(report.failed);
            stats.last_pass_duration = Some(duration);
            stats.last_error = match (&drained, &recorded) {
                (Err(e), _) => Some(e.to_string()),
                (Ok(()), Err(e)) => Some(format!("sync metadata not recorded: {e}")),
                (Ok(()), Ok(())) => None,
            };
        }

        drained?;
        info!(
            entity_type = T::ENTITY_TYPE,
            processed = report.processed,
            failed = report.failed,
            deferred = report.deferred,
            elapsed_ms = duration.as_millis() as u64,
            "sync pass finished"
        );
        Ok(report)
    }

    async fn drain(&self, report: &mut SyncReport) -> CoreResult<()> {
        let snapshot: Vec<String> = self
            .local
            .journal()
            .dequeue_all()
            .await?
            .into_iter()
            .filter(|op| op.entity_type == T::ENTITY_TYPE)
            .map(|op| op.id)
            .collect();
        debug!(operations = snapshot.len(), "sync pass started");

        let mut blocked: HashSet<String> = HashSet::new();
        for op_id in snapshot {
            // Re-read so remaps made earlier in this pass are visible.
            let Some(op) = self.local.journal().load().await?.get(&op_id).cloned() else {
                debug!(op_id = %op_id, "operation left the journal, skipping");
                continue;
            };

            if blocked.contains(&op.entity_id) {
                debug!(op_id = %op.id, entity_id = %op.entity_id, "deferring operation");
                report.deferred += 1;
                continue;
            }

            match self.attempt(&op).await {
                Ok(confirmed) => {
                    self.confirm(&op, confirmed).await?;
                    report.processed += 1;
                }
                Err(message) => {
                    blocked.insert(op.entity_id.clone());
                    self.fail(&op, &message, report).await?;
                }
            }
        }
        Ok(())
    }

    async fn attempt(&self, op: &PendingOperation) -> Result<Confirmed<T>, String> {
        debug!(
            op_id = %op.id,
            op_type = %op.op_type,
            entity_id = %op.entity_id,
            attempt = op.retry_count + 1,
            "sending operation"
        );
        match op.op_type {
            OperationType::Create => {
                let record = decode_payload::<T>(op)?;
                self.remote
                    .create(&record)
                    .await
                    .map(Confirmed::Saved)
                    .map_err(|e| e.to_string())
            }
            OperationType::Update => {
                let mut record = decode_payload::<T>(op)?;
                record.set_id(op.entity_id.clone());
                self.remote
                    .update(&op.entity_id, &record)
                    .await
                    .map(Confirmed::Saved)
                    .map_err(|e| e.to_string())
            }
            OperationType::Delete => self
                .remote
                .delete(&op.entity_id)
                .await
                .map(|()| Confirmed::Deleted)
                .map_err(|e| e.to_string()),
        }
    }

    async fn confirm(&self, op: &PendingOperation, confirmed: Confirmed<T>) -> CoreResult<()> {
        let _lock = self.local.lock().await;
        let (mut set, mut queue) = self.local.load().await?;
        queue.remove(&op.id);

        match confirmed {
            Confirmed::Saved(mut server) => {
                if server.id().is_empty() {
                    server.set_id(op.entity_id.clone());
                }
                let server_id = server.id().to_string();

                if queue.references(&op.entity_id) {
                    // Later local edits are still queued; keep them and only move the id.
                    set.remap_id(&op.entity_id, &server_id);
                    let remapped = queue.remap_entity(&op.entity_id, &server_id);
                    debug!(
                        from = %op.entity_id,
                        to = %server_id,
                        remapped,
                        "remapped entity with queued operations"
                    );
                } else {
                    set.apply_server_result(&op.entity_id, server, self.local.now());
                }
            }
            Confirmed::Deleted => {
                set.remove(&op.entity_id);
            }
        }

        self.local.commit(&set, &queue).await?;
        debug!(op_id = %op.id, op_type = %op.op_type, "operation confirmed");
        Ok(())
    }

    async fn fail(
        &self,
        op: &PendingOperation,
        message: &str,
        report: &mut SyncReport,
    ) -> CoreResult<()> {
        let _lock = self.local.lock().await;
        let (mut set, mut queue) = self.local.load().await?;
        report.failed += 1;

        let Some(current) = queue.get(&op.id).cloned() else {
            report.errors.push(format!("{} {}: {message}", op.op_type, op.entity_type));
            return Ok(());
        };

        if current.is_last_attempt() {
            queue.remove(&op.id);
            let summary = format!("Max retries reached for {} {}", op.op_type, op.entity_type);

            // Nothing queued behind a dropped create can reach the server.
            let discarded = if op.op_type == OperationType::Create {
                queue.discard_entity(&op.entity_id)
            } else {
                0
            };
            set.mark_failed(&op.entity_id, &format!("{summary}: {message}"));
            self.local.commit(&set, &queue).await?;

            warn!(
                op_id = %op.id,
                entity_id = %op.entity_id,
                discarded,
                error = %message,
                "{summary}, operation dropped"
            );
            report.errors.push(summary);
        } else {
            let retries = queue.increment_retry(&op.id).unwrap_or(current.retry_count);
            self.local.commit(&set, &queue).await?;

            debug!(
                op_id = %op.id,
                retries,
                max_retries = current.max_retries,
                error = %message,
                "operation failed, kept for next pass"
            );
            report
                .errors
                .push(format!("{} {}: {message}", op.op_type, op.entity_type));
        }
        Ok(())
    }
}

fn decode_payload<T: Record>(op: &PendingOperation) -> Result<T, String> {
    match op.payload::<T>() {
        Some(Ok(record)) => Ok(record),
        Some(Err(e)) => Err(format!("invalid payload: {e}")),
        None => Err("missing payload".to_string()),
    }
}
