//! Status command implementation.

use super::{format_millis, CommandResult, Context};
use brewcache_core::SyncSummary;
use serde::Serialize;

/// What the status command reports.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Core library version.
    pub version: &'static str,
    /// Acting user.
    pub owner: String,
    /// Live recipes for the owner.
    pub recipes: usize,
    /// Queued operations.
    pub pending_operations: usize,
    /// Recipes whose operations were dropped.
    pub failed: usize,
    /// Whether the loopback server refuses calls.
    pub offline: bool,
    /// End of the last sync attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<i64>,
    /// Counts from the last sync attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<SyncSummary>,
}

/// Runs the status command.
pub async fn run(ctx: &Context) -> CommandResult {
    let metadata = ctx.repo.sync_metadata().await?;
    let report = StatusReport {
        version: brewcache_core::VERSION,
        owner: ctx.owner.clone(),
        recipes: ctx.repo.list(&ctx.owner).await?.len(),
        pending_operations: ctx.repo.pending_operations_count().await,
        failed: ctx.repo.failed_entities().await?.len(),
        offline: ctx.repo.remote().is_offline(),
        last_sync: metadata.last_sync,
        last_summary: metadata.last_summary,
    };

    if ctx.json() {
        return ctx.print_json(&report);
    }

    println!("brewcache v{}", report.version);
    println!("Owner:              {}", report.owner);
    println!("Recipes:            {}", report.recipes);
    println!("Pending operations: {}", report.pending_operations);
    println!("Failed:             {}", report.failed);
    println!(
        "Remote:             {}",
        if report.offline { "offline" } else { "online" }
    );
    match (report.last_sync, report.last_summary) {
        (Some(at), Some(summary)) => println!(
            "Last sync:          {} ({} processed, {} failed)",
            format_millis(at),
            summary.processed,
            summary.failed
        ),
        (Some(at), None) => println!("Last sync:          {}", format_millis(at)),
        _ => println!("Last sync:          never"),
    }
    Ok(())
}
