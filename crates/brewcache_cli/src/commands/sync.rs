//! Sync command implementation.

use super::{CommandResult, Context};

/// Runs one reconciliation pass and prints its report.
pub async fn run(ctx: &Context) -> CommandResult {
    let report = ctx.repo.sync_pending_operations().await?;

    if ctx.json() {
        return ctx.print_json(&report);
    }

    println!(
        "Sync {}: {} processed, {} failed, {} deferred",
        if report.success { "complete" } else { "incomplete" },
        report.processed,
        report.failed,
        report.deferred
    );
    for error in &report.errors {
        println!("  - {error}");
    }
    if report.errors.iter().any(|e| e.starts_with("Max retries")) {
        println!("Some operations were dropped; see `brewcache failed`.");
    }
    Ok(())
}
