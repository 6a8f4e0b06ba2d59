//! Queue commands: pending, clear-queue, failed, retry-failed.

use super::{format_millis, CommandResult, Context};

/// Lists queued operations in the order they will be replayed.
pub async fn pending(ctx: &Context) -> CommandResult {
    let ops = ctx.repo.pending_operations().await?;

    if ctx.json() {
        return ctx.print_json(&ops);
    }
    if ops.is_empty() {
        println!("Nothing to sync.");
        return Ok(());
    }

    for op in &ops {
        println!(
            "{:<7} {:<8} {:<38} attempts {}/{}  queued {}",
            op.op_type,
            op.entity_type,
            op.entity_id,
            op.retry_count,
            op.max_retries,
            format_millis(op.timestamp)
        );
    }
    Ok(())
}

/// Empties the queue.
pub async fn clear(ctx: &Context) -> CommandResult {
    let count = ctx.repo.pending_operations_count().await;
    ctx.repo.clear_sync_queue().await?;

    if ctx.json() {
        return ctx.print_json(&serde_json::json!({ "cleared": count }));
    }
    println!("Cleared {count} queued operation(s)");
    Ok(())
}

/// Lists recipes whose last operation was dropped.
pub async fn failed(ctx: &Context) -> CommandResult {
    let failed = ctx.repo.failed_entities().await?;

    if ctx.json() {
        return ctx.print_json(&failed);
    }
    if failed.is_empty() {
        println!("No failed recipes.");
        return Ok(());
    }

    for envelope in &failed {
        let state = if envelope.is_deleted { "deleted" } else { "live" };
        println!(
            "{:<38} {:<24} {:<8} {}",
            envelope.id,
            envelope.data.name,
            state,
            envelope.last_error.as_deref().unwrap_or("")
        );
    }
    println!("Run `brewcache retry-failed` to queue them again.");
    Ok(())
}

/// Requeues recipes whose last operation was dropped.
pub async fn retry_failed(ctx: &Context) -> CommandResult {
    let count = ctx.repo.requeue_failed().await?;

    if ctx.json() {
        return ctx.print_json(&serde_json::json!({ "requeued": count }));
    }
    println!("Requeued {count} recipe(s)");
    Ok(())
}
