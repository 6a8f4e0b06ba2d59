//! Recipe commands: list, add, edit, rm.

use super::{format_millis, CommandResult, Context};
use crate::model::Recipe;
use serde_json::Value;

/// Runs the list command.
pub async fn list(ctx: &Context, show_status: bool) -> CommandResult {
    let envelopes = ctx.repo.list_envelopes(&ctx.owner).await?;

    if ctx.json() {
        if show_status {
            return ctx.print_json(&envelopes);
        }
        let records: Vec<&Recipe> = envelopes.iter().map(|e| &e.data).collect();
        return ctx.print_json(&records);
    }

    if envelopes.is_empty() {
        println!("No recipes for {}.", ctx.owner);
        return Ok(());
    }

    for envelope in &envelopes {
        let recipe = &envelope.data;
        let style = recipe.style.as_deref().unwrap_or("-");
        let abv = recipe
            .abv
            .map(|abv| format!("{abv:.1}%"))
            .unwrap_or_else(|| "-".into());
        if show_status {
            println!(
                "{:<38} {:<24} {:<14} {:>6}  {:<8} {}",
                envelope.id,
                recipe.name,
                style,
                abv,
                envelope.sync_status,
                format_millis(envelope.last_modified)
            );
        } else {
            println!("{:<38} {:<24} {:<14} {:>6}", envelope.id, recipe.name, style, abv);
        }
    }
    Ok(())
}

/// Runs the add command.
pub async fn add(
    ctx: &Context,
    name: String,
    style: Option<String>,
    abv: Option<f64>,
    notes: Option<String>,
) -> CommandResult {
    let recipe = Recipe {
        style,
        abv,
        notes,
        ..Recipe::new(&ctx.owner, &name)
    };
    let created = ctx.repo.create(recipe).await?;

    if ctx.json() {
        return ctx.print_json(&created);
    }
    println!("Added {} ({}), pending sync", created.name, created.id);
    Ok(())
}

/// Runs the edit command.
pub async fn edit(ctx: &Context, id: &str, patch: &str) -> CommandResult {
    let patch: Value = serde_json::from_str(patch)?;
    let updated = ctx.repo.update(id, &patch).await?;

    if ctx.json() {
        return ctx.print_json(&updated);
    }
    println!("Updated {} ({}), pending sync", updated.name, updated.id);
    Ok(())
}

/// Runs the rm command.
pub async fn remove(ctx: &Context, id: &str) -> CommandResult {
    ctx.repo.delete(id, &ctx.owner).await?;

    if ctx.json() {
        return ctx.print_json(&serde_json::json!({ "deleted": id }));
    }
    println!("Deleted {id}");
    Ok(())
}
