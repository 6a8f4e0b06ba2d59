//! CLI command implementations.

pub mod queue;
pub mod recipes;
pub mod status;
pub mod sync;

use crate::model::Recipe;
use crate::OutputFormat;
use brewcache_core::CacheConfig;
use brewcache_storage::{FileStore, KeyValueStore};
use brewcache_sync::{LoopbackRemote, OfflineRepository};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Result type of CLI commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Repository type used by the CLI.
pub type RecipeRepo = OfflineRepository<Recipe, Arc<LoopbackRemote<Recipe>>>;

/// Everything a command needs.
pub struct Context {
    /// The recipe repository.
    pub repo: RecipeRepo,
    /// Acting user.
    pub owner: String,
    /// Output format.
    pub format: OutputFormat,
}

impl Context {
    /// Opens the local store and the loopback server.
    ///
    /// Both files are locked for the lifetime of the context.
    pub fn open(
        store_path: &Path,
        remote_path: &Path,
        owner: &str,
        max_retries: u32,
        offline: bool,
        format: OutputFormat,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if store_path == remote_path {
            return Err("--store and --remote must be different files".into());
        }

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open_with_create_dirs(store_path)?);
        let remote_store: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::open_with_create_dirs(remote_path)?);
        let remote = Arc::new(LoopbackRemote::new(remote_store));
        remote.set_offline(offline);
        debug!(store = %store_path.display(), remote = %remote_path.display(), offline, "opened stores");

        let config = CacheConfig::default().with_max_retries(max_retries);
        Ok(Self {
            repo: OfflineRepository::new(store, remote, config),
            owner: owner.to_string(),
            format,
        })
    }

    /// Returns true if output should be JSON.
    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Prints `value` as pretty JSON.
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> CommandResult {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Formats epoch milliseconds as a UTC timestamp.
pub fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}
