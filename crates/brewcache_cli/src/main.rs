//! brewcache CLI
//!
//! Offline-first recipe notebook backed by brewcache.
//!
//! # Commands
//!
//! - `list` - List recipes, newest first
//! - `add` / `edit` / `rm` - Mutate recipes locally and queue them for sync
//! - `sync` - Replay queued operations against the remote
//! - `pending` / `clear-queue` - Inspect or empty the operation queue
//! - `failed` / `retry-failed` - Inspect or requeue dropped operations
//! - `status` - Show queue size and the last sync attempt

mod commands;
mod model;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// brewcache command-line recipe notebook.
#[derive(Parser)]
#[command(name = "brewcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the local state file
    #[arg(global = true, long, env = "BREWCACHE_STORE", default_value = "brewcache.json")]
    store: PathBuf,

    /// Path of the loopback server's state file
    #[arg(
        global = true,
        long,
        env = "BREWCACHE_REMOTE",
        default_value = "brewcache-remote.json"
    )]
    remote: PathBuf,

    /// Acting user
    #[arg(global = true, long, env = "BREWCACHE_OWNER", default_value = "local")]
    owner: String,

    /// Attempts per queued operation before it is dropped
    #[arg(global = true, long, env = "BREWCACHE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Make every remote call fail, as if the network were down
    #[arg(global = true, long, env = "BREWCACHE_OFFLINE")]
    offline: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List recipes, newest first
    List {
        /// Show sync status columns
        #[arg(short, long)]
        all: bool,
    },

    /// Add a recipe
    Add {
        /// Recipe name
        name: String,

        /// Beer style
        #[arg(short, long)]
        style: Option<String>,

        /// Target ABV in percent
        #[arg(long)]
        abv: Option<f64>,

        /// Notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Edit a recipe with a JSON patch, e.g. '{"style":"IPA"}'
    Edit {
        /// Recipe id
        id: String,

        /// JSON object merged into the recipe
        patch: String,
    },

    /// Delete a recipe
    Rm {
        /// Recipe id
        id: String,
    },

    /// Replay queued operations against the remote
    Sync,

    /// Show queued operations
    Pending,

    /// Drop every queued operation
    ClearQueue {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Show recipes whose operations were dropped
    Failed,

    /// Requeue recipes whose operations were dropped
    RetryFailed,

    /// Show queue size and the last sync attempt
    Status,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("brewcache CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("brewcache core v{}", brewcache_core::VERSION);
        return Ok(());
    }

    let ctx = Context::open(
        &cli.store,
        &cli.remote,
        &cli.owner,
        cli.max_retries,
        cli.offline,
        cli.format,
    )?;

    match cli.command {
        Commands::List { all } => commands::recipes::list(&ctx, all).await?,
        Commands::Add {
            name,
            style,
            abv,
            notes,
        } => commands::recipes::add(&ctx, name, style, abv, notes).await?,
        Commands::Edit { id, patch } => commands::recipes::edit(&ctx, &id, &patch).await?,
        Commands::Rm { id } => commands::recipes::remove(&ctx, &id).await?,
        Commands::Sync => commands::sync::run(&ctx).await?,
        Commands::Pending => commands::queue::pending(&ctx).await?,
        Commands::ClearQueue { yes } => {
            if !yes {
                return Err("clear-queue drops unsynced work; pass --yes to confirm".into());
            }
            commands::queue::clear(&ctx).await?;
        }
        Commands::Failed => commands::queue::failed(&ctx).await?,
        Commands::RetryFailed => commands::queue::retry_failed(&ctx).await?,
        Commands::Status => commands::status::run(&ctx).await?,
        Commands::Version => {}
    }

    Ok(())
}
