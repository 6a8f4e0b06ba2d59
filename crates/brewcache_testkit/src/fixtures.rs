//! Test fixtures and repository helpers.
//!
//! Provides a `Recipe` record and repositories wired to a
//! [`ScriptedRemote`] over an in-memory or file-backed store.

use crate::scripted::ScriptedRemote;
use brewcache_core::{CacheConfig, ManualClock, Record};
use brewcache_storage::{FileStore, InMemoryStore, KeyValueStore};
use brewcache_sync::OfflineRepository;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Owner used by fixtures.
pub const OWNER: &str = "user-1";

/// Start time of fixture clocks.
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// A beer recipe, the record type used throughout the tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Record id.
    #[serde(default)]
    pub id: String,
    /// Owning user.
    pub owner_id: String,
    /// Recipe name.
    pub name: String,
    /// Beer style.
    #[serde(default)]
    pub style: String,
    /// Creation time in milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Last local edit in milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl Recipe {
    /// Creates an unsaved recipe.
    pub fn named(owner_id: &str, name: &str) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            style: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Sets the style.
    #[must_use]
    pub fn with_style(mut self, style: &str) -> Self {
        self.style = style.to_string();
        self
    }
}

impl Record for Recipe {
    const ENTITY_TYPE: &'static str = "recipe";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn set_created_at(&mut self, at: i64) {
        self.created_at = at;
    }

    fn set_updated_at(&mut self, at: i64) {
        self.updated_at = at;
    }
}

/// Repository type used by fixtures.
pub type RecipeRepo = OfflineRepository<Recipe, Arc<ScriptedRemote<Recipe>>>;

/// A repository over an in-memory store with a scripted remote and a manual
/// clock.
pub struct TestRepo {
    /// The repository.
    pub repo: Arc<RecipeRepo>,
    /// The remote the repository talks to.
    pub remote: Arc<ScriptedRemote<Recipe>>,
    /// The backing store, for inspecting raw blobs.
    pub store: Arc<InMemoryStore>,
    /// The repository clock.
    pub clock: Arc<ManualClock>,
}

impl TestRepo {
    /// Creates a repository with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a repository with the given retry limit.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self::with_config(CacheConfig::default().with_max_retries(max_retries))
    }

    /// Creates a repository with the given configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::over_store(Arc::new(InMemoryStore::new()), config)
    }

    /// Creates a repository over an existing in-memory store.
    pub fn over_store(store: Arc<InMemoryStore>, config: CacheConfig) -> Self {
        let remote = Arc::new(ScriptedRemote::new());
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let repo = Arc::new(OfflineRepository::with_clock(
            store.clone(),
            Arc::clone(&remote),
            config,
            clock.clone(),
        ));
        Self {
            repo,
            remote,
            store,
            clock,
        }
    }

    /// Advances the clock by `millis`.
    pub fn tick(&self, millis: i64) {
        self.clock.advance(millis);
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestRepo {
    type Target = RecipeRepo;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

/// A temporary directory holding a file store path.
///
/// Repositories opened from it release the file lock when dropped, so a test
/// can drop one and open the next to simulate a restart.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of the state file.
    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    /// Opens the file store.
    pub fn open_store(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(FileStore::open(&self.store_path()).expect("Failed to open file store"))
    }

    /// Opens a repository over the file store.
    pub fn open_repo(&self, remote: Arc<ScriptedRemote<Recipe>>, clock: Arc<ManualClock>) -> RecipeRepo {
        OfflineRepository::with_clock(self.open_store(), remote, CacheConfig::default(), clock)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
