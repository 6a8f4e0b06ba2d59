//! The recipe record managed by the CLI.

use brewcache_core::Record;
use serde::{Deserialize, Serialize};

/// A homebrew recipe.
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Target alcohol by volume, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abv: Option<f64>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time in milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Last edit in milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl Recipe {
    /// Creates an unsaved recipe.
    pub fn new(owner_id: &str, name: &str) -> Self {
        Self {
            id: String::new(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            style: None,
            abv: None,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
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
