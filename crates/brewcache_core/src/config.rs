//! Cache configuration.

/// Default key of the pending operation journal.
pub const DEFAULT_OPERATIONS_KEY: &str = "pending_operations";

/// Default key of the sync metadata record.
pub const DEFAULT_METADATA_KEY: &str = "sync_metadata";

/// Default prefix of locally generated ids.
pub const DEFAULT_TEMP_ID_PREFIX: &str = "temp_";

/// Configuration shared by the cache, the journal and the reconciler.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Key of the entity collection. `None` derives `entities:<entity type>`.
    pub entities_key: Option<String>,

    /// Key of the pending operation journal.
    pub operations_key: String,

    /// Key of the sync metadata record.
    pub metadata_key: String,

    /// Attempts an operation gets before it is dropped.
    pub max_retries: u32,

    /// Prefix reserved for temporary ids. Server ids must never start with it.
    pub temp_id_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entities_key: None,
            operations_key: DEFAULT_OPERATIONS_KEY.to_string(),
            metadata_key: DEFAULT_METADATA_KEY.to_string(),
            max_retries: 3,
            temp_id_prefix: DEFAULT_TEMP_ID_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the entity collection key.
    #[must_use]
    pub fn with_entities_key(mut self, key: impl Into<String>) -> Self {
        self.entities_key = Some(key.into());
        self
    }

    /// Sets the journal key.
    #[must_use]
    pub fn with_operations_key(mut self, key: impl Into<String>) -> Self {
        self.operations_key = key.into();
        self
    }

    /// Sets the sync metadata key.
    #[must_use]
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }

    /// Sets the retry limit. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Sets the temporary id prefix.
    #[must_use]
    pub fn with_temp_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_id_prefix = prefix.into();
        self
    }

    /// Resolves the entity collection key for `entity_type`.
    pub fn entities_key_for(&self, entity_type: &str) -> String {
        self.entities_key
            .clone()
            .unwrap_or_else(|| format!("entities:{entity_type}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.operations_key, "pending_operations");
        assert_eq!(config.metadata_key, "sync_metadata");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.temp_id_prefix, "temp_");
        assert_eq!(config.entities_key_for("recipe"), "entities:recipe");
    }

    #[test]
    fn builder_pattern() {
        let config = CacheConfig::new()
            .with_entities_key("recipes")
            .with_operations_key("ops")
            .with_max_retries(5)
            .with_temp_id_prefix("local-");

        assert_eq!(config.entities_key_for("recipe"), "recipes");
        assert_eq!(config.operations_key, "ops");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.temp_id_prefix, "local-");
    }

    #[test]
    fn max_retries_floor() {
        assert_eq!(CacheConfig::new().with_max_retries(0).max_retries, 1);
    }
}
