//! Manager configuration.

/// Default prefix of index names.
pub const DEFAULT_INDEX_PREFIX: &str = "by_";

/// Configuration for a [`crate::DbManager`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the database the manager works on.
    pub database_name: String,

    /// Prefix prepended to an indexed field to name its index.
    pub index_prefix: String,

    /// Whether schema changes on one database wait for each other.
    pub serialize_schema_changes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_name: String::new(),
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            serialize_schema_changes: true,
        }
    }
}

impl Config {
    /// Creates a configuration for `database_name` with default values.
    #[must_use]
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Sets the index name prefix.
    #[must_use]
    pub fn index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    /// Sets whether schema changes are queued per database.
    #[must_use]
    pub const fn serialize_schema_changes(mut self, value: bool) -> Self {
        self.serialize_schema_changes = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.database_name.is_empty());
        assert_eq!(config.index_prefix, "by_");
        assert!(config.serialize_schema_changes);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new("app")
            .index_prefix("idx_")
            .serialize_schema_changes(false);

        assert_eq!(config.database_name, "app");
        assert!(!config.serialize_schema_changes);
        assert_eq!(config.index_prefix, "idx_");
    }
}
