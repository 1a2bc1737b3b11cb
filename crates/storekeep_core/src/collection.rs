//! Collection definitions.

use serde::{Deserialize, Serialize};
use storekeep_codec::{CodecResult, KeyPath};
use storekeep_host::StoreParams;

/// How a collection derives primary keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrimaryKeySpec {
    /// Field holding the key inside each record.
    pub key_path: Option<String>,
    /// Whether the engine generates integer keys starting at 1.
    pub auto_increment: bool,
}

/// A requested secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed record field.
    #[serde(alias = "name")]
    pub field: String,
    /// Whether duplicate field values are rejected.
    #[serde(default)]
    pub unique: bool,
}

/// Parameters of [`crate::DbManager::create_collection`].
///
/// Deserializes from the shape JavaScript callers pass:
/// `{ primaryKey: { keyPath, autoIncrement }, indexes: [{ name, unique }] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionConfig {
    /// Primary key policy; `None` means every write needs an explicit key.
    pub primary_key: Option<PrimaryKeySpec>,
    /// Indexes to create.
    pub indexes: Vec<IndexSpec>,
}

impl CollectionConfig {
    /// A collection with out-of-line keys and no indexes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives keys from `path` inside each record.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<String>) -> Self {
        self.primary_key.get_or_insert_with(PrimaryKeySpec::default).key_path = Some(path.into());
        self
    }

    /// Lets the engine generate keys.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.primary_key.get_or_insert_with(PrimaryKeySpec::default).auto_increment = true;
        self
    }

    /// Adds an index over `field`.
    #[must_use]
    pub fn index(mut self, field: impl Into<String>, unique: bool) -> Self {
        self.indexes.push(IndexSpec {
            field: field.into(),
            unique,
        });
        self
    }

    /// Resolves the engine parameters and the indexes, each named
    /// `index_prefix` followed by its field.
    ///
    /// Runs inside the migration callback, so a failure aborts the version
    /// change.
    ///
    /// # Errors
    ///
    /// Fails with [`storekeep_codec::CodecError::InvalidKeyPath`] for a
    /// malformed key path or indexed field.
    pub fn resolve(
        &self,
        index_prefix: &str,
    ) -> CodecResult<(StoreParams, Vec<IndexDefinition>)> {
        let params = match &self.primary_key {
            Some(spec) => StoreParams {
                key_path: spec.key_path.clone().map(KeyPath::parse).transpose()?,
                auto_increment: spec.auto_increment,
            },
            None => StoreParams::default(),
        };

        let indexes = self
            .indexes
            .iter()
            .map(|index| {
                Ok(IndexDefinition {
                    name: format!("{index_prefix}{}", index.field),
                    key_path: KeyPath::parse(index.field.as_str())?,
                    unique: index.unique,
                })
            })
            .collect::<CodecResult<Vec<_>>>()?;

        Ok((params, indexes))
    }
}

/// An index as created by a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Indexed field.
    pub key_path: KeyPath,
    /// Whether duplicate field values are rejected.
    pub unique: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use storekeep_codec::CodecError;

    #[test]
    fn builder_sets_primary_key() {
        let config = CollectionConfig::new()
            .key_path("id")
            .auto_increment()
            .index("email", true);

        let spec = config.primary_key.clone().unwrap();
        assert_eq!(spec.key_path.as_deref(), Some("id"));
        assert!(spec.auto_increment);
        assert_eq!(config.indexes.len(), 1);
    }

    #[test]
    fn resolve_names_indexes() {
        let (params, indexes) = CollectionConfig::new()
            .auto_increment()
            .index("email", true)
            .resolve("by_")
            .unwrap();

        assert!(params.auto_increment);
        assert!(params.key_path.is_none());
        assert_eq!(indexes[0].name, "by_email");
        assert_eq!(indexes[0].key_path.as_str(), "email");
        assert!(indexes[0].unique);
    }

    #[test]
    fn resolve_rejects_bad_paths() {
        let err = CollectionConfig::new()
            .index("not a field", false)
            .resolve("by_")
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidKeyPath { .. }));
    }

    #[test]
    fn deserializes_javascript_shape() {
        let config: CollectionConfig = serde_json::from_value(serde_json::json!({
            "primaryKey": { "autoIncrement": true },
            "indexes": [{ "name": "email", "unique": true }, { "field": "age" }]
        }))
        .unwrap();

        assert_eq!(
            config,
            CollectionConfig::new()
                .auto_increment()
                .index("email", true)
                .index("age", false)
        );
    }

    #[test]
    fn empty_object_is_out_of_line_keys() {
        let config: CollectionConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config, CollectionConfig::new());
        let (params, indexes) = config.resolve("by_").unwrap();
        assert_eq!(params, StoreParams::default());
        assert!(indexes.is_empty());
    }
}
