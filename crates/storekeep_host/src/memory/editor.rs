//! Schema editing during an in-memory version change.

use super::store::ObjectStore;
use crate::engine::{SchemaEditor, StoreParams};
use crate::error::{HostError, HostResult};
use std::collections::BTreeMap;
use storekeep_codec::KeyPath;

/// Works on a copy of the schema; the engine swaps the copy in only if the
/// migration callback succeeds, so an aborted upgrade leaves no trace.
pub(crate) struct MemorySchemaEditor {
    stores: BTreeMap<String, ObjectStore>,
}

impl MemorySchemaEditor {
    pub(crate) fn new(stores: &BTreeMap<String, ObjectStore>) -> Self {
        Self {
            stores: stores.clone(),
        }
    }

    pub(crate) fn into_stores(self) -> BTreeMap<String, ObjectStore> {
        self.stores
    }
}

impl SchemaEditor for MemorySchemaEditor {
    fn object_store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn create_object_store(&mut self, name: &str, params: &StoreParams) -> HostResult<()> {
        if self.stores.contains_key(name) {
            return Err(HostError::constraint(format!(
                "object store {name:?} already exists"
            )));
        }
        if params.auto_increment && params.key_path.as_ref().is_some_and(KeyPath::is_empty) {
            return Err(HostError::invalid_access(
                "auto-increment requires a non-empty key path",
            ));
        }

        self.stores.insert(name.to_string(), ObjectStore::new(params));
        Ok(())
    }

    fn create_index(
        &mut self,
        store: &str,
        name: &str,
        key_path: &KeyPath,
        unique: bool,
    ) -> HostResult<()> {
        self.stores
            .get_mut(store)
            .ok_or_else(|| HostError::not_found(format!("object store {store:?}")))?
            .add_index(name, key_path, unique)
    }

    fn delete_object_store(&mut self, name: &str) -> HostResult<()> {
        self.stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| HostError::not_found(format!("object store {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_delete_store() {
        let mut editor = MemorySchemaEditor::new(&BTreeMap::new());
        editor
            .create_object_store("users", &StoreParams::default())
            .unwrap();
        assert_eq!(editor.object_store_names(), vec!["users".to_string()]);

        editor.delete_object_store("users").unwrap();
        assert!(editor.object_store_names().is_empty());
    }

    #[test]
    fn duplicate_store_is_a_constraint_error() {
        let mut editor = MemorySchemaEditor::new(&BTreeMap::new());
        editor
            .create_object_store("users", &StoreParams::default())
            .unwrap();
        let result = editor.create_object_store("users", &StoreParams::default());
        assert!(matches!(result, Err(HostError::Constraint { .. })));
    }

    #[test]
    fn auto_increment_with_empty_path_is_rejected() {
        let mut editor = MemorySchemaEditor::new(&BTreeMap::new());
        let params = StoreParams {
            key_path: Some(KeyPath::parse("").unwrap()),
            auto_increment: true,
        };
        let result = editor.create_object_store("users", &params);
        assert!(matches!(result, Err(HostError::InvalidAccess { .. })));
    }

    #[test]
    fn index_on_missing_store_fails() {
        let mut editor = MemorySchemaEditor::new(&BTreeMap::new());
        let path = KeyPath::parse("email").unwrap();
        let result = editor.create_index("users", "by_email", &path, true);
        assert!(matches!(result, Err(HostError::NotFound { .. })));
    }

    #[test]
    fn deleting_missing_store_fails() {
        let mut editor = MemorySchemaEditor::new(&BTreeMap::new());
        assert!(matches!(
            editor.delete_object_store("ghost"),
            Err(HostError::NotFound { .. })
        ));
    }
}
