//! Test fixtures and manager helpers.

use std::future::Future;
use std::sync::Arc;
use storekeep_codec::Value;
use storekeep_core::{CollectionConfig, Config, DbManager, SchemaQueue};
use storekeep_host::MemoryHost;

/// Default database name used by fixtures.
pub const TEST_DATABASE: &str = "test";

/// A manager over its own in-memory host.
///
/// Schema changes go through a private [`SchemaQueue`], so parallel tests
/// never wait on each other.
pub struct TestManager {
    /// The host, for inspecting versions and open connections.
    pub host: Arc<MemoryHost>,
    /// The manager under test.
    pub db: DbManager<MemoryHost>,
}

impl TestManager {
    /// Creates a manager for [`TEST_DATABASE`].
    pub fn new() -> Self {
        Self::with_config(Config::new(TEST_DATABASE))
    }

    /// Creates a manager from `config`.
    pub fn with_config(config: Config) -> Self {
        let host = Arc::new(MemoryHost::new());
        let queue = config
            .serialize_schema_changes
            .then(SchemaQueue::new);
        let db = DbManager::with_queue(Arc::clone(&host), config, queue)
            .expect("Failed to create test manager");
        Self { host, db }
    }

    /// Another manager over the same host, with its own schema queue.
    pub fn sibling(&self, config: Config) -> DbManager<MemoryHost> {
        DbManager::with_queue(Arc::clone(&self.host), config, Some(SchemaQueue::new()))
            .expect("Failed to create sibling manager")
    }

    /// Connections currently open to the managed database.
    pub fn open_connections(&self) -> usize {
        self.host.open_connections(self.db.name())
    }

    /// Stored version of the managed database, if it exists.
    pub fn stored_version(&self) -> Option<u64> {
        self.host.version(self.db.name())
    }
}

impl Default for TestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestManager {
    type Target = DbManager<MemoryHost>;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// `users`: auto-increment keys and a unique index on `email`.
pub fn users_collection() -> CollectionConfig {
    CollectionConfig::new().auto_increment().index("email", true)
}

/// A collection keyed by the record field at `key_path`.
pub fn keyed_collection(key_path: &str) -> CollectionConfig {
    CollectionConfig::new().key_path(key_path)
}

/// A collection that needs an explicit key on every write.
pub fn out_of_line_collection() -> CollectionConfig {
    CollectionConfig::new()
}

/// Converts a JSON literal to a record.
pub fn record(json: serde_json::Value) -> Value {
    serde_json::from_value(json).expect("JSON is not a valid record")
}

/// Builds a user record.
pub fn user(name: &str, email: &str) -> Value {
    record(serde_json::json!({ "name": name, "email": email }))
}

/// Runs a future to completion on a fresh single-threaded runtime.
///
/// For property tests, which cannot be `async`.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime")
        .block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storekeep_codec::Key;

    #[test]
    fn record_from_json() {
        let value = record(serde_json::json!({ "a": [1, "two", null], "b": { "c": true } }));
        assert_eq!(value.get("b").and_then(|b| b.get("c")), Some(&Value::Bool(true)));
        assert_eq!(
            value.get("a"),
            Some(&Value::Array(vec![
                Value::Integer(1),
                Value::from("two"),
                Value::Null
            ]))
        );
    }

    #[test]
    fn test_manager_round_trip() {
        let fixture = TestManager::new();
        block_on(async {
            fixture
                .create_collection("users", users_collection())
                .await
                .unwrap();
            let key = fixture.put("users", user("A", "a"), None).await.unwrap();
            assert_eq!(key, Key::Integer(1));
        });
        assert_eq!(fixture.open_connections(), 0);
        assert_eq!(fixture.stored_version(), Some(2));
    }
}
