//! In-memory host engine.

mod editor;
mod store;
mod transaction;

pub use transaction::MemoryTransaction;

use crate::engine::{
    DatabaseInfo, HostConnection, HostEngine, OpenRequest, TransactionMode, VersionChange,
};
use crate::error::{HostError, HostResult};
use editor::MemorySchemaEditor;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use store::ObjectStore;

/// Schema, records and connection count of one database.
#[derive(Debug, Default)]
pub(crate) struct DatabaseState {
    /// Stored version; 0 until the first version change commits.
    pub(crate) version: u64,
    pub(crate) stores: BTreeMap<String, ObjectStore>,
    /// Connections currently open.
    pub(crate) connections: usize,
}

#[derive(Debug)]
pub(crate) struct DatabaseSlot {
    pub(crate) name: String,
    pub(crate) state: RwLock<DatabaseState>,
}

#[derive(Debug, Default)]
struct Registry {
    databases: RwLock<HashMap<String, Arc<DatabaseSlot>>>,
    next_connection: AtomicU64,
}

impl Registry {
    fn slot(&self, name: &str) -> Arc<DatabaseSlot> {
        if let Some(slot) = self.databases.read().get(name) {
            return Arc::clone(slot);
        }
        let mut databases = self.databases.write();
        Arc::clone(databases.entry(name.to_string()).or_insert_with(|| {
            Arc::new(DatabaseSlot {
                name: name.to_string(),
                state: RwLock::new(DatabaseState::default()),
            })
        }))
    }

    /// Drops a slot that never committed a version.
    fn discard_if_uncreated(&self, slot: &Arc<DatabaseSlot>) {
        let mut databases = self.databases.write();
        let state = slot.state.read();
        if state.version == 0
            && state.connections == 0
            && databases
                .get(&slot.name)
                .is_some_and(|s| Arc::ptr_eq(s, slot))
        {
            databases.remove(&slot.name);
        }
    }
}

/// An in-process host engine with IndexedDB semantics.
///
/// This engine is suitable for:
/// - Unit and integration tests
/// - Native builds where no browser engine is available
///
/// Records are held as CBOR bytes, so every read returns a fresh copy.
/// Cloning a `MemoryHost` yields another handle to the same databases.
///
/// # Example
///
/// ```rust
/// use storekeep_host::{HostConnection, HostEngine, MemoryHost, OpenRequest};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let host = MemoryHost::new();
/// let connection = host.open("app", OpenRequest::current()).await.unwrap();
/// assert_eq!(connection.version(), 1);
/// connection.close();
/// assert_eq!(host.open_connections("app"), 0);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    registry: Arc<Registry>,
}

impl MemoryHost {
    /// Creates an engine with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections currently open to `name`.
    #[must_use]
    pub fn open_connections(&self, name: &str) -> usize {
        self.registry
            .databases
            .read()
            .get(name)
            .map_or(0, |slot| slot.state.read().connections)
    }

    /// Stored version of `name`, if the database exists.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.registry
            .databases
            .read()
            .get(name)
            .map(|slot| slot.state.read().version)
            .filter(|v| *v > 0)
    }
}

impl HostEngine for MemoryHost {
    type Connection = MemoryConnection;

    async fn open(&self, name: &str, request: OpenRequest) -> HostResult<MemoryConnection> {
        let OpenRequest {
            version,
            on_upgrade,
        } = request;
        if version == Some(0) {
            return Err(HostError::InvalidVersion { version: 0 });
        }

        let slot = self.registry.slot(name);
        let opened_version = {
            let mut state = slot.state.write();
            let current = state.version;
            let target = version.unwrap_or(current.max(1));

            if target < current {
                return Err(HostError::VersionError {
                    requested: target,
                    current,
                });
            }

            if target > current {
                if state.connections > 0 {
                    tracing::warn!(
                        database = name,
                        open_connections = state.connections,
                        "version change blocked"
                    );
                    return Err(HostError::Blocked {
                        database: name.to_string(),
                        open_connections: state.connections,
                    });
                }

                let change = VersionChange {
                    old_version: current,
                    new_version: target,
                };
                let mut editor = MemorySchemaEditor::new(&state.stores);
                if let Some(callback) = on_upgrade {
                    if let Err(error) = callback(&mut editor, change) {
                        drop(state);
                        self.registry.discard_if_uncreated(&slot);
                        tracing::warn!(database = name, %error, "version change aborted");
                        return Err(HostError::UpgradeAborted {
                            message: error.to_string(),
                        });
                    }
                }
                state.stores = editor.into_stores();
                state.version = target;
                tracing::debug!(
                    database = name,
                    old_version = current,
                    new_version = target,
                    "version change committed"
                );
            }

            state.connections += 1;
            target
        };

        let id = self.registry.next_connection.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(database = name, connection = id, version = opened_version, "opened");
        Ok(MemoryConnection {
            id,
            version: opened_version,
            slot,
            closed: false,
        })
    }

    async fn delete_database(&self, name: &str) -> HostResult<()> {
        let mut databases = self.registry.databases.write();
        if let Some(slot) = databases.get(name) {
            let connections = slot.state.read().connections;
            if connections > 0 {
                return Err(HostError::Blocked {
                    database: name.to_string(),
                    open_connections: connections,
                });
            }
            databases.remove(name);
            tracing::debug!(database = name, "deleted");
        }
        Ok(())
    }

    async fn databases(&self) -> HostResult<Vec<DatabaseInfo>> {
        let mut list: Vec<DatabaseInfo> = self
            .registry
            .databases
            .read()
            .values()
            .filter_map(|slot| {
                let version = slot.state.read().version;
                (version > 0).then(|| DatabaseInfo {
                    name: slot.name.clone(),
                    version,
                })
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }
}

/// A connection to an in-memory database.
///
/// Dropping the connection closes it.
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    version: u64,
    slot: Arc<DatabaseSlot>,
    closed: bool,
}

impl MemoryConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.slot.state.write();
            state.connections = state.connections.saturating_sub(1);
            tracing::debug!(database = %self.slot.name, connection = self.id, "closed");
        }
    }
}

impl HostConnection for MemoryConnection {
    type Transaction = MemoryTransaction;

    fn name(&self) -> &str {
        &self.slot.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn object_store_names(&self) -> Vec<String> {
        self.slot.state.read().stores.keys().cloned().collect()
    }

    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> HostResult<MemoryTransaction> {
        if self.closed {
            return Err(HostError::Closed);
        }
        if stores.is_empty() {
            return Err(HostError::invalid_access("transaction scope is empty"));
        }
        {
            let state = self.slot.state.read();
            if let Some(missing) = stores.iter().find(|s| !state.stores.contains_key(**s)) {
                return Err(HostError::not_found(format!("object store {missing:?}")));
            }
        }

        Ok(MemoryTransaction::new(
            Arc::clone(&self.slot),
            stores.iter().map(|s| (*s).to_string()).collect(),
            mode,
        ))
    }

    fn close(mut self) {
        self.release();
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{HostTransaction, SchemaEditor, StoreParams};
    use storekeep_codec::{Key, KeyPath, Value};

    async fn with_store(host: &MemoryHost, name: &str, store: &'static str) {
        let connection = host
            .open(
                name,
                OpenRequest::upgrade(1, move |editor, _| {
                    editor.create_object_store(store, &StoreParams::default())
                }),
            )
            .await
            .unwrap();
        connection.close();
    }

    #[tokio::test]
    async fn plain_open_creates_version_one() {
        let host = MemoryHost::new();
        let connection = host.open("db", OpenRequest::current()).await.unwrap();
        assert_eq!(connection.version(), 1);
        assert!(connection.object_store_names().is_empty());
        assert_eq!(host.open_connections("db"), 1);

        connection.close();
        assert_eq!(host.open_connections("db"), 0);
        assert_eq!(host.version("db"), Some(1));
    }

    #[tokio::test]
    async fn drop_closes_connection() {
        let host = MemoryHost::new();
        {
            let _connection = host.open("db", OpenRequest::current()).await.unwrap();
            assert_eq!(host.open_connections("db"), 1);
        }
        assert_eq!(host.open_connections("db"), 0);
    }

    #[tokio::test]
    async fn version_zero_is_invalid() {
        let host = MemoryHost::new();
        let request = OpenRequest {
            version: Some(0),
            on_upgrade: None,
        };
        assert!(matches!(
            host.open("db", request).await,
            Err(HostError::InvalidVersion { version: 0 })
        ));
    }

    #[tokio::test]
    async fn lower_version_is_rejected() {
        let host = MemoryHost::new();
        with_store(&host, "db", "a").await;
        host.open("db", OpenRequest::upgrade(3, |_, _| Ok(())))
            .await
            .unwrap()
            .close();

        let request = OpenRequest {
            version: Some(2),
            on_upgrade: None,
        };
        assert!(matches!(
            host.open("db", request).await,
            Err(HostError::VersionError {
                requested: 2,
                current: 3
            })
        ));
    }

    #[tokio::test]
    async fn upgrade_is_blocked_by_open_connection() {
        let host = MemoryHost::new();
        let holder = host.open("db", OpenRequest::current()).await.unwrap();

        let result = host.open("db", OpenRequest::upgrade(2, |_, _| Ok(()))).await;
        assert!(matches!(result, Err(HostError::Blocked { open_connections: 1, .. })));

        holder.close();
        let connection = host
            .open("db", OpenRequest::upgrade(2, |_, _| Ok(())))
            .await
            .unwrap();
        assert_eq!(connection.version(), 2);
    }

    #[tokio::test]
    async fn failed_upgrade_changes_nothing() {
        let host = MemoryHost::new();
        with_store(&host, "db", "keep").await;

        let result = host
            .open(
                "db",
                OpenRequest::upgrade(2, |editor, change| {
                    assert_eq!(change.old_version, 1);
                    editor.delete_object_store("keep")?;
                    editor.delete_object_store("missing")
                }),
            )
            .await;
        assert!(matches!(result, Err(HostError::UpgradeAborted { .. })));

        let connection = host.open("db", OpenRequest::current()).await.unwrap();
        assert_eq!(connection.version(), 1);
        assert_eq!(connection.object_store_names(), vec!["keep".to_string()]);
    }

    #[tokio::test]
    async fn failed_first_upgrade_leaves_no_database() {
        let host = MemoryHost::new();
        let result = host
            .open(
                "fresh",
                OpenRequest::upgrade(1, |editor, _| editor.delete_object_store("nope")),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(host.version("fresh"), None);
        assert!(host.databases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_database_requires_closed_connections() {
        let host = MemoryHost::new();
        let connection = host.open("db", OpenRequest::current()).await.unwrap();
        assert!(matches!(
            host.delete_database("db").await,
            Err(HostError::Blocked { .. })
        ));

        connection.close();
        host.delete_database("db").await.unwrap();
        assert_eq!(host.version("db"), None);

        // Deleting again is fine.
        host.delete_database("db").await.unwrap();
    }

    #[tokio::test]
    async fn databases_are_listed_by_name() {
        let host = MemoryHost::new();
        host.open("b", OpenRequest::current()).await.unwrap().close();
        host.open("a", OpenRequest::current()).await.unwrap().close();

        let names: Vec<_> = host
            .databases()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn transaction_on_missing_store_fails() {
        let host = MemoryHost::new();
        let connection = host.open("db", OpenRequest::current()).await.unwrap();
        assert!(matches!(
            connection.transaction(&["ghost"], TransactionMode::ReadOnly),
            Err(HostError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn readonly_transaction_rejects_writes() {
        let host = MemoryHost::new();
        with_store(&host, "db", "items").await;
        let connection = host.open("db", OpenRequest::current()).await.unwrap();
        let tx = connection
            .transaction(&["items"], TransactionMode::ReadOnly)
            .unwrap();

        let result = tx.put("items", Value::from("x"), Some(Key::Integer(1))).await;
        assert!(matches!(result, Err(HostError::ReadOnly { .. })));
    }

    #[tokio::test]
    async fn failed_write_rolls_back_transaction() {
        let host = MemoryHost::new();
        let connection = host
            .open(
                "db",
                OpenRequest::upgrade(1, |editor, _| {
                    editor.create_object_store("users", &StoreParams::default())?;
                    editor.create_index("users", "by_email", &KeyPath::parse("email")?, true)
                }),
            )
            .await
            .unwrap();

        let tx = connection
            .transaction(&["users"], TransactionMode::ReadWrite)
            .unwrap();
        let user = |email: &str| Value::from_pairs([("email", email)]);
        tx.put("users", user("a"), Some(Key::Integer(1))).await.unwrap();
        let result = tx.put("users", user("a"), Some(Key::Integer(2))).await;
        assert!(matches!(result, Err(HostError::Constraint { .. })));

        // The transaction is dead and its first write is gone.
        assert!(matches!(
            tx.get("users", &Key::Integer(1)).await,
            Err(HostError::TransactionInactive)
        ));
        assert!(matches!(tx.commit().await, Err(HostError::TransactionInactive)));

        let tx = connection
            .transaction(&["users"], TransactionMode::ReadOnly)
            .unwrap();
        assert_eq!(tx.count("users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn uncommitted_transaction_is_rolled_back_on_drop() {
        let host = MemoryHost::new();
        with_store(&host, "db", "items").await;
        let connection = host.open("db", OpenRequest::current()).await.unwrap();

        {
            let tx = connection
                .transaction(&["items"], TransactionMode::ReadWrite)
                .unwrap();
            tx.put("items", Value::from("x"), Some(Key::Integer(1))).await.unwrap();
        }

        let tx = connection
            .transaction(&["items"], TransactionMode::ReadWrite)
            .unwrap();
        assert_eq!(tx.get("items", &Key::Integer(1)).await.unwrap(), None);
        tx.put("items", Value::from("y"), Some(Key::Integer(1))).await.unwrap();
        tx.commit().await.unwrap();

        let tx = connection
            .transaction(&["items"], TransactionMode::ReadOnly)
            .unwrap();
        assert_eq!(
            tx.get("items", &Key::Integer(1)).await.unwrap(),
            Some(Value::from("y"))
        );
    }
}
