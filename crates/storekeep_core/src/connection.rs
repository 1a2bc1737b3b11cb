//! Short-lived connections to host databases.

use crate::error::{DbError, DbResult, SchemaError};
use std::sync::Arc;
use storekeep_host::{HostConnection, HostEngine, HostError, OpenRequest, UpgradeCallback};

/// Opens and closes databases on a host engine.
///
/// Every façade operation takes a fresh connection through this type and
/// closes it before settling; connections are never kept between calls.
#[derive(Debug)]
pub struct ConnectionManager<H> {
    host: Arc<H>,
}

impl<H> Clone for ConnectionManager<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
        }
    }
}

impl<H: HostEngine> ConnectionManager<H> {
    /// Creates a manager over `host`.
    pub fn new(host: Arc<H>) -> Self {
        Self { host }
    }

    /// The host engine.
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Opens `database` at its current version.
    ///
    /// # Errors
    ///
    /// Fails with [`DbError::Connection`] if the host refuses the open.
    pub async fn open(&self, database: &str) -> DbResult<H::Connection> {
        let connection = self
            .host
            .open(database, OpenRequest::current())
            .await
            .map_err(|source| DbError::connection(database, source))?;
        tracing::debug!(database, version = connection.version(), "connection opened");
        Ok(connection)
    }

    /// Opens `database` at `version`, running `callback` for the version change.
    ///
    /// # Errors
    ///
    /// A failing callback surfaces as [`SchemaError::MigrationCallback`];
    /// any other refusal as [`DbError::Connection`].
    pub async fn open_for_upgrade(
        &self,
        database: &str,
        version: u64,
        callback: UpgradeCallback,
    ) -> DbResult<H::Connection> {
        let request = OpenRequest {
            version: Some(version),
            on_upgrade: Some(callback),
        };
        match self.host.open(database, request).await {
            Ok(connection) => {
                tracing::debug!(database, version, "connection opened for upgrade");
                Ok(connection)
            }
            Err(HostError::UpgradeAborted { message }) => {
                Err(SchemaError::MigrationCallback { message }.into())
            }
            Err(source) => Err(DbError::connection(database, source)),
        }
    }

    /// Runs `f` on a fresh connection, closing it afterwards.
    ///
    /// # Errors
    ///
    /// Returns the open failure or whatever `f` returns.
    pub async fn with_connection<T>(
        &self,
        database: &str,
        f: impl FnOnce(&H::Connection) -> DbResult<T>,
    ) -> DbResult<T> {
        let connection = self.open(database).await?;
        let result = f(&connection);
        close(database, connection);
        result
    }

    /// Deletes `database`.
    ///
    /// # Errors
    ///
    /// Fails with [`DbError::Connection`] while connections are open.
    pub async fn delete_database(&self, database: &str) -> DbResult<()> {
        self.host
            .delete_database(database)
            .await
            .map_err(|source| DbError::connection(database, source))?;
        tracing::info!(database, "database deleted");
        Ok(())
    }
}

/// Closes a connection opened by [`ConnectionManager`].
pub(crate) fn close<C: HostConnection>(database: &str, connection: C) {
    connection.close();
    tracing::debug!(database, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use storekeep_host::{MemoryHost, SchemaEditor, StoreParams};

    fn manager() -> (MemoryHost, ConnectionManager<MemoryHost>) {
        let host = MemoryHost::new();
        (host.clone(), ConnectionManager::new(Arc::new(host)))
    }

    #[tokio::test]
    async fn open_creates_database() {
        let (host, connections) = manager();
        let connection = connections.open("app").await.unwrap();
        assert_eq!(connection.version(), 1);
        close("app", connection);
        assert_eq!(host.open_connections("app"), 0);
    }

    #[tokio::test]
    async fn with_connection_closes_on_error() {
        let (host, connections) = manager();
        let result: DbResult<()> = connections
            .with_connection("app", |_| {
                Err(SchemaError::MigrationCallback {
                    message: "boom".into(),
                }
                .into())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(host.open_connections("app"), 0);
    }

    #[tokio::test]
    async fn failed_callback_is_a_schema_error() {
        let (host, connections) = manager();
        let err = connections
            .open_for_upgrade(
                "app",
                1,
                Box::new(|editor: &mut dyn SchemaEditor, _| editor.delete_object_store("ghost")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MigrationCallback);
        assert_eq!(host.version("app"), None);
    }

    #[tokio::test]
    async fn blocked_upgrade_is_a_connection_error() {
        let (_host, connections) = manager();
        let holder = connections.open("app").await.unwrap();
        let err = connections
            .open_for_upgrade(
                "app",
                2,
                Box::new(|editor: &mut dyn SchemaEditor, _| {
                    editor.create_object_store("a", &StoreParams::default())
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.is_retryable());
        close("app", holder);
    }

    #[tokio::test]
    async fn delete_database_blocked_by_connection() {
        let (host, connections) = manager();
        let holder = connections.open("app").await.unwrap();
        let err = connections.delete_database("app").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);

        close("app", holder);
        connections.delete_database("app").await.unwrap();
        assert_eq!(host.version("app"), None);
    }
}
