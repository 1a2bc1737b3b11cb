//! The public façade.

use crate::collection::CollectionConfig;
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::{DbResult, NamedEntity, SchemaError};
use crate::migration::{MigrationReport, SchemaMigrator};
use crate::query::{ReadQuery, ReadResult};
use crate::queue::SchemaQueue;
use crate::records::RecordOperations;
use std::sync::Arc;
use storekeep_codec::{Key, Value};
use storekeep_host::{HostEngine, StoreInfo};

/// Manages one named database on a host engine.
///
/// `DbManager` drives the host's open / version-change / transaction
/// handshake: schema changes become version bumps with a migration callback,
/// record operations become one short transaction each. No connection is
/// kept between calls.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use storekeep_codec::Value;
/// use storekeep_core::{CollectionConfig, DbManager, ReadQuery};
/// use storekeep_host::MemoryHost;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let db = DbManager::new(Arc::new(MemoryHost::new()), "app").unwrap();
/// db.create_collection("users", CollectionConfig::new().auto_increment().index("email", true))
///     .await
///     .unwrap();
///
/// let user = Value::from_pairs([("name", "A"), ("email", "a@x.com")]);
/// db.put("users", user.clone(), None).await.unwrap();
///
/// let found = db
///     .read("users", ReadQuery::index("by_email", "a@x.com"))
///     .await
///     .unwrap();
/// assert_eq!(found.into_single(), Some(user));
/// # });
/// ```
#[derive(Debug)]
pub struct DbManager<H> {
    config: Config,
    queue: Option<SchemaQueue>,
    connections: ConnectionManager<H>,
    migrator: SchemaMigrator<H>,
    records: RecordOperations<H>,
}

impl<H: HostEngine> DbManager<H> {
    /// Creates a manager for `database_name` with default settings.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NameRequired`] for an empty name.
    pub fn new(host: Arc<H>, database_name: impl Into<String>) -> DbResult<Self> {
        Self::with_config(host, Config::new(database_name))
    }

    /// Creates a manager from a configuration.
    ///
    /// Schema changes use the process-wide [`SchemaQueue`] unless
    /// [`Config::serialize_schema_changes`] is off.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NameRequired`] for an empty database name.
    pub fn with_config(host: Arc<H>, config: Config) -> DbResult<Self> {
        let queue = config
            .serialize_schema_changes
            .then(|| SchemaQueue::global().clone());
        Self::with_queue(host, config, queue)
    }

    /// Creates a manager that queues schema changes on `queue`.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NameRequired`] for an empty database name.
    pub fn with_queue(host: Arc<H>, config: Config, queue: Option<SchemaQueue>) -> DbResult<Self> {
        if config.database_name.is_empty() {
            return Err(SchemaError::NameRequired {
                entity: NamedEntity::Database,
            }
            .into());
        }

        let connections = ConnectionManager::new(host);
        tracing::debug!(database = %config.database_name, "manager created");
        Ok(Self {
            migrator: SchemaMigrator::new(connections.clone(), queue.clone()),
            records: RecordOperations::new(connections.clone()),
            connections,
            queue,
            config,
        })
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.config.database_name
    }

    /// Configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Report of the most recent schema change, successful or not.
    pub fn last_migration(&self) -> Option<MigrationReport> {
        self.migrator.last_report()
    }

    /// Creates a collection by bumping the database version.
    ///
    /// Index names are the configured prefix followed by the field.
    ///
    /// # Errors
    ///
    /// See [`SchemaMigrator::create_collection`].
    pub async fn create_collection(
        &self,
        name: &str,
        collection: CollectionConfig,
    ) -> DbResult<MigrationReport> {
        self.migrator
            .create_collection(self.name(), name, collection, &self.config.index_prefix)
            .await
    }

    /// Deletes a collection by bumping the database version.
    ///
    /// # Errors
    ///
    /// See [`SchemaMigrator::delete_collection`].
    pub async fn delete_collection(&self, name: &str) -> DbResult<MigrationReport> {
        self.migrator.delete_collection(self.name(), name).await
    }

    /// Inserts or replaces a record, returning its primary key.
    ///
    /// # Errors
    ///
    /// See [`RecordOperations::put`].
    pub async fn put(&self, collection: &str, record: Value, key: Option<Key>) -> DbResult<Key> {
        self.records.put(self.name(), collection, record, key).await
    }

    /// Deletes the record under `key`.
    ///
    /// # Errors
    ///
    /// See [`RecordOperations::delete`].
    pub async fn delete(&self, collection: &str, key: impl Into<Key>) -> DbResult<()> {
        self.records
            .delete(self.name(), collection, &key.into())
            .await
    }

    /// Deletes every record of a collection.
    ///
    /// # Errors
    ///
    /// See [`RecordOperations::delete_all`].
    pub async fn delete_all(&self, collection: &str) -> DbResult<()> {
        self.records.delete_all(self.name(), collection).await
    }

    /// Reads records.
    ///
    /// # Errors
    ///
    /// See [`RecordOperations::read`].
    pub async fn read(&self, collection: &str, query: ReadQuery) -> DbResult<ReadResult> {
        self.records.read(self.name(), collection, &query).await
    }

    /// Reads with a loosely shaped query object, see [`ReadQuery::parse`].
    ///
    /// # Errors
    ///
    /// Fails with [`crate::ValidationError::BadQuery`] for a malformed query,
    /// otherwise as [`DbManager::read`].
    pub async fn read_value(&self, collection: &str, query: &Value) -> DbResult<ReadResult> {
        let query = ReadQuery::parse(query)?;
        self.read(collection, query).await
    }

    /// Number of records in a collection.
    ///
    /// # Errors
    ///
    /// See [`RecordOperations::count`].
    pub async fn count(&self, collection: &str) -> DbResult<u64> {
        self.records.count(self.name(), collection).await
    }

    /// Names of the collections, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened.
    pub async fn collection_names(&self) -> DbResult<Vec<String>> {
        self.migrator.collection_names(self.name()).await
    }

    /// Current database version.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened.
    pub async fn version(&self) -> DbResult<u64> {
        self.migrator.version(self.name()).await
    }

    /// Key policy and indexes of a collection.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NotFound`] if the collection is absent.
    pub async fn describe_collection(&self, name: &str) -> DbResult<StoreInfo> {
        self.migrator.describe_collection(self.name(), name).await
    }

    /// Deletes the whole database.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::DbError::Connection`] while other connections are
    /// open.
    pub async fn delete_database(&self) -> DbResult<()> {
        let _turn = match &self.queue {
            Some(queue) => Some(queue.acquire(self.name()).await),
            None => None,
        };
        self.connections.delete_database(self.name()).await
    }
}
