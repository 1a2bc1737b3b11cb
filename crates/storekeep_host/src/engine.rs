//! Host storage engine contract.

use crate::error::HostResult;
use std::fmt;
use storekeep_codec::{Key, KeyPath, Value};

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only; writes fail with a read-only error.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

impl TransactionMode {
    /// Returns the mode name used by browser engines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionMode::ReadOnly => "readonly",
            TransactionMode::ReadWrite => "readwrite",
        }
    }
}

/// Versions involved in a version change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChange {
    /// Stored version before the change (0 for a new database).
    pub old_version: u64,
    /// Version being opened.
    pub new_version: u64,
}

/// Migration callback run by the engine during a version change.
///
/// The engine invokes it synchronously inside the open, with no argument
/// from the opener other than what the closure captured. Returning an error
/// aborts the version change.
pub type UpgradeCallback =
    Box<dyn FnOnce(&mut dyn SchemaEditor, VersionChange) -> HostResult<()> + Send>;

/// Parameters of a [`HostEngine::open`] call.
#[derive(Default)]
pub struct OpenRequest {
    /// Version to open at; `None` opens the current version.
    pub version: Option<u64>,
    /// Callback fired when `version` is higher than the stored version.
    pub on_upgrade: Option<UpgradeCallback>,
}

impl OpenRequest {
    /// Opens at whatever version is currently stored.
    #[must_use]
    pub fn current() -> Self {
        Self::default()
    }

    /// Opens at `version`, running `callback` if that bumps the version.
    pub fn upgrade<F>(version: u64, callback: F) -> Self
    where
        F: FnOnce(&mut dyn SchemaEditor, VersionChange) -> HostResult<()> + Send + 'static,
    {
        Self {
            version: Some(version),
            on_upgrade: Some(Box::new(callback)),
        }
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("version", &self.version)
            .field("on_upgrade", &self.on_upgrade.is_some())
            .finish()
    }
}

/// Primary key policy of a new object store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreParams {
    /// Path used to derive keys from records (in-line keys).
    pub key_path: Option<KeyPath>,
    /// Whether the store generates integer keys.
    pub auto_increment: bool,
}

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Indexed field.
    pub key_path: KeyPath,
    /// Whether duplicate index keys are rejected.
    pub unique: bool,
}

/// Definition of an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    /// Store name.
    pub name: String,
    /// Key path, if keys are in-line.
    pub key_path: Option<KeyPath>,
    /// Whether the store generates keys.
    pub auto_increment: bool,
    /// Indexes, sorted by name.
    pub indexes: Vec<IndexInfo>,
}

impl StoreInfo {
    /// True when every write must carry an explicit key.
    #[must_use]
    pub fn requires_explicit_key(&self) -> bool {
        self.key_path.is_none() && !self.auto_increment
    }
}

/// A database known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Stored version.
    pub version: u64,
}

/// Schema operations available only inside a version change.
pub trait SchemaEditor {
    /// Names of the object stores, sorted.
    fn object_store_names(&self) -> Vec<String>;

    /// Creates an object store.
    ///
    /// # Errors
    ///
    /// Fails with a constraint error if the store exists and with an invalid
    /// access error for auto-increment combined with an empty key path.
    fn create_object_store(&mut self, name: &str, params: &StoreParams) -> HostResult<()>;

    /// Creates an index on an object store.
    ///
    /// # Errors
    ///
    /// Fails if the store is missing, the index exists, or a unique index
    /// cannot be built over the existing records.
    fn create_index(
        &mut self,
        store: &str,
        name: &str,
        key_path: &KeyPath,
        unique: bool,
    ) -> HostResult<()>;

    /// Deletes an object store and its records.
    ///
    /// # Errors
    ///
    /// Fails with a not found error if the store does not exist.
    fn delete_object_store(&mut self, name: &str) -> HostResult<()>;
}

/// A host storage engine: a registry of named, versioned databases.
///
/// Implementors:
/// - [`crate::MemoryHost`] - in-process engine
/// - `IdbHost` in `storekeep_wasm` - browser IndexedDB
#[allow(async_fn_in_trait)]
pub trait HostEngine {
    /// Connection handle type.
    type Connection: HostConnection;

    /// Opens a database, creating it if needed.
    ///
    /// # Errors
    ///
    /// Fails when the version is lower than the stored one, when a version
    /// change is blocked by open connections, or when the migration callback
    /// fails.
    async fn open(&self, name: &str, request: OpenRequest) -> HostResult<Self::Connection>;

    /// Deletes a database. Deleting a missing database succeeds.
    ///
    /// # Errors
    ///
    /// Fails when connections to the database are still open.
    async fn delete_database(&self, name: &str) -> HostResult<()>;

    /// Lists the databases the engine knows about.
    async fn databases(&self) -> HostResult<Vec<DatabaseInfo>>;
}

/// An open connection to one database at one version.
pub trait HostConnection {
    /// Transaction handle type.
    type Transaction: HostTransaction;

    /// Database name.
    fn name(&self) -> &str;

    /// Version the connection was opened at.
    fn version(&self) -> u64;

    /// Names of the object stores, sorted.
    fn object_store_names(&self) -> Vec<String>;

    /// Whether an object store exists.
    fn contains_store(&self, name: &str) -> bool {
        self.object_store_names().iter().any(|s| s == name)
    }

    /// Begins a transaction over the named stores.
    ///
    /// # Errors
    ///
    /// Fails if a store does not exist or the connection is closed.
    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> HostResult<Self::Transaction>;

    /// Closes the connection.
    fn close(self);
}

/// A transaction over a fixed set of object stores.
///
/// A failing request aborts the transaction and rolls back its earlier
/// writes. A transaction dropped before [`HostTransaction::commit`] aborts.
#[allow(async_fn_in_trait)]
pub trait HostTransaction {
    /// Access mode.
    fn mode(&self) -> TransactionMode;

    /// Key policy and indexes of a store in scope.
    ///
    /// # Errors
    ///
    /// Fails if the store is not in the transaction's scope.
    fn store_info(&self, store: &str) -> HostResult<StoreInfo>;

    /// Inserts or replaces a record, returning its primary key.
    async fn put(&self, store: &str, record: Value, key: Option<Key>) -> HostResult<Key>;

    /// Reads the record stored under `key`.
    async fn get(&self, store: &str, key: &Key) -> HostResult<Option<Value>>;

    /// Reads every record, in key order.
    async fn get_all(&self, store: &str) -> HostResult<Vec<Value>>;

    /// Reads the first record whose index key equals `key`.
    async fn get_by_index(&self, store: &str, index: &str, key: &Key)
        -> HostResult<Option<Value>>;

    /// Deletes the record under `key`; deleting a missing record succeeds.
    async fn delete(&self, store: &str, key: &Key) -> HostResult<()>;

    /// Deletes every record in the store.
    async fn clear(&self, store: &str) -> HostResult<()>;

    /// Counts the records in the store.
    async fn count(&self, store: &str) -> HostResult<u64>;

    /// Waits for the transaction to commit.
    async fn commit(self) -> HostResult<()>;
}
