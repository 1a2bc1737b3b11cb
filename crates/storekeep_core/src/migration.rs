//! Schema changes through version-bump migrations.
//!
//! Collections can only be created or deleted while the host runs a version
//! change. A schema-changing call therefore:
//!
//! 1. stages its instruction in a [`MigrationStaging`] slot,
//! 2. opens the database at its current version to check preconditions,
//! 3. closes that connection,
//! 4. reopens at `version + 1`; the host runs the migration callback, which
//!    takes the staged instruction and applies it,
//! 5. closes the upgraded connection.
//!
//! Each call walks the [`MigrationPhase`] state machine and leaves a
//! [`MigrationReport`] describing what happened.

use crate::collection::CollectionConfig;
use crate::connection::{close, ConnectionManager};
use crate::error::{DbError, DbResult, ErrorKind, NamedEntity, SchemaError};
use crate::queue::SchemaQueue;
use crate::staging::{MigrationInstruction, MigrationStaging};
use parking_lot::Mutex;
use std::sync::Arc;
use storekeep_host::{
    HostConnection, HostEngine, HostError, HostTransaction, SchemaEditor, StoreInfo,
    TransactionMode, VersionChange,
};

/// Phase of one schema-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Nothing staged yet.
    Idle,
    /// Instruction staged; preconditions being checked.
    Staged,
    /// Precondition connection closed; version-bump open in flight.
    AwaitingReopen,
    /// The host is running the migration callback.
    InCallback,
    /// The upgraded connection has been closed.
    Closed,
    /// The call succeeded.
    Resolved,
    /// The call failed with the given kind.
    Rejected(ErrorKind),
}

impl MigrationPhase {
    /// Returns true for `Resolved` and `Rejected`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationPhase::Resolved | MigrationPhase::Rejected(_))
    }

    /// Whether the machine may move from `self` to `next`.
    #[must_use]
    pub fn can_advance_to(self, next: MigrationPhase) -> bool {
        use MigrationPhase::*;
        match (self, next) {
            (Idle, Staged)
            | (Staged, AwaitingReopen)
            | (AwaitingReopen, InCallback)
            | (InCallback, Closed)
            | (Closed, Resolved) => true,
            (from, Rejected(_)) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// What a schema-changing call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Database name.
    pub database: String,
    /// The applied (or attempted) instruction.
    pub instruction: MigrationInstruction,
    /// Version read before the bump, if the call got that far.
    pub old_version: Option<u64>,
    /// Version after the bump, if it committed.
    pub new_version: Option<u64>,
    /// Every phase the call went through, starting with `Idle`.
    pub phases: Vec<MigrationPhase>,
}

impl MigrationReport {
    /// Final phase of the call.
    #[must_use]
    pub fn outcome(&self) -> MigrationPhase {
        self.phases.last().copied().unwrap_or(MigrationPhase::Idle)
    }

    /// True if the call resolved.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome() == MigrationPhase::Resolved
    }
}

#[derive(Debug)]
struct PhaseTracker {
    database: String,
    phase: MigrationPhase,
    history: Vec<MigrationPhase>,
    old_version: Option<u64>,
    new_version: Option<u64>,
}

impl PhaseTracker {
    fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            phase: MigrationPhase::Idle,
            history: vec![MigrationPhase::Idle],
            old_version: None,
            new_version: None,
        }
    }

    fn advance(&mut self, next: MigrationPhase) -> Result<(), SchemaError> {
        if !self.phase.can_advance_to(next) {
            return Err(SchemaError::MigrationCallback {
                message: format!("invalid migration transition {:?} -> {next:?}", self.phase),
            });
        }
        tracing::debug!(
            database = %self.database,
            from = ?self.phase,
            to = ?next,
            "migration phase"
        );
        self.phase = next;
        self.history.push(next);
        Ok(())
    }
}

/// Applies schema changes by bumping the database version.
#[derive(Debug)]
pub struct SchemaMigrator<H> {
    connections: ConnectionManager<H>,
    queue: Option<SchemaQueue>,
    last_report: Mutex<Option<MigrationReport>>,
}

impl<H: HostEngine> SchemaMigrator<H> {
    /// Creates a migrator. With a queue, schema changes on one database run
    /// one at a time.
    pub fn new(connections: ConnectionManager<H>, queue: Option<SchemaQueue>) -> Self {
        Self {
            connections,
            queue,
            last_report: Mutex::new(None),
        }
    }

    /// Report of the most recent schema-changing call, successful or not.
    pub fn last_report(&self) -> Option<MigrationReport> {
        self.last_report.lock().clone()
    }

    /// Creates `collection` with the given key policy and indexes, naming
    /// each index `index_prefix` followed by its field.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NameRequired`] for an empty name
    /// - [`SchemaError::DuplicateCollection`] if it already exists
    /// - [`SchemaError::MigrationCallback`] for a malformed key path or if
    ///   the host rejects the store or an index; the version does not change
    /// - [`DbError::Connection`] if an open is refused
    pub async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        config: CollectionConfig,
        index_prefix: &str,
    ) -> DbResult<MigrationReport> {
        self.migrate(
            database,
            MigrationInstruction::CreateCollection {
                name: collection.to_string(),
                collection: config,
                index_prefix: index_prefix.to_string(),
            },
        )
        .await
    }

    /// Deletes `collection` and its records.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NameRequired`] for an empty name
    /// - [`SchemaError::NotFound`] if it does not exist
    /// - [`DbError::Connection`] if an open is refused
    pub async fn delete_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> DbResult<MigrationReport> {
        self.migrate(
            database,
            MigrationInstruction::DeleteCollection {
                name: collection.to_string(),
            },
        )
        .await
    }

    /// Key policy and indexes of `collection`.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NotFound`] if the collection is absent.
    pub async fn describe_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> DbResult<StoreInfo> {
        self.connections
            .with_connection(database, |connection| {
                if !connection.contains_store(collection) {
                    return Err(not_found(database, collection).into());
                }
                connection
                    .transaction(&[collection], TransactionMode::ReadOnly)
                    .and_then(|tx| tx.store_info(collection))
                    .map_err(|source| DbError::storage(collection, source))
            })
            .await
    }

    /// Names of the collections, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened.
    pub async fn collection_names(&self, database: &str) -> DbResult<Vec<String>> {
        self.connections
            .with_connection(database, |connection| Ok(connection.object_store_names()))
            .await
    }

    /// Current version of the database.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened.
    pub async fn version(&self, database: &str) -> DbResult<u64> {
        self.connections
            .with_connection(database, |connection| Ok(connection.version()))
            .await
    }

    async fn migrate(
        &self,
        database: &str,
        instruction: MigrationInstruction,
    ) -> DbResult<MigrationReport> {
        let _turn = match &self.queue {
            Some(queue) => Some(queue.acquire(database).await),
            None => None,
        };

        let tracker = Arc::new(Mutex::new(PhaseTracker::new(database)));
        let mut result = self.drive(database, instruction.clone(), &tracker).await;

        let report = {
            let mut tracker = tracker.lock();
            if result.is_ok() {
                if let Err(error) = tracker.advance(MigrationPhase::Resolved) {
                    result = Err(error.into());
                }
            }
            if let Err(error) = &result {
                let rejected = MigrationPhase::Rejected(error.kind());
                tracker.phase = rejected;
                tracker.history.push(rejected);
            }
            MigrationReport {
                database: database.to_string(),
                instruction,
                old_version: tracker.old_version,
                new_version: tracker.new_version,
                phases: tracker.history.clone(),
            }
        };
        *self.last_report.lock() = Some(report.clone());

        match result {
            Ok(()) => {
                tracing::info!(
                    database,
                    collection = report.instruction.collection(),
                    action = report.instruction.action(),
                    version = report.new_version,
                    "schema change committed"
                );
                Ok(report)
            }
            Err(error) => {
                tracing::warn!(
                    database,
                    collection = report.instruction.collection(),
                    action = report.instruction.action(),
                    %error,
                    "schema change rejected"
                );
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        database: &str,
        instruction: MigrationInstruction,
        tracker: &Arc<Mutex<PhaseTracker>>,
    ) -> DbResult<()> {
        let collection = instruction.collection().to_string();
        let creating = matches!(instruction, MigrationInstruction::CreateCollection { .. });

        let mut staging = MigrationStaging::new();
        staging.stage(instruction);
        tracker.lock().advance(MigrationPhase::Staged)?;

        if collection.is_empty() {
            return Err(SchemaError::NameRequired {
                entity: NamedEntity::Collection,
            }
            .into());
        }

        let connection = self.connections.open(database).await?;
        let exists = connection.contains_store(&collection);
        let version = connection.version();
        close(database, connection);
        tracker.lock().old_version = Some(version);

        match (creating, exists) {
            (true, true) => {
                return Err(SchemaError::DuplicateCollection {
                    database: database.to_string(),
                    collection,
                }
                .into());
            }
            (false, false) => return Err(not_found(database, &collection).into()),
            _ => {}
        }

        tracker.lock().advance(MigrationPhase::AwaitingReopen)?;

        let callback_tracker = Arc::clone(tracker);
        let callback = move |editor: &mut dyn SchemaEditor, change: VersionChange| {
            callback_tracker
                .lock()
                .advance(MigrationPhase::InCallback)
                .map_err(|e| HostError::invalid_access(e.to_string()))?;
            tracing::debug!(
                old_version = change.old_version,
                new_version = change.new_version,
                "running migration callback"
            );
            let instruction = staging
                .consume_for_migration()
                .ok_or_else(|| HostError::invalid_access("no schema instruction was staged"))?;
            instruction.apply(editor)
        };

        let upgraded = self
            .connections
            .open_for_upgrade(database, version + 1, Box::new(callback))
            .await?;
        let new_version = upgraded.version();
        close(database, upgraded);

        let mut tracker = tracker.lock();
        tracker.new_version = Some(new_version);
        tracker.advance(MigrationPhase::Closed)?;
        Ok(())
    }
}

fn not_found(database: &str, collection: &str) -> SchemaError {
    SchemaError::NotFound {
        database: database.to_string(),
        collection: collection.to_string(),
    }
}
