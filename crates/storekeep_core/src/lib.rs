//! # Storekeep Core
//!
//! Async façade over a versioned, schema-evolving object store.
//!
//! A host engine (browser IndexedDB, or [`storekeep_host::MemoryHost`])
//! keeps named databases of collections. Changing the set of collections
//! requires reopening the database at a higher version and mutating the
//! schema from inside the engine's migration callback; reading and writing
//! records requires opening the database and running a transaction. This
//! crate hides that handshake behind [`DbManager`].
//!
//! This crate provides:
//! - [`DbManager`], the public surface
//! - [`ConnectionManager`], short-lived connections
//! - [`SchemaMigrator`], version-bump migrations with an explicit
//!   [`MigrationPhase`] state machine
//! - [`MigrationStaging`], the single-slot carrier of a pending instruction
//! - [`RecordOperations`], CRUD over one collection per transaction
//! - [`SchemaQueue`], one schema change at a time per database
//!
//! ## Errors
//!
//! Every operation returns [`DbResult`]. Failures fall into four families:
//! connection, schema, validation and storage; [`DbError::kind`] names the
//! specific case.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod connection;
mod error;
mod manager;
mod migration;
mod query;
mod queue;
mod records;
mod staging;

pub use collection::{CollectionConfig, IndexDefinition, IndexSpec, PrimaryKeySpec};
pub use config::{Config, DEFAULT_INDEX_PREFIX};
pub use connection::ConnectionManager;
pub use error::{
    DbError, DbResult, ErrorKind, NamedEntity, SchemaError, ValidationError,
};
pub use manager::DbManager;
pub use migration::{MigrationPhase, MigrationReport, SchemaMigrator};
pub use query::{ReadQuery, ReadResult};
pub use queue::{SchemaQueue, SchemaTurn};
pub use records::RecordOperations;
pub use staging::{MigrationInstruction, MigrationStaging};

pub use storekeep_codec::{Key, KeyPath, Value};
pub use storekeep_host::{IndexInfo, StoreInfo};
