//! # Storekeep Host
//!
//! The contract Storekeep expects from a host storage engine, and an
//! in-memory engine that fulfils it.
//!
//! A host engine is a registry of named, versioned databases. Each
//! database holds object stores (collections) with an optional key path,
//! an optional key generator and any number of indexes. Schema changes
//! happen only inside a version change: the engine runs a migration
//! callback when a database is opened at a higher version than the one
//! stored, and rolls everything back if the callback fails.
//!
//! This crate provides:
//! - [`HostEngine`], [`HostConnection`], [`HostTransaction`] and
//!   [`SchemaEditor`], the engine contract
//! - [`MemoryHost`], an in-process engine with the same semantics as a
//!   browser's IndexedDB
//! - [`HostError`], the engine failure classes

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;

pub use engine::{
    DatabaseInfo, HostConnection, HostEngine, HostTransaction, IndexInfo, OpenRequest,
    SchemaEditor, StoreInfo, StoreParams, TransactionMode, UpgradeCallback, VersionChange,
};
pub use error::{HostError, HostResult};
pub use memory::{MemoryConnection, MemoryHost, MemoryTransaction};
