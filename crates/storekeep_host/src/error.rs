//! Error types for host engine operations.

use storekeep_codec::CodecError;
use thiserror::Error;

/// Result type for host engine operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors reported by a host storage engine.
///
/// The variants follow the failure classes a browser engine reports as
/// `DOMException` names, so both the in-memory engine and the IndexedDB
/// binding map onto the same set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A version change was requested while other connections are open.
    #[error("open of {database:?} blocked by {open_connections} open connection(s)")]
    Blocked {
        /// Database name.
        database: String,
        /// Number of connections still open.
        open_connections: usize,
    },

    /// Requested version is lower than the stored version.
    #[error("requested version {requested} is less than the existing version {current}")]
    VersionError {
        /// The requested version.
        requested: u64,
        /// The stored version.
        current: u64,
    },

    /// Version zero or a version the engine cannot represent.
    #[error("invalid database version {version}")]
    InvalidVersion {
        /// The rejected version.
        version: u64,
    },

    /// The migration callback failed and the version change was rolled back.
    #[error("version change aborted: {message}")]
    UpgradeAborted {
        /// Message of the failure that aborted the upgrade.
        message: String,
    },

    /// An object store or index does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was looked up.
        message: String,
    },

    /// A uniqueness or existence constraint was violated.
    #[error("constraint violated: {message}")]
    Constraint {
        /// Description of the violation.
        message: String,
    },

    /// The record or key is not acceptable for the store.
    #[error("data error: {message}")]
    Data {
        /// Description of the problem.
        message: String,
    },

    /// A write was attempted in a read-only transaction.
    #[error("transaction on {store:?} is read-only")]
    ReadOnly {
        /// Store the write targeted.
        store: String,
    },

    /// The transaction already committed or aborted.
    #[error("transaction is no longer active")]
    TransactionInactive,

    /// Invalid combination of parameters.
    #[error("invalid access: {message}")]
    InvalidAccess {
        /// Description of the problem.
        message: String,
    },

    /// The connection was closed.
    #[error("connection is closed")]
    Closed,

    /// Record encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Any other failure reported by the engine.
    #[error("{name}: {message}")]
    Engine {
        /// Engine-specific error name.
        name: String,
        /// Engine message.
        message: String,
    },
}

impl HostError {
    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    /// Creates an invalid access error.
    pub fn invalid_access(message: impl Into<String>) -> Self {
        Self::InvalidAccess {
            message: message.into(),
        }
    }

    /// Returns the `DOMException`-style name of this error.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            HostError::Blocked { .. } => "BlockedError",
            HostError::VersionError { .. } => "VersionError",
            HostError::InvalidVersion { .. } => "TypeError",
            HostError::UpgradeAborted { .. } => "AbortError",
            HostError::NotFound { .. } => "NotFoundError",
            HostError::Constraint { .. } => "ConstraintError",
            HostError::Data { .. } | HostError::Codec(_) => "DataError",
            HostError::ReadOnly { .. } => "ReadOnlyError",
            HostError::TransactionInactive => "TransactionInactiveError",
            HostError::InvalidAccess { .. } => "InvalidAccessError",
            HostError::Closed => "InvalidStateError",
            HostError::Engine { name, .. } => name,
        }
    }
}
