//! Error types for Storekeep.

use std::fmt;
use storekeep_host::HostError;
use thiserror::Error;

/// Result type for façade operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors returned by [`crate::DbManager`] and the components behind it.
#[derive(Debug, Error)]
pub enum DbError {
    /// The host refused to open or delete the database.
    #[error("connection to {database:?} failed: {source}")]
    Connection {
        /// Database name.
        database: String,
        /// Engine error.
        source: HostError,
    },

    /// Schema precondition or migration failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The call itself is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The engine failed a read or write.
    #[error("storage error in {collection:?}: {source}")]
    Storage {
        /// Collection the request targeted.
        collection: String,
        /// Engine error.
        source: HostError,
    },
}

/// Schema-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The collection does not exist.
    #[error("collection {collection:?} not found in database {database:?}")]
    NotFound {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
    },

    /// A collection with that name already exists.
    #[error("collection {collection:?} already exists in database {database:?}")]
    DuplicateCollection {
        /// Database name.
        database: String,
        /// Collection name.
        collection: String,
    },

    /// A required name was empty.
    #[error("{entity} name is required")]
    NameRequired {
        /// What was left unnamed.
        entity: NamedEntity,
    },

    /// The migration callback failed and the version change was rolled back.
    #[error("migration callback failed: {message}")]
    MigrationCallback {
        /// Failure reported from inside the callback.
        message: String,
    },
}

/// Things that must carry a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedEntity {
    /// A database.
    Database,
    /// A collection.
    Collection,
}

impl fmt::Display for NamedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NamedEntity::Database => "database",
            NamedEntity::Collection => "collection",
        })
    }
}

/// Malformed calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The collection has no key path or generator, and no key was given.
    #[error("collection {collection:?} requires an explicit key")]
    KeyRequired {
        /// Collection name.
        collection: String,
    },

    /// The read query matches none of the accepted shapes.
    #[error("bad query: {reason}")]
    BadQuery {
        /// What is wrong with the query.
        reason: String,
    },
}

impl ValidationError {
    /// Creates a bad query error.
    pub fn bad_query(reason: impl Into<String>) -> Self {
        Self::BadQuery {
            reason: reason.into(),
        }
    }
}

/// Fieldless error kind, for branching on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`DbError::Connection`].
    Connection,
    /// See [`SchemaError::NotFound`].
    NotFound,
    /// See [`SchemaError::DuplicateCollection`].
    DuplicateCollection,
    /// See [`SchemaError::NameRequired`].
    NameRequired,
    /// See [`SchemaError::MigrationCallback`].
    MigrationCallback,
    /// See [`ValidationError::KeyRequired`].
    KeyRequired,
    /// See [`ValidationError::BadQuery`].
    BadQuery,
    /// See [`DbError::Storage`].
    Storage,
}

impl ErrorKind {
    /// Name of the specific kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "Connection",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::DuplicateCollection => "DuplicateCollection",
            ErrorKind::NameRequired => "NameRequired",
            ErrorKind::MigrationCallback => "MigrationCallbackError",
            ErrorKind::KeyRequired => "KeyRequired",
            ErrorKind::BadQuery => "BadQuery",
            ErrorKind::Storage => "Storage",
        }
    }

    /// Name of the error family the kind belongs to.
    #[must_use]
    pub fn family(self) -> &'static str {
        match self {
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::NotFound
            | ErrorKind::DuplicateCollection
            | ErrorKind::NameRequired
            | ErrorKind::MigrationCallback => "SchemaError",
            ErrorKind::KeyRequired | ErrorKind::BadQuery => "ValidationError",
            ErrorKind::Storage => "StorageError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.family(), self.as_str())
    }
}

impl DbError {
    /// Creates a connection error.
    pub fn connection(database: impl Into<String>, source: HostError) -> Self {
        Self::Connection {
            database: database.into(),
            source,
        }
    }

    /// Creates a storage error.
    pub fn storage(collection: impl Into<String>, source: HostError) -> Self {
        Self::Storage {
            collection: collection.into(),
            source,
        }
    }

    /// Returns the specific kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Connection { .. } => ErrorKind::Connection,
            DbError::Schema(SchemaError::NotFound { .. }) => ErrorKind::NotFound,
            DbError::Schema(SchemaError::DuplicateCollection { .. }) => {
                ErrorKind::DuplicateCollection
            }
            DbError::Schema(SchemaError::NameRequired { .. }) => ErrorKind::NameRequired,
            DbError::Schema(SchemaError::MigrationCallback { .. }) => {
                ErrorKind::MigrationCallback
            }
            DbError::Validation(ValidationError::KeyRequired { .. }) => ErrorKind::KeyRequired,
            DbError::Validation(ValidationError::BadQuery { .. }) => ErrorKind::BadQuery,
            DbError::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Returns true if trying again later may succeed.
    ///
    /// Only connection failures qualify: a blocked open clears once the
    /// other connections close.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Connection { .. })
    }

    /// Engine error behind a connection or storage failure.
    #[must_use]
    pub fn host_error(&self) -> Option<&HostError> {
        match self {
            DbError::Connection { source, .. } | DbError::Storage { source, .. } => Some(source),
            _ => None,
        }
    }
}
