//! Record-level operations.

use crate::connection::{close, ConnectionManager};
use crate::error::{DbError, DbResult, SchemaError, ValidationError};
use crate::query::{ReadQuery, ReadResult};
use storekeep_codec::{Key, Value};
use storekeep_host::{HostConnection, HostEngine, HostTransaction, TransactionMode};

type Transaction<H> = <<H as HostEngine>::Connection as HostConnection>::Transaction;

/// CRUD wrappers: each call opens the database, runs one transaction on one
/// collection, and closes the connection before returning.
#[derive(Debug)]
pub struct RecordOperations<H> {
    connections: ConnectionManager<H>,
}

impl<H: HostEngine> RecordOperations<H> {
    /// Creates the record operations.
    pub fn new(connections: ConnectionManager<H>) -> Self {
        Self { connections }
    }

    /// Inserts or replaces a record and returns its primary key.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NotFound`] if the collection is absent
    /// - [`ValidationError::KeyRequired`] if the collection has neither a key
    ///   path nor a generator and `key` is `None`
    /// - [`DbError::Storage`] for engine failures such as a unique index
    ///   violation
    pub async fn put(
        &self,
        database: &str,
        collection: &str,
        record: Value,
        key: Option<Key>,
    ) -> DbResult<Key> {
        let connection = self.connections.open(database).await?;
        let result: DbResult<Key> = async {
            let tx = begin::<H>(&connection, database, collection, TransactionMode::ReadWrite)?;
            let info = tx
                .store_info(collection)
                .map_err(|source| DbError::storage(collection, source))?;
            if key.is_none() && info.requires_explicit_key() {
                return Err(ValidationError::KeyRequired {
                    collection: collection.to_string(),
                }
                .into());
            }

            let key = tx
                .put(collection, record, key)
                .await
                .map_err(|source| DbError::storage(collection, source))?;
            commit::<H>(tx, collection).await?;
            tracing::debug!(database, collection, %key, "record stored");
            Ok(key)
        }
        .await;
        close(database, connection);
        result
    }

    /// Deletes the record under `key`. Missing records are ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NotFound`] if the collection is absent.
    pub async fn delete(&self, database: &str, collection: &str, key: &Key) -> DbResult<()> {
        let connection = self.connections.open(database).await?;
        let result: DbResult<()> = async {
            let tx = begin::<H>(&connection, database, collection, TransactionMode::ReadWrite)?;
            tx.delete(collection, key)
                .await
                .map_err(|source| DbError::storage(collection, source))?;
            commit::<H>(tx, collection).await
        }
        .await;
        close(database, connection);
        result
    }

    /// Deletes every record in the collection.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NotFound`] if the collection is absent.
    pub async fn delete_all(&self, database: &str, collection: &str) -> DbResult<()> {
        let connection = self.connections.open(database).await?;
        let result: DbResult<()> = async {
            let tx = begin::<H>(&connection, database, collection, TransactionMode::ReadWrite)?;
            tx.clear(collection)
                .await
                .map_err(|source| DbError::storage(collection, source))?;
            commit::<H>(tx, collection).await
        }
        .await;
        close(database, connection);
        result
    }

    /// Reads records matching `query`.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NotFound`] if the collection is absent
    /// - [`DbError::Storage`] if the query names a missing index
    pub async fn read(
        &self,
        database: &str,
        collection: &str,
        query: &ReadQuery,
    ) -> DbResult<ReadResult> {
        let connection = self.connections.open(database).await?;
        let result: DbResult<ReadResult> = async {
            let tx = begin::<H>(&connection, database, collection, TransactionMode::ReadOnly)?;
            let storage = |source| DbError::storage(collection, source);
            let result = match query {
                ReadQuery::All => ReadResult::Many(tx.get_all(collection).await.map_err(storage)?),
                ReadQuery::Key(key) => {
                    ReadResult::Single(tx.get(collection, key).await.map_err(storage)?)
                }
                ReadQuery::Index { name, key } => ReadResult::Single(
                    tx.get_by_index(collection, name, key)
                        .await
                        .map_err(storage)?,
                ),
            };
            commit::<H>(tx, collection).await?;
            Ok(result)
        }
        .await;
        close(database, connection);
        result
    }

    /// Number of records in the collection.
    ///
    /// # Errors
    ///
    /// Fails with [`SchemaError::NotFound`] if the collection is absent.
    pub async fn count(&self, database: &str, collection: &str) -> DbResult<u64> {
        let connection = self.connections.open(database).await?;
        let result: DbResult<u64> = async {
            let tx = begin::<H>(&connection, database, collection, TransactionMode::ReadOnly)?;
            let count = tx
                .count(collection)
                .await
                .map_err(|source| DbError::storage(collection, source))?;
            commit::<H>(tx, collection).await?;
            Ok(count)
        }
        .await;
        close(database, connection);
        result
    }
}

fn begin<H: HostEngine>(
    connection: &H::Connection,
    database: &str,
    collection: &str,
    mode: TransactionMode,
) -> DbResult<Transaction<H>> {
    if !connection.contains_store(collection) {
        return Err(SchemaError::NotFound {
            database: database.to_string(),
            collection: collection.to_string(),
        }
        .into());
    }
    connection
        .transaction(&[collection], mode)
        .map_err(|source| DbError::storage(collection, source))
}

async fn commit<H: HostEngine>(tx: Transaction<H>, collection: &str) -> DbResult<()> {
    tx.commit()
        .await
        .map_err(|source| DbError::storage(collection, source))
}
