//! Transactions for the in-memory engine.

use super::store::ObjectStore;
use super::{DatabaseSlot, DatabaseState};
use crate::engine::{HostTransaction, StoreInfo, TransactionMode};
use crate::error::{HostError, HostResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use storekeep_codec::{Key, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxStatus {
    Active,
    Committed,
    Aborted,
}

/// Undo record for one applied write.
#[derive(Debug)]
enum Undo {
    Record {
        store: String,
        key: Key,
        previous: Option<Vec<u8>>,
    },
    Records {
        store: String,
        previous: BTreeMap<Key, Vec<u8>>,
    },
    Generator {
        store: String,
        next_key: i64,
    },
}

#[derive(Debug)]
struct TxInner {
    status: TxStatus,
    undo: Vec<Undo>,
}

/// A transaction against an in-memory database.
///
/// Requests apply immediately and log how to undo themselves. A failed write
/// aborts the transaction and replays the log; so does dropping the
/// transaction without committing it.
#[derive(Debug)]
pub struct MemoryTransaction {
    database: Arc<DatabaseSlot>,
    scope: Vec<String>,
    mode: TransactionMode,
    inner: Mutex<TxInner>,
}

impl MemoryTransaction {
    pub(crate) fn new(database: Arc<DatabaseSlot>, scope: Vec<String>, mode: TransactionMode) -> Self {
        Self {
            database,
            scope,
            mode,
            inner: Mutex::new(TxInner {
                status: TxStatus::Active,
                undo: Vec::new(),
            }),
        }
    }

    fn check_scope(&self, store: &str) -> HostResult<()> {
        if self.scope.iter().any(|s| s == store) {
            Ok(())
        } else {
            Err(HostError::not_found(format!(
                "object store {store:?} is not in the transaction scope"
            )))
        }
    }

    fn read<R>(&self, store: &str, f: impl FnOnce(&ObjectStore) -> HostResult<R>) -> HostResult<R> {
        self.check_scope(store)?;
        let inner = self.inner.lock();
        if inner.status != TxStatus::Active {
            return Err(HostError::TransactionInactive);
        }

        let state = self.database.state.read();
        let object_store = state
            .stores
            .get(store)
            .ok_or_else(|| HostError::not_found(format!("object store {store:?}")))?;
        f(object_store)
    }

    fn write<R>(
        &self,
        store: &str,
        f: impl FnOnce(&mut ObjectStore, &mut Vec<Undo>) -> HostResult<R>,
    ) -> HostResult<R> {
        self.check_scope(store)?;
        if self.mode == TransactionMode::ReadOnly {
            return Err(HostError::ReadOnly {
                store: store.to_string(),
            });
        }

        let mut inner = self.inner.lock();
        if inner.status != TxStatus::Active {
            return Err(HostError::TransactionInactive);
        }

        let mut state = self.database.state.write();
        let result = match state.stores.get_mut(store) {
            Some(object_store) => f(object_store, &mut inner.undo),
            None => Err(HostError::not_found(format!("object store {store:?}"))),
        };

        if let Err(error) = &result {
            tracing::debug!(
                database = %self.database.name,
                store,
                %error,
                "request failed, aborting transaction"
            );
            let undo = std::mem::take(&mut inner.undo);
            rollback(&mut state, undo);
            inner.status = TxStatus::Aborted;
        }
        result
    }
}

fn rollback(state: &mut DatabaseState, undo: Vec<Undo>) {
    for entry in undo.into_iter().rev() {
        let outcome = match entry {
            Undo::Record {
                store,
                key,
                previous,
            } => state
                .stores
                .get_mut(&store)
                .map(|s| s.restore(key, previous)),
            Undo::Records { store, previous } => state
                .stores
                .get_mut(&store)
                .map(|s| s.restore_all(previous)),
            Undo::Generator { store, next_key } => state.stores.get_mut(&store).map(|s| {
                s.next_key = next_key;
                Ok(())
            }),
        };
        if let Some(Err(error)) = outcome {
            tracing::warn!(%error, "failed to roll back write");
        }
    }
}

impl HostTransaction for MemoryTransaction {
    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn store_info(&self, store: &str) -> HostResult<StoreInfo> {
        self.check_scope(store)?;
        let state = self.database.state.read();
        state
            .stores
            .get(store)
            .map(|s| s.info(store))
            .ok_or_else(|| HostError::not_found(format!("object store {store:?}")))
    }

    async fn put(&self, store: &str, record: Value, key: Option<Key>) -> HostResult<Key> {
        self.write(store, |object_store, undo| {
            if object_store.auto_increment {
                undo.push(Undo::Generator {
                    store: store.to_string(),
                    next_key: object_store.next_key,
                });
            }
            let (key, record) = object_store.resolve_key(record, key)?;
            let previous = object_store.write(key.clone(), &record)?;
            undo.push(Undo::Record {
                store: store.to_string(),
                key: key.clone(),
                previous,
            });
            Ok(key)
        })
    }

    async fn get(&self, store: &str, key: &Key) -> HostResult<Option<Value>> {
        self.read(store, |object_store| object_store.get(key))
    }

    async fn get_all(&self, store: &str) -> HostResult<Vec<Value>> {
        self.read(store, ObjectStore::get_all)
    }

    async fn get_by_index(
        &self,
        store: &str,
        index: &str,
        key: &Key,
    ) -> HostResult<Option<Value>> {
        self.read(store, |object_store| object_store.get_by_index(index, key))
    }

    async fn delete(&self, store: &str, key: &Key) -> HostResult<()> {
        self.write(store, |object_store, undo| {
            if let Some(previous) = object_store.remove(key) {
                undo.push(Undo::Record {
                    store: store.to_string(),
                    key: key.clone(),
                    previous: Some(previous),
                });
            }
            Ok(())
        })
    }

    async fn clear(&self, store: &str) -> HostResult<()> {
        self.write(store, |object_store, undo| {
            undo.push(Undo::Records {
                store: store.to_string(),
                previous: object_store.take_all(),
            });
            Ok(())
        })
    }

    async fn count(&self, store: &str) -> HostResult<u64> {
        self.read(store, |object_store| Ok(object_store.len() as u64))
    }

    async fn commit(self) -> HostResult<()> {
        let mut inner = self.inner.lock();
        if inner.status != TxStatus::Active {
            return Err(HostError::TransactionInactive);
        }
        inner.status = TxStatus::Committed;
        inner.undo.clear();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.status == TxStatus::Active {
            let undo = std::mem::take(&mut inner.undo);
            if !undo.is_empty() {
                tracing::debug!(
                    database = %self.database.name,
                    writes = undo.len(),
                    "transaction dropped before commit, rolling back"
                );
                rollback(&mut self.database.state.write(), undo);
            }
            inner.status = TxStatus::Aborted;
        }
    }
}
