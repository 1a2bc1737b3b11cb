//! Per-database queue for schema changes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lets one schema change at a time run against each database.
///
/// Holding a [`SchemaTurn`] for a database makes every other
/// [`SchemaQueue::acquire`] on that name wait. Different databases never
/// wait for each other. A database's lock is dropped from the registry with
/// the last turn that nobody is waiting behind.
#[derive(Debug, Clone, Default)]
pub struct SchemaQueue {
    locks: Arc<Mutex<Registry>>,
}

type Registry = HashMap<String, Arc<AsyncMutex<()>>>;

/// Exclusive turn on one database; released on drop.
#[derive(Debug)]
pub struct SchemaTurn {
    database: String,
    locks: Arc<Mutex<Registry>>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for SchemaTurn {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // One reference is the registry's and one is our guard's; any other
        // belongs to a caller waiting in `acquire`.
        if locks
            .get(&self.database)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            locks.remove(&self.database);
        }
    }
}

impl SchemaQueue {
    /// Creates a queue shared only by its clones.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide queue.
    pub fn global() -> &'static SchemaQueue {
        static GLOBAL: OnceLock<SchemaQueue> = OnceLock::new();
        GLOBAL.get_or_init(SchemaQueue::new)
    }

    fn lock_for(&self, database: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(database.to_string()).or_default())
    }

    /// Waits for the turn on `database`.
    pub async fn acquire(&self, database: &str) -> SchemaTurn {
        let lock = self.lock_for(database);
        let guard = lock.lock_owned().await;
        tracing::trace!(database, "schema turn acquired");
        SchemaTurn {
            database: database.to_string(),
            locks: Arc::clone(&self.locks),
            _guard: guard,
        }
    }

    /// Whether some caller currently holds the turn on `database`.
    #[must_use]
    pub fn is_busy(&self, database: &str) -> bool {
        self.locks
            .lock()
            .get(database)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn turn_blocks_same_database_only() {
        let queue = SchemaQueue::new();
        let turn = queue.acquire("a").await;
        assert!(queue.is_busy("a"));
        assert!(!queue.is_busy("b"));

        let other = queue.acquire("b").await;
        assert!(queue.is_busy("b"));

        drop(turn);
        drop(other);
        assert!(!queue.is_busy("a"));
        assert!(!queue.is_busy("b"));
    }

    #[tokio::test]
    async fn released_turns_leave_no_locks_behind() {
        let queue = SchemaQueue::new();
        for name in ["a", "b", "c"] {
            let _turn = queue.acquire(name).await;
        }
        assert!(queue.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn waiting_caller_keeps_the_lock() {
        let queue = SchemaQueue::new();
        let turn = queue.acquire("a").await;

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let _turn = queue.acquire("a").await;
            })
        };
        while Arc::strong_count(&queue.locks.lock()["a"]) < 3 {
            tokio::task::yield_now().await;
        }

        drop(turn);
        assert_eq!(queue.locks.lock().len(), 1);
        waiter.await.unwrap();
        assert!(queue.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn clones_share_turns() {
        let queue = SchemaQueue::new();
        let clone = queue.clone();
        let _turn = queue.acquire("a").await;
        assert!(clone.is_busy("a"));
        assert!(!SchemaQueue::new().is_busy("a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn turns_do_not_overlap() {
        let queue = SchemaQueue::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let queue = queue.clone();
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                tokio::spawn(async move {
                    let _turn = queue.acquire("db").await;
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
