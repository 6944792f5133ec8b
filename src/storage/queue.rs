//! Ordered fire-and-forget persistence.
//!
//! State transitions never wait on storage. Writes are enqueued and a
//! single worker task applies them in order, one at a time. Failures are
//! logged and dropped.
//!
//! # Operations
//!
//! | Operation | Caller waits for |
//! |-----------|------------------|
//! | [`PersistenceQueue::set`] | Nothing |
//! | [`PersistenceQueue::remove`] | Returned future, resolves after the removal ran |
//! | [`PersistenceQueue::flush`] | Every operation enqueued before it |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use super::DataStore;

// ============================================================================
// PersistOp
// ============================================================================

/// Internal operations for the worker.
enum PersistOp {
    /// Write a value.
    Set { key: String, value: Value },
    /// Delete a value and signal completion.
    Remove {
        key: String,
        done: oneshot::Sender<()>,
    },
    /// Signal once everything before it is applied.
    Flush { done: oneshot::Sender<()> },
}

// ============================================================================
// PersistenceQueue
// ============================================================================

/// Handle to the persistence worker.
///
/// Cloning shares the same worker. A disabled queue drops every write.
#[derive(Clone, Debug)]
pub struct PersistenceQueue {
    tx: Option<mpsc::UnboundedSender<PersistOp>>,
}

impl PersistenceQueue {
    /// Spawns the worker task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn DataStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_worker(store, rx));
        Self { tx: Some(tx) }
    }

    /// Creates a queue that persists nothing.
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Returns `true` if writes reach a store.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Enqueues a write.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        if let Some(tx) = &self.tx {
            let key = key.into();
            if tx.send(PersistOp::Set { key, value }).is_err() {
                warn!("Persistence worker gone, write dropped");
            }
        }
    }

    /// Enqueues a removal.
    ///
    /// The removal is enqueued before this returns; the future only waits
    /// for the worker to apply it.
    pub fn remove(&self, key: impl Into<String>) -> BoxFuture<'static, ()> {
        let Some(tx) = &self.tx else {
            return future::ready(()).boxed();
        };

        let (done, rx) = oneshot::channel();
        let key = key.into();
        if tx.send(PersistOp::Remove { key, done }).is_err() {
            warn!("Persistence worker gone, removal dropped");
            return future::ready(()).boxed();
        }

        async move {
            let _ = rx.await;
        }
        .boxed()
    }

    /// Waits until every operation enqueued so far is applied.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };

        let (done, rx) = oneshot::channel();
        if tx.send(PersistOp::Flush { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Worker that applies operations in order.
    async fn run_worker(store: Arc<dyn DataStore>, mut rx: mpsc::UnboundedReceiver<PersistOp>) {
        debug!("Persistence worker started");

        while let Some(op) = rx.recv().await {
            match op {
                PersistOp::Set { key, value } => {
                    if let Err(e) = store.set_item(&key, value).await {
                        warn!(key = %key, error = %e, "Failed to persist item");
                    } else {
                        trace!(key = %key, "Item persisted");
                    }
                }

                PersistOp::Remove { key, done } => {
                    if let Err(e) = store.remove_item(&key).await {
                        warn!(key = %key, error = %e, "Failed to remove persisted item");
                    } else {
                        trace!(key = %key, "Persisted item removed");
                    }
                    let _ = done.send(());
                }

                PersistOp::Flush { done } => {
                    let _ = done.send(());
                }
            }
        }

        debug!("Persistence worker terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::storage::MemoryDataStore;

    #[tokio::test]
    async fn test_writes_apply_in_order() {
        let store = Arc::new(MemoryDataStore::new());
        let queue = PersistenceQueue::spawn(store.clone());

        queue.set("k", json!(1));
        queue.set("k", json!(2));
        queue.set("k", json!(3));
        queue.flush().await;

        assert_eq!(store.peek("k"), Some(json!(3)));
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_remove_future_waits_for_worker() {
        let store = Arc::new(MemoryDataStore::with_items([("k", json!(1))]));
        let queue = PersistenceQueue::spawn(store.clone());

        let removal = queue.remove("k");
        removal.await;
        assert_eq!(store.peek("k"), None);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let store = Arc::new(MemoryDataStore::new());
        let queue = PersistenceQueue::spawn(store.clone());

        store.set_fail_writes(true);
        queue.set("a", json!(1));
        queue.flush().await;

        store.set_fail_writes(false);
        queue.set("b", json!(2));
        queue.flush().await;

        assert_eq!(store.peek("a"), None);
        assert_eq!(store.peek("b"), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_disabled_queue_is_noop() {
        let queue = PersistenceQueue::disabled();
        assert!(!queue.is_enabled());
        queue.set("k", json!(1));
        queue.remove("k").await;
        queue.flush().await;
    }
}
