//! Store building blocks.
//!
//! A store owns one state value, changes it only from action listeners and
//! tells listeners *that* it changed. Listeners read the new state through
//! [`StoreCore::get_state`], which hands out an owned snapshot.
//!
//! Concrete stores embed a [`StoreCore`] and implement [`StoreBacked`];
//! the blanket [`Store`] impl makes them usable behind `dyn Store`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::Result;
use crate::storage::PersistenceQueue;

// ============================================================================
// StoreName / StoreType
// ============================================================================

/// Store identity, used in state pushes and state request message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreName {
    /// Per-tab page state.
    TabStore,
    /// Per-tab details view state.
    DetailsViewStore,
    /// Global feature flags.
    FeatureFlagStore,
    /// Global user configuration.
    UserConfigurationStore,
}

impl StoreName {
    /// Returns the store name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TabStore => "TabStore",
            Self::DetailsViewStore => "DetailsViewStore",
            Self::FeatureFlagStore => "FeatureFlagStore",
            Self::UserConfigurationStore => "UserConfigurationStore",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreType {
    /// Lives in a tab context.
    TabContextStore,
    /// Lives in the global context.
    GlobalStore,
}

// ============================================================================
// StoreCore
// ============================================================================

/// Listener notified after a store changed.
pub type ChangedListener = Arc<dyn Fn() + Send + Sync>;

/// Where a store writes its state after each change.
#[derive(Debug, Clone)]
struct StorePersistence {
    key: String,
    queue: PersistenceQueue,
}

/// State cell with change listeners and optional persistence.
pub struct StoreCore<S> {
    name: StoreName,
    state: RwLock<S>,
    listeners: Mutex<Vec<ChangedListener>>,
    persistence: Option<StorePersistence>,
}

impl<S> StoreCore<S>
where
    S: Clone + Serialize + Send + Sync,
{
    /// Creates a store core with an initial state.
    #[must_use]
    pub fn new(name: StoreName, initial: S) -> Self {
        Self {
            name,
            state: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
            persistence: None,
        }
    }

    /// Persists state under `key` after every change.
    ///
    /// A disabled queue leaves the store non-persistent.
    #[must_use]
    pub fn with_persistence(mut self, key: impl Into<String>, queue: PersistenceQueue) -> Self {
        if queue.is_enabled() {
            self.persistence = Some(StorePersistence {
                key: key.into(),
                queue,
            });
        }
        self
    }

    /// Returns the store name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> StoreName {
        self.name
    }

    /// Returns a snapshot of the state.
    #[must_use]
    pub fn get_state(&self) -> S {
        self.state.read().clone()
    }

    /// Mutates the state.
    ///
    /// `mutate` returns whether anything changed; only then is the state
    /// persisted and listeners notified.
    pub fn update(&self, mutate: impl FnOnce(&mut S) -> bool) {
        let changed = {
            let mut state = self.state.write();
            mutate(&mut state)
        };

        if changed {
            self.persist();
            self.emit_changed();
        }
    }

    /// Adds a changed listener.
    pub fn add_changed_listener(&self, listener: ChangedListener) {
        self.listeners.lock().push(listener);
    }

    /// Notifies every changed listener.
    pub fn emit_changed(&self) {
        let snapshot: Vec<_> = self.listeners.lock().clone();
        trace!(store = %self.name, listeners = snapshot.len(), "Store changed");
        for listener in snapshot {
            listener();
        }
    }

    /// Serializes the state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn state_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.state.read())?)
    }

    /// Removes the persisted state.
    ///
    /// The removal is enqueued before this returns.
    pub fn teardown(&self) -> BoxFuture<'static, ()> {
        match &self.persistence {
            Some(p) => p.queue.remove(p.key.clone()),
            None => future::ready(()).boxed(),
        }
    }

    fn persist(&self) {
        let Some(p) = &self.persistence else {
            return;
        };

        match self.state_json() {
            Ok(value) => p.queue.set(p.key.clone(), value),
            Err(e) => warn!(store = %self.name, error = %e, "Failed to serialize store state"),
        }
    }
}

impl<S> fmt::Debug for StoreCore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCore")
            .field("name", &self.name)
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Object-safe view of a store.
pub trait Store: Send + Sync {
    /// Store identity.
    fn name(&self) -> StoreName;

    /// Current state as JSON.
    fn state_json(&self) -> Result<Value>;

    /// Adds a changed listener.
    fn add_changed_listener(&self, listener: ChangedListener);

    /// Releases persisted state. The returned future waits for completion.
    fn teardown(&self) -> BoxFuture<'static, ()>;
}

/// A store built on a [`StoreCore`].
pub trait StoreBacked: Send + Sync {
    /// State type.
    type State: Clone + Serialize + Send + Sync;

    /// Returns the embedded core.
    fn core(&self) -> &StoreCore<Self::State>;
}

impl<T: StoreBacked> Store for T {
    fn name(&self) -> StoreName {
        self.core().name()
    }

    fn state_json(&self) -> Result<Value> {
        self.core().state_json()
    }

    fn add_changed_listener(&self, listener: ChangedListener) {
        self.core().add_changed_listener(listener);
    }

    fn teardown(&self) -> BoxFuture<'static, ()> {
        self.core().teardown()
    }
}

// ============================================================================
// Tests
// ============================================================================
