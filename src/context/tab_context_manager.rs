//! Owner of every tab context.
//!
//! The `tab id -> context` map is the single source of truth for whether a
//! tab has state. Contexts are created only by
//! [`add_tab_context_if_not_exists`](TabContextManager::add_tab_context_if_not_exists)
//! and removed only by
//! [`delete_tab_context`](TabContextManager::delete_tab_context).
//!
//! # Locking
//!
//! Creation runs entirely under the map lock, so concurrent callers for
//! the same tab see exactly one context. The lock is never held while a
//! handler runs or across an `.await`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use crate::error::Result;
use crate::identifiers::TabId;
use crate::interpreter::InterpreterResponse;
use crate::protocol::Message;
use crate::stores::TabContextStoreHub;

use super::{TabContext, TabContextCreator};

// ============================================================================
// TabContextManager
// ============================================================================

/// Map of tab contexts.
#[derive(Debug, Default)]
pub struct TabContextManager {
    contexts: Mutex<FxHashMap<TabId, Arc<TabContext>>>,
}

impl TabContextManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the tab's context unless it already has one.
    ///
    /// Returns `true` if a context was created.
    pub fn add_tab_context_if_not_exists(
        &self,
        tab_id: TabId,
        factory: &dyn TabContextCreator,
    ) -> bool {
        let mut contexts = self.contexts.lock();
        if contexts.contains_key(&tab_id) {
            trace!(tab_id = %tab_id, "Tab context already exists");
            return false;
        }

        contexts.insert(tab_id, Arc::new(factory.create_tab_context(tab_id)));
        info!(tab_id = %tab_id, contexts = contexts.len(), "Tab context added");
        true
    }

    /// Removes the tab's context and tears it down.
    ///
    /// The entry is removed and teardown is scheduled before this returns;
    /// the future waits for teardown to finish. Unknown tabs are a no-op.
    pub fn delete_tab_context(&self, tab_id: TabId) -> BoxFuture<'static, ()> {
        let removed = self.contexts.lock().remove(&tab_id);

        let Some(context) = removed else {
            debug!(tab_id = %tab_id, "No tab context to delete");
            return future::ready(()).boxed();
        };

        info!(tab_id = %tab_id, "Tab context deleted");
        context.teardown()
    }

    /// Routes a message to the tab's interpreter.
    ///
    /// Never creates a context; unknown tabs report not handled.
    ///
    /// # Errors
    ///
    /// Returns the handler's synchronous failure.
    pub fn interpret_message_for_tab(
        &self,
        tab_id: TabId,
        message: &Message,
    ) -> Result<InterpreterResponse> {
        let context = self.contexts.lock().get(&tab_id).cloned();

        match context {
            Some(context) => context.interpreter().interpret(message),
            None => {
                trace!(
                    tab_id = %tab_id,
                    message_type = %message.message_type,
                    "No tab context for message"
                );
                Ok(InterpreterResponse::NotHandled)
            }
        }
    }

    /// Returns the tab's stores, if it has a context.
    #[must_use]
    pub fn get_tab_context_stores(&self, tab_id: TabId) -> Option<TabContextStoreHub> {
        self.contexts
            .lock()
            .get(&tab_id)
            .map(|context| context.stores().clone())
    }

    /// Returns `true` if the tab has a context.
    #[inline]
    #[must_use]
    pub fn contains(&self, tab_id: TabId) -> bool {
        self.contexts.lock().contains_key(&tab_id)
    }

    /// Returns every tab with a context, sorted.
    #[must_use]
    pub fn tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<_> = self.contexts.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns the number of contexts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Returns `true` if no tab has a context.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::actions::TabActions;
    use crate::actions::DetailsViewActions;
    use crate::interpreter::Interpreter;
    use crate::stores::{DetailsViewStore, DetailsViewStoreData, TabStore, TabStoreData};

    /// Builds bare contexts with one `test/echo` handler.
    #[derive(Default)]
    struct CountingCreator {
        created: AtomicUsize,
        handled: Arc<AtomicUsize>,
    }

    impl TabContextCreator for CountingCreator {
        fn create_tab_context(&self, tab_id: TabId) -> TabContext {
            self.created.fetch_add(1, Ordering::SeqCst);

            let interpreter = Interpreter::new();
            let handled = Arc::clone(&self.handled);
            interpreter.register_type_to_payload_callback("test/echo", move |_, _| {
                handled.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            });

            let stores = TabContextStoreHub {
                tab_store: TabStore::new(&TabActions::default(), TabStoreData::default()),
                details_view_store: DetailsViewStore::new(
                    &DetailsViewActions::default(),
                    DetailsViewStoreData::default(),
                ),
            };
            TabContext::new(tab_id, interpreter, stores)
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let manager = TabContextManager::new();
        let creator = CountingCreator::default();

        assert!(manager.add_tab_context_if_not_exists(TabId::new(1), &creator));
        assert!(!manager.add_tab_context_if_not_exists(TabId::new(1), &creator));
        assert!(!manager.add_tab_context_if_not_exists(TabId::new(1), &creator));

        assert_eq!(manager.len(), 1);
        assert_eq!(creator.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_add_creates_one_context() {
        let manager = Arc::new(TabContextManager::new());
        let creator = Arc::new(CountingCreator::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let creator = Arc::clone(&creator);
                std::thread::spawn(move || {
                    manager.add_tab_context_if_not_exists(TabId::new(42), creator.as_ref())
                })
            })
            .collect();

        let created: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().expect("thread")))
            .sum();

        assert_eq!(created, 1);
        assert_eq!(creator.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let manager = TabContextManager::new();
        let creator = CountingCreator::default();
        manager.add_tab_context_if_not_exists(TabId::new(1), &creator);

        manager.delete_tab_context(TabId::new(1)).await;
        manager.delete_tab_context(TabId::new(1)).await;

        assert!(!manager.contains(TabId::new(1)));
        assert!(manager.get_tab_context_stores(TabId::new(1)).is_none());
    }

    #[test]
    fn test_delete_removes_before_first_poll() {
        let manager = TabContextManager::new();
        let creator = CountingCreator::default();
        manager.add_tab_context_if_not_exists(TabId::new(1), &creator);

        let pending = manager.delete_tab_context(TabId::new(1));
        assert!(!manager.contains(TabId::new(1)));
        drop(pending);
    }

    #[test]
    fn test_interpret_unknown_tab_does_not_create() {
        let manager = TabContextManager::new();
        let response = manager
            .interpret_message_for_tab(TabId::new(9), &Message::new("test/echo"))
            .expect("interpret");

        assert!(!response.is_handled());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_interpret_known_tab() {
        let manager = TabContextManager::new();
        let creator = CountingCreator::default();
        manager.add_tab_context_if_not_exists(TabId::new(3), &creator);

        let message = Message::for_tab("test/echo", TabId::new(3), json!(null));
        let response = manager
            .interpret_message_for_tab(TabId::new(3), &message)
            .expect("interpret");

        assert!(response.is_handled());
        assert_eq!(creator.handled.load(Ordering::SeqCst), 1);
        assert_eq!(manager.tab_ids(), vec![TabId::new(3)]);
    }
}
