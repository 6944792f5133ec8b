//! Tab context construction.
//!
//! A new context gets:
//!
//! 1. Tab and details view stores, restored from persisted state when the
//!    tab was known before a restart.
//! 2. Action creators registered on a fresh interpreter.
//! 3. A state dispatcher that pushes every store's state now and after
//!    each change.
//! 4. Store state request callbacks.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::actions::{DetailsViewActionCreator, DetailsViewActions, TabActionCreator, TabActions};
use crate::broadcast::{Broadcaster, StateDispatcher};
use crate::controller::DetailsViewController;
use crate::identifiers::TabId;
use crate::interpreter::Interpreter;
use crate::storage::{PersistenceQueue, TabSpecificPersistedData, keys};
use crate::stores::{
    DetailsViewStore, DetailsViewStoreData, StoreHub, TabContextStoreHub, TabStore, TabStoreData,
};

use super::TabContext;

// ============================================================================
// TabContextCreator
// ============================================================================

/// Builds fully wired tab contexts.
///
/// Creation is synchronous; it runs under the context manager's lock.
pub trait TabContextCreator: Send + Sync {
    /// Builds the context of a tab.
    fn create_tab_context(&self, tab_id: TabId) -> TabContext;
}

// ============================================================================
// TabContextFactory
// ============================================================================

/// Production [`TabContextCreator`].
pub struct TabContextFactory {
    broadcaster: Arc<Broadcaster>,
    details_view_controller: Arc<DetailsViewController>,
    queue: PersistenceQueue,
    persisted_tab_data: Mutex<BTreeMap<TabId, TabSpecificPersistedData>>,
}

impl TabContextFactory {
    /// Creates a factory.
    ///
    /// `persisted_tab_data` is consumed on first use per tab, so a context
    /// recreated after deletion starts empty.
    #[must_use]
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        details_view_controller: Arc<DetailsViewController>,
        queue: PersistenceQueue,
        persisted_tab_data: BTreeMap<TabId, TabSpecificPersistedData>,
    ) -> Self {
        Self {
            broadcaster,
            details_view_controller,
            queue,
            persisted_tab_data: Mutex::new(persisted_tab_data),
        }
    }
}

impl TabContextCreator for TabContextFactory {
    fn create_tab_context(&self, tab_id: TabId) -> TabContext {
        let persisted = self
            .persisted_tab_data
            .lock()
            .remove(&tab_id)
            .unwrap_or_default();

        let tab_actions = Arc::new(TabActions::default());
        let details_view_actions = Arc::new(DetailsViewActions::default());

        let tab_state = restore::<TabStoreData>(tab_id, "tab store", persisted.tab_store)
            .unwrap_or_else(|| TabStoreData {
                id: Some(tab_id),
                ..TabStoreData::default()
            });
        let details_view_state = restore::<DetailsViewStoreData>(
            tab_id,
            "details view store",
            persisted.details_view_store,
        )
        .unwrap_or_default();

        let stores = TabContextStoreHub {
            tab_store: TabStore::persistent(
                &tab_actions,
                tab_state,
                keys::tab_specific(keys::TAB_STORE, tab_id),
                self.queue.clone(),
            ),
            details_view_store: DetailsViewStore::persistent(
                &details_view_actions,
                details_view_state,
                keys::tab_specific(keys::DETAILS_VIEW_STORE, tab_id),
                self.queue.clone(),
            ),
        };

        let interpreter = Interpreter::new();
        TabActionCreator::new(tab_actions).register_callbacks(&interpreter);
        DetailsViewActionCreator::new(
            details_view_actions,
            Arc::clone(&self.details_view_controller),
        )
        .register_callbacks(&interpreter);

        let all_stores = stores.get_all_stores();
        let dispatcher = StateDispatcher::for_tab(Arc::clone(&self.broadcaster), tab_id);
        dispatcher.initialize(&all_stores);
        dispatcher.register_state_requests(&interpreter, &all_stores);

        debug!(tab_id = %tab_id, handlers = interpreter.len(), "Tab context created");

        TabContext::new(tab_id, interpreter, stores)
    }
}

fn restore<T: DeserializeOwned>(tab_id: TabId, what: &str, value: Option<Value>) -> Option<T> {
    let value = value?;
    serde_json::from_value(value)
        .inspect_err(|e| {
            warn!(tab_id = %tab_id, store = what, error = %e, "Ignoring undecodable persisted state");
        })
        .ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::broadcast::RecordingMessageSink;
    use crate::protocol::{Message, messages};

    fn factory(
        sink: &Arc<RecordingMessageSink>,
        persisted: BTreeMap<TabId, TabSpecificPersistedData>,
    ) -> (TabContextFactory, Arc<Broadcaster>) {
        let broadcaster = Arc::new(Broadcaster::new(sink.clone()));
        let controller = Arc::new(DetailsViewController::new(
            BTreeMap::new(),
            PersistenceQueue::disabled(),
        ));
        let factory = TabContextFactory::new(
            Arc::clone(&broadcaster),
            controller,
            PersistenceQueue::disabled(),
            persisted,
        );
        (factory, broadcaster)
    }

    #[tokio::test]
    async fn test_every_store_broadcasts_on_creation() {
        let sink = Arc::new(RecordingMessageSink::new());
        let (factory, broadcaster) = factory(&sink, BTreeMap::new());

        let context = factory.create_tab_context(TabId::new(5));
        broadcaster.flush().await;

        let sent = sink.sent_to_tab(TabId::new(5));
        let store_ids: Vec<_> = sent.iter().map(|m| m["storeId"].clone()).collect();
        assert_eq!(store_ids, vec![json!("TabStore"), json!("DetailsViewStore")]);
        assert_eq!(context.stores().tab_store.get_state().id, Some(TabId::new(5)));
    }

    #[tokio::test]
    async fn test_state_request_broadcasts() {
        let sink = Arc::new(RecordingMessageSink::new());
        let (factory, broadcaster) = factory(&sink, BTreeMap::new());
        let context = factory.create_tab_context(TabId::new(5));
        broadcaster.flush().await;
        sink.clear();

        let request = Message::new(messages::store_state_request("DetailsViewStore"))
            .with_tab(TabId::new(5));
        let response = context.interpreter().interpret(&request).expect("interpret");
        assert!(response.is_handled());

        broadcaster.flush().await;
        let sent = sink.sent_to_tab(TabId::new(5));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["storeId"], "DetailsViewStore");
    }

    #[tokio::test]
    async fn test_persisted_state_used_once() {
        let sink = Arc::new(RecordingMessageSink::new());
        let persisted = BTreeMap::from([(
            TabId::new(8),
            TabSpecificPersistedData {
                tab_store: Some(json!({"id": 8, "url": "https://saved.test/"})),
                details_view_store: None,
            },
        )]);
        let (factory, _) = factory(&sink, persisted);

        let first = factory.create_tab_context(TabId::new(8));
        assert_eq!(
            first.stores().tab_store.get_state().url.as_deref(),
            Some("https://saved.test/")
        );

        let second = factory.create_tab_context(TabId::new(8));
        assert_eq!(second.stores().tab_store.get_state().url, None);
    }
}
