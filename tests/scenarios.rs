//! Tab lifecycle scenarios across the background.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{Value, json};

use tab_context_router::broadcast::{Broadcaster, RecordingMessageSink};
use tab_context_router::browser::{BrowserAdapter, SimulatedBrowserAdapter};
use tab_context_router::context::{TabContext, TabContextCreator, TabContextFactory};
use tab_context_router::protocol::messages;
use tab_context_router::storage::{DataStore, MemoryDataStore, PersistenceQueue, keys};
use tab_context_router::{
    Background, BrowserEvent, DetailsViewController, FrameId, Message, TabContextManager, TabId,
    TargetPageController,
};

use common::{GatedBrowser, browser_with, init_logging, tab};

// ============================================================================
// Helpers
// ============================================================================

/// Real factory that also counts creations and lifecycle messages.
struct CountingCreator {
    inner: TabContextFactory,
    created: AtomicUsize,
    lifecycle: Arc<Mutex<Vec<(TabId, String)>>>,
}

impl CountingCreator {
    fn new() -> Self {
        let queue = PersistenceQueue::disabled();
        let details_view_controller =
            Arc::new(DetailsViewController::new(BTreeMap::new(), queue.clone()));
        Self {
            inner: TabContextFactory::new(
                Arc::new(Broadcaster::disabled()),
                details_view_controller,
                queue,
                BTreeMap::new(),
            ),
            created: AtomicUsize::new(0),
            lifecycle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn lifecycle_for(&self, tab_id: TabId) -> Vec<String> {
        self.lifecycle
            .lock()
            .iter()
            .filter(|(id, _)| *id == tab_id)
            .map(|(_, message_type)| message_type.clone())
            .collect()
    }
}

impl TabContextCreator for CountingCreator {
    fn create_tab_context(&self, tab_id: TabId) -> TabContext {
        self.created.fetch_add(1, Ordering::SeqCst);

        let context = self.inner.create_tab_context(tab_id);
        for message_type in [messages::tab::UPDATE, messages::tab::EXISTING_TAB_UPDATED] {
            let lifecycle = Arc::clone(&self.lifecycle);
            context
                .interpreter()
                .register_type_to_payload_callback(message_type, move |_, tab| {
                    if let Some(tab) = tab {
                        lifecycle.lock().push((tab, message_type.to_string()));
                    }
                    Ok(None)
                });
        }
        context
    }
}

fn controller(
    browser: Arc<dyn BrowserAdapter>,
    creator: Arc<CountingCreator>,
    known_tabs: BTreeMap<TabId, String>,
) -> (Arc<TargetPageController>, Arc<TabContextManager>) {
    let manager = Arc::new(TabContextManager::new());
    let controller = Arc::new(TargetPageController::new(
        Arc::clone(&manager),
        browser,
        creator,
        Arc::new(DetailsViewController::new(
            BTreeMap::new(),
            PersistenceQueue::disabled(),
        )),
        known_tabs,
        PersistenceQueue::disabled(),
    ));
    (controller, manager)
}

fn known_tab_ids(store: &MemoryDataStore) -> BTreeMap<String, Value> {
    store
        .peek(keys::KNOWN_TAB_IDS)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_tab_appears_and_is_removed() -> anyhow::Result<()> {
    init_logging();

    let browser = browser_with(&[(7, "https://a.test/page")]);
    let store = Arc::new(MemoryDataStore::new());
    let data_store: Arc<dyn DataStore> = store.clone();
    let sink = Arc::new(RecordingMessageSink::new());

    let background = Background::with_parts(browser, sink.clone(), Some(data_store)).await?;
    background.initialize().await?;
    background.flush().await;

    let tab_id = TabId::new(7);
    let stores = background
        .tab_context_manager()
        .get_tab_context_stores(tab_id)
        .ok_or_else(|| anyhow::anyhow!("tab 7 has no context"))?;
    let state = stores.tab_store.get_state();
    assert_eq!(state.id, Some(tab_id));
    assert_eq!(state.url.as_deref(), Some("https://a.test/page"));
    assert!(!state.is_closed);

    assert!(known_tab_ids(&store).contains_key("7"));
    assert!(!sink.sent_to_tab(tab_id).is_empty());

    background
        .target_page_controller()
        .on_target_tab_removed(tab_id)
        .await;
    background.flush().await;

    assert!(background.tab_context_manager().get_tab_context_stores(tab_id).is_none());
    assert!(!known_tab_ids(&store).contains_key("7"));
    assert!(store.peek(&keys::tab_specific(keys::TAB_STORE, tab_id)).is_none());

    let outcome = background
        .distribute(Message::new(messages::tab::GET_CURRENT).with_tab(tab_id), None)
        .await?;
    assert!(!outcome.handled);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_startup_overlaps_navigation() -> anyhow::Result<()> {
    init_logging();

    let browser = browser_with(&[(42, "https://new.test/")]);
    let gated = GatedBrowser::new(browser);
    let creator = Arc::new(CountingCreator::new());
    let (controller, manager) = controller(gated.clone(), Arc::clone(&creator), BTreeMap::new());

    let tab_id = TabId::new(42);
    let startup = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.initialize().await })
    };
    gated.wait_for_reader().await;

    tokio::time::timeout(
        Duration::from_secs(3),
        controller.on_tab_navigated(tab_id, FrameId::main()),
    )
    .await?;

    gated.open();
    startup.await??;

    assert_eq!(manager.tab_ids(), vec![tab_id]);
    assert_eq!(creator.created(), 1);
    assert_eq!(
        creator.lifecycle_for(tab_id),
        vec![messages::tab::EXISTING_TAB_UPDATED.to_string()]
    );
    assert_eq!(
        controller.known_tab_ids().get(&tab_id).map(String::as_str),
        Some("https://new.test/")
    );

    Ok(())
}

#[tokio::test]
async fn test_events_applied_through_run_loop() -> anyhow::Result<()> {
    init_logging();

    let browser = browser_with(&[(3, "https://a.test/")]);
    let creator = Arc::new(CountingCreator::new());
    let (controller, manager) = controller(browser.clone(), Arc::clone(&creator), BTreeMap::new());

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let runner = Arc::clone(&controller);
    let task = tokio::spawn(async move { runner.run(rx).await });

    let tab_id = TabId::new(3);
    tx.send(BrowserEvent::WebNavigationUpdated {
        tab_id,
        frame_id: FrameId::main(),
        url: "https://a.test/".to_string(),
    })?;
    browser.set_url(tab_id, "https://a.test/next");
    tx.send(BrowserEvent::WebNavigationUpdated {
        tab_id,
        frame_id: FrameId::main(),
        url: "https://a.test/next".to_string(),
    })?;
    tx.send(BrowserEvent::TabRemoved { tab_id })?;
    drop(tx);
    task.await?;

    assert_eq!(
        creator.lifecycle_for(tab_id),
        vec![
            messages::tab::EXISTING_TAB_UPDATED.to_string(),
            messages::tab::EXISTING_TAB_UPDATED.to_string()
        ]
    );
    assert!(manager.is_empty());
    assert!(controller.known_tab_ids().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_global_state_pushed_to_new_surface() -> anyhow::Result<()> {
    init_logging();

    let sink = Arc::new(RecordingMessageSink::new());
    let background =
        Background::with_parts(browser_with(&[]), sink.clone(), None).await?;
    background.flush().await;
    sink.clear();

    let outcome = background
        .distribute(
            Message::new(messages::feature_flags::SET)
                .with_payload(json!({"feature": "debugTools", "enabled": true})),
            None,
        )
        .await?;
    background.flush().await;

    assert!(outcome.handled);
    assert!(
        background
            .global_context()
            .stores()
            .feature_flag_store
            .is_enabled("debugTools")
    );
    assert!(sink.sent().iter().any(|(to, _)| to.is_none()));

    Ok(())
}

// ============================================================================
// Reconciliation Idempotence
// ============================================================================

const URLS: [&str; 3] = ["https://a.test/", "https://b.test/", "https://c.test/"];

fn live_tabs() -> impl Strategy<Value = BTreeMap<u32, usize>> {
    prop::collection::btree_map(1u32..20, 0usize..URLS.len(), 0..8)
}

fn known_tabs() -> impl Strategy<Value = BTreeMap<u32, usize>> {
    prop::collection::btree_map(1u32..20, 0usize..URLS.len(), 0..8)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn reconciliation_is_idempotent(live in live_tabs(), known in known_tabs()) {
        tokio_test::block_on(async {
            let browser = Arc::new(SimulatedBrowserAdapter::new());
            for (&id, &url) in &live {
                browser.add_tab(tab(id, URLS[url]));
            }
            let known: BTreeMap<TabId, String> = known
                .iter()
                .map(|(&id, &url)| (TabId::new(id), URLS[url].to_string()))
                .collect();

            let creator = Arc::new(CountingCreator::new());
            let (controller, manager) = controller(browser, Arc::clone(&creator), known);

            controller.initialize().await.expect("first initialize");
            let live_ids: Vec<TabId> = live.keys().copied().map(TabId::new).collect();
            assert_eq!(manager.tab_ids(), live_ids);

            let expected_known: BTreeMap<TabId, String> = live
                .iter()
                .map(|(&id, &url)| (TabId::new(id), URLS[url].to_string()))
                .collect();
            assert_eq!(controller.known_tab_ids(), expected_known);

            let created = creator.created();
            let messages_before: BTreeSet<(TabId, usize)> = live_ids
                .iter()
                .map(|&id| (id, creator.lifecycle_for(id).len()))
                .collect();

            controller.initialize().await.expect("second initialize");

            assert_eq!(creator.created(), created);
            assert_eq!(manager.tab_ids(), live_ids);
            let messages_after: BTreeSet<(TabId, usize)> = live_ids
                .iter()
                .map(|&id| (id, creator.lifecycle_for(id).len()))
                .collect();
            assert_eq!(messages_after, messages_before);
        });
    }
}
