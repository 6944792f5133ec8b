//! Background coordinator.
//!
//! [`Background`] wires persistence, broadcasting, the global context, tab
//! contexts, the distributor and the target page controller together.
//!
//! # Startup Order
//!
//! 1. Persisted data is loaded
//! 2. The global context is created and broadcasts its state
//! 3. Tab contexts of known tabs are restored
//! 4. Known tabs are reconciled with the live browser
//!
//! # Example
//!
//! ```no_run
//! use tab_context_router::Background;
//!
//! # async fn example() -> tab_context_router::Result<()> {
//! let config = Background::builder().port(9222).build()?;
//! let background = Background::start(config).await?;
//!
//! background.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broadcast::{Broadcaster, MessageSink};
use crate::browser::BrowserAdapter;
use crate::context::{GlobalContext, GlobalContextFactory, TabContextFactory, TabContextManager};
use crate::controller::{DetailsViewController, TargetPageController};
use crate::distributor::{BackgroundMessageDistributor, PostMessageContentHandler, RoutingOutcome};
use crate::error::{Error, Result};
use crate::protocol::{BrowserEvent, Message, Sender};
use crate::storage::{
    DataStore, FileDataStore, PersistedData, PersistenceQueue, load_persisted_data,
};
use crate::transport::{RemoteBrowserAdapter, SurfaceServer};

use super::config::{BackgroundBuilder, BackgroundConfig};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the background.
struct BackgroundInner {
    broadcaster: Arc<Broadcaster>,
    queue: PersistenceQueue,
    global_context: Arc<GlobalContext>,
    tab_context_manager: Arc<TabContextManager>,
    details_view_controller: Arc<DetailsViewController>,
    target_page_controller: Arc<TargetPageController>,
    distributor: Arc<BackgroundMessageDistributor>,
    server: Option<Arc<SurfaceServer>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// Background
// ============================================================================

/// Extension background.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Background {
    inner: Arc<BackgroundInner>,
}

impl fmt::Debug for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Background")
            .field("tab_contexts", &self.inner.tab_context_manager.len())
            .field("persisting", &self.inner.queue.is_enabled())
            .field("has_server", &self.inner.server.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Background - Construction
// ============================================================================

impl Background {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BackgroundBuilder {
        BackgroundBuilder::new()
    }

    /// Assembles a background from its collaborators.
    ///
    /// Persistence is enabled when `data_store` is given. Known tabs are
    /// restored but not reconciled; call [`Background::initialize`] for that.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisted data cannot be read.
    pub async fn with_parts(
        browser: Arc<dyn BrowserAdapter>,
        sink: Arc<dyn MessageSink>,
        data_store: Option<Arc<dyn DataStore>>,
    ) -> Result<Self> {
        let inner = Self::assemble(browser, sink, data_store, None).await?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Starts the surface server, waits for the browser shim and initializes.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if persistence is enabled without a data directory
    /// - [`Error::Io`] if the server cannot bind or the data directory cannot be created
    /// - [`Error::ConnectionTimeout`] if the browser shim does not connect in time
    /// - Any error from [`Background::initialize`]
    pub async fn start(config: BackgroundConfig) -> Result<Self> {
        let data_store: Option<Arc<dyn DataStore>> = match (config.persist_store_data, &config.data_dir) {
            (true, Some(dir)) => Some(Arc::new(FileDataStore::open(dir.clone()).await?)),
            (true, None) => {
                return Err(Error::config("Persistence enabled without a data directory"));
            }
            (false, _) => None,
        };

        let server = SurfaceServer::bind(config.bind_ip, config.port).await?;

        if let Err(e) = server.wait_for_browser(config.browser_connect_timeout).await {
            server.shutdown();
            return Err(e);
        }

        let browser: Arc<dyn BrowserAdapter> = Arc::new(RemoteBrowserAdapter::new(Arc::clone(&server)));
        let sink: Arc<dyn MessageSink> = server.clone();
        let inner = match Self::assemble(browser, sink, data_store, Some(Arc::clone(&server))).await {
            Ok(inner) => inner,
            Err(e) => {
                server.shutdown();
                return Err(e);
            }
        };
        let background = Self {
            inner: Arc::new(inner),
        };

        server.set_message_handler(background.inner.distributor.clone());

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        server.set_event_sender(event_tx);
        background.spawn_event_loop(event_rx);

        if let Err(e) = background.initialize().await {
            background.shutdown().await;
            return Err(e);
        }

        info!(port = server.port(), "Background started");
        Ok(background)
    }

    async fn assemble(
        browser: Arc<dyn BrowserAdapter>,
        sink: Arc<dyn MessageSink>,
        data_store: Option<Arc<dyn DataStore>>,
        server: Option<Arc<SurfaceServer>>,
    ) -> Result<BackgroundInner> {
        let (persisted, queue) = match data_store {
            Some(store) => {
                let persisted = load_persisted_data(store.as_ref()).await?;
                (persisted, PersistenceQueue::spawn(store))
            }
            None => (PersistedData::default(), PersistenceQueue::disabled()),
        };

        debug!(
            known_tabs = persisted.known_tab_ids.len(),
            details_views = persisted.tab_id_to_details_view_map.len(),
            persisting = queue.is_enabled(),
            "Persisted data loaded"
        );

        let broadcaster = Arc::new(Broadcaster::new(sink));
        let details_view_controller = Arc::new(DetailsViewController::new(
            persisted.tab_id_to_details_view_map.clone(),
            queue.clone(),
        ));

        let global_context = Arc::new(GlobalContextFactory::create_global_context(
            Arc::clone(&broadcaster),
            &persisted,
            queue.clone(),
        ));

        let factory = Arc::new(TabContextFactory::new(
            Arc::clone(&broadcaster),
            Arc::clone(&details_view_controller),
            queue.clone(),
            persisted.tab_data.clone(),
        ));

        let tab_context_manager = Arc::new(TabContextManager::new());

        let distributor = Arc::new(BackgroundMessageDistributor::new(
            Arc::clone(&global_context),
            Arc::clone(&tab_context_manager),
            Arc::new(PostMessageContentHandler::new()),
        ));

        let target_page_controller = Arc::new(TargetPageController::new(
            Arc::clone(&tab_context_manager),
            browser,
            factory,
            Arc::clone(&details_view_controller),
            persisted.known_tab_ids,
            queue.clone(),
        ));

        Ok(BackgroundInner {
            broadcaster,
            queue,
            global_context,
            tab_context_manager,
            details_view_controller,
            target_page_controller,
            distributor,
            server,
            event_task: Mutex::new(None),
        })
    }
}

// ============================================================================
// Background - Public API
// ============================================================================

impl Background {
    /// Reconciles known tabs with the live browser.
    ///
    /// # Errors
    ///
    /// Returns the browser error if live tabs cannot be queried.
    pub async fn initialize(&self) -> Result<()> {
        self.inner.target_page_controller.initialize().await
    }

    /// Routes one message from a surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handler`] if a handler failed.
    pub async fn distribute(&self, message: Message, sender: Option<&Sender>) -> Result<RoutingOutcome> {
        self.inner.distributor.distribute(message, sender).await
    }

    /// Feeds browser events to the target page controller in order.
    ///
    /// Replaces any previously spawned event loop.
    pub fn spawn_event_loop(&self, events: mpsc::UnboundedReceiver<BrowserEvent>) {
        let controller = Arc::clone(&self.inner.target_page_controller);
        let handle = tokio::spawn(async move {
            controller.run(events).await;
        });

        if let Some(previous) = self.inner.event_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Waits until queued broadcasts and writes have been applied.
    pub async fn flush(&self) {
        self.inner.broadcaster.flush().await;
        self.inner.queue.flush().await;
    }

    /// Stops the event loop and server, then flushes.
    pub async fn shutdown(&self) {
        if let Some(task) = self.inner.event_task.lock().take() {
            task.abort();
        }

        if let Some(server) = &self.inner.server {
            server.shutdown();
        }

        self.flush().await;

        let remaining = self.inner.tab_context_manager.len();
        if remaining > 0 {
            debug!(tab_contexts = remaining, "Shutting down with live tab contexts");
        }
        info!("Background shut down");
    }
}

// ============================================================================
// Background - Accessors
// ============================================================================

impl Background {
    /// Returns the global context.
    #[inline]
    #[must_use]
    pub fn global_context(&self) -> &Arc<GlobalContext> {
        &self.inner.global_context
    }

    /// Returns the tab context manager.
    #[inline]
    #[must_use]
    pub fn tab_context_manager(&self) -> &Arc<TabContextManager> {
        &self.inner.tab_context_manager
    }

    /// Returns the target page controller.
    #[inline]
    #[must_use]
    pub fn target_page_controller(&self) -> &Arc<TargetPageController> {
        &self.inner.target_page_controller
    }

    /// Returns the details view controller.
    #[inline]
    #[must_use]
    pub fn details_view_controller(&self) -> &Arc<DetailsViewController> {
        &self.inner.details_view_controller
    }

    /// Returns the message distributor.
    #[inline]
    #[must_use]
    pub fn distributor(&self) -> &Arc<BackgroundMessageDistributor> {
        &self.inner.distributor
    }

    /// Returns the surface server when started with [`Background::start`].
    #[inline]
    #[must_use]
    pub fn server(&self) -> Option<&Arc<SurfaceServer>> {
        self.inner.server.as_ref()
    }
}

impl Drop for BackgroundInner {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
        if let Some(server) = &self.server {
            server.shutdown();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    use crate::broadcast::RecordingMessageSink;
    use crate::browser::{SimulatedBrowserAdapter, TabInfo};
    use crate::identifiers::{TabId, WindowId};
    use crate::protocol::messages;
    use crate::storage::{MemoryDataStore, keys};

    fn tab(id: u32, url: &str) -> TabInfo {
        TabInfo::new(TabId::new(id), WindowId::new(1), url)
    }

    #[tokio::test]
    async fn test_global_state_broadcast_on_creation() {
        let browser = Arc::new(SimulatedBrowserAdapter::new());
        let sink = Arc::new(RecordingMessageSink::new());

        let background = Background::with_parts(browser, sink.clone(), None)
            .await
            .expect("background");
        background.flush().await;

        let broadcasts: Vec<Value> = sink
            .sent()
            .into_iter()
            .filter(|(to, _)| to.is_none())
            .map(|(_, message)| message)
            .collect();
        assert_eq!(broadcasts.len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_creates_contexts_for_live_tabs() {
        let browser = Arc::new(SimulatedBrowserAdapter::new());
        browser.add_tab(tab(1, "https://a.test/"));
        browser.add_tab(tab(2, "https://b.test/"));

        let background = Background::with_parts(
            browser,
            Arc::new(RecordingMessageSink::new()),
            None,
        )
        .await
        .expect("background");
        background.initialize().await.expect("initialize");

        assert_eq!(
            background.tab_context_manager().tab_ids(),
            vec![TabId::new(1), TabId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_restores_persisted_tabs() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryDataStore::with_items([(
            keys::KNOWN_TAB_IDS,
            json!({"5": "https://a.test/"}),
        )]));
        let browser = Arc::new(SimulatedBrowserAdapter::new());
        browser.add_tab(tab(5, "https://a.test/"));

        let background = Background::with_parts(
            browser,
            Arc::new(RecordingMessageSink::new()),
            Some(store),
        )
        .await
        .expect("background");
        background.initialize().await.expect("initialize");

        assert!(background.tab_context_manager().contains(TabId::new(5)));
        assert_eq!(
            background.target_page_controller().known_tab_ids().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_distribute_routes_to_tab() {
        let browser = Arc::new(SimulatedBrowserAdapter::new());
        browser.add_tab(tab(3, "https://a.test/"));

        let background = Background::with_parts(
            browser,
            Arc::new(RecordingMessageSink::new()),
            None,
        )
        .await
        .expect("background");
        background.initialize().await.expect("initialize");

        let outcome = background
            .distribute(
                Message::new(messages::tab::GET_CURRENT).with_tab(TabId::new(3)),
                None,
            )
            .await
            .expect("distribute");
        assert!(outcome.handled);
    }
}
