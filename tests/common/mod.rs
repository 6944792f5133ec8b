//! Shared utilities for integration tests.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Once};

use async_trait::async_trait;
use tab_context_router::browser::{SimulatedBrowserAdapter, TabQuery, WindowType};
use tab_context_router::{
    BrowserAdapter, Error, Result, TabId, TabInfo, WindowId, WindowInfo,
};
use tokio::sync::{Notify, Semaphore};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Functions
// ============================================================================

static LOGGING: Once = Once::new();

/// Initialize tracing once per test binary.
///
/// Honors `RUST_LOG`, defaulting to warnings only.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tab_context_router=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Builds an active tab in window 1.
pub fn tab(id: u32, url: &str) -> TabInfo {
    TabInfo::new(TabId::new(id), WindowId::new(1), url).with_active(true)
}

/// Builds a simulated browser holding `tabs`.
pub fn browser_with(tabs: &[(u32, &str)]) -> Arc<SimulatedBrowserAdapter> {
    let browser = Arc::new(SimulatedBrowserAdapter::new());
    for &(id, url) in tabs {
        browser.add_tab(tab(id, url));
    }
    browser
}

// ============================================================================
// GatedBrowser
// ============================================================================

/// Browser whose `get_tab` reads the tab, then waits until [`open`](Self::open).
pub struct GatedBrowser {
    inner: Arc<SimulatedBrowserAdapter>,
    reading: Notify,
    gate: Semaphore,
}

impl GatedBrowser {
    pub fn new(inner: Arc<SimulatedBrowserAdapter>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reading: Notify::new(),
            gate: Semaphore::new(0),
        })
    }

    /// Resolves once some `get_tab` call is parked at the gate.
    pub async fn wait_for_reader(&self) {
        self.reading.notified().await;
    }

    /// Lets every current and future `get_tab` call through.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl BrowserAdapter for GatedBrowser {
    async fn tabs_query(&self, query: TabQuery) -> Result<Vec<TabInfo>> {
        self.inner.tabs_query(query).await
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo> {
        let tab = self.inner.get_tab(tab_id).await?;
        self.reading.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| Error::browser("gate closed"))?;
        Ok(tab)
    }

    async fn get_all_windows(&self, window_types: &[WindowType]) -> Result<Vec<WindowInfo>> {
        self.inner.get_all_windows(window_types).await
    }
}
