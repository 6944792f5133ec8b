//! In-memory browser for tests, benches and offline runs.
//!
//! Every call yields to the scheduler before reading so concurrent
//! lifecycle handling interleaves the way it does against a real browser.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::identifiers::{TabId, WindowId};

use super::adapter::BrowserAdapter;
use super::types::{TabInfo, TabQuery, WindowInfo, WindowState, WindowType};

// ============================================================================
// SimulatedBrowserAdapter
// ============================================================================

#[derive(Debug, Default)]
struct BrowserState {
    tabs: Vec<TabInfo>,
    windows: Vec<WindowInfo>,
}

/// Browser adapter backed by an in-memory tab and window list.
#[derive(Debug, Default)]
pub struct SimulatedBrowserAdapter {
    state: Mutex<BrowserState>,
    query_calls: AtomicUsize,
    get_tab_calls: AtomicUsize,
}

impl SimulatedBrowserAdapter {
    /// Creates an empty browser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tab, creating its window if needed.
    pub fn add_tab(&self, tab: TabInfo) {
        let mut state = self.state.lock();
        if !state.windows.iter().any(|w| w.id == tab.window_id) {
            state.windows.push(WindowInfo::new(tab.window_id));
        }
        state.tabs.retain(|t| t.id != tab.id);
        state.tabs.push(tab);
    }

    /// Removes a tab. Returns `true` if it existed.
    pub fn remove_tab(&self, tab_id: TabId) -> bool {
        let mut state = self.state.lock();
        let before = state.tabs.len();
        state.tabs.retain(|t| t.id != tab_id);
        state.tabs.len() != before
    }

    /// Changes a tab's URL.
    pub fn set_url(&self, tab_id: TabId, url: impl Into<String>) {
        let url = url.into();
        if let Some(tab) = self.state.lock().tabs.iter_mut().find(|t| t.id == tab_id) {
            tab.url = Some(url);
        }
    }

    /// Makes a tab the active tab of its window.
    pub fn activate(&self, tab_id: TabId) {
        let mut state = self.state.lock();
        let Some(window_id) = state.tabs.iter().find(|t| t.id == tab_id).map(|t| t.window_id)
        else {
            return;
        };
        for tab in state.tabs.iter_mut().filter(|t| t.window_id == window_id) {
            tab.active = tab.id == tab_id;
        }
    }

    /// Adds or replaces a window description.
    pub fn add_window(&self, window: WindowInfo) {
        let mut state = self.state.lock();
        state.windows.retain(|w| w.id != window.id);
        state.windows.push(window);
    }

    /// Changes a window's display state.
    pub fn set_window_state(&self, window_id: WindowId, window_state: WindowState) {
        if let Some(window) = self
            .state
            .lock()
            .windows
            .iter_mut()
            .find(|w| w.id == window_id)
        {
            window.state = window_state;
        }
    }

    /// Returns the current tab list.
    #[must_use]
    pub fn tabs(&self) -> Vec<TabInfo> {
        self.state.lock().tabs.clone()
    }

    /// Returns how many `tabs_query` calls were served.
    #[inline]
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Returns how many `get_tab` calls were served.
    #[inline]
    #[must_use]
    pub fn get_tab_count(&self) -> usize {
        self.get_tab_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserAdapter for SimulatedBrowserAdapter {
    async fn tabs_query(&self, query: TabQuery) -> Result<Vec<TabInfo>> {
        tokio::task::yield_now().await;
        self.query_calls.fetch_add(1, Ordering::SeqCst);

        let state = self.state.lock();
        Ok(state
            .tabs
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect())
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo> {
        tokio::task::yield_now().await;
        self.get_tab_calls.fetch_add(1, Ordering::SeqCst);

        self.state
            .lock()
            .tabs
            .iter()
            .find(|t| t.id == tab_id)
            .cloned()
            .ok_or_else(|| Error::tab_not_found(tab_id))
    }

    async fn get_all_windows(&self, window_types: &[WindowType]) -> Result<Vec<WindowInfo>> {
        tokio::task::yield_now().await;

        let state = self.state.lock();
        Ok(state
            .windows
            .iter()
            .filter(|w| window_types.is_empty() || window_types.contains(&w.window_type))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: u32, window: u32) -> TabInfo {
        TabInfo::new(TabId::new(id), WindowId::new(window), format!("https://t{id}.test/"))
    }

    #[tokio::test]
    async fn test_query_and_get() {
        let browser = SimulatedBrowserAdapter::new();
        browser.add_tab(tab(1, 10));
        browser.add_tab(tab(2, 10));
        browser.add_tab(tab(3, 11));

        let all = browser.tabs_query(TabQuery::all()).await.expect("query");
        assert_eq!(all.len(), 3);

        let in_window = browser
            .tabs_query(TabQuery::in_window(WindowId::new(10)))
            .await
            .expect("query");
        assert_eq!(in_window.len(), 2);

        let found = browser.get_tab(TabId::new(3)).await.expect("get");
        assert_eq!(found.window_id, WindowId::new(11));
        assert_eq!(browser.query_count(), 2);
        assert_eq!(browser.get_tab_count(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_tab() {
        let browser = SimulatedBrowserAdapter::new();
        let err = browser.get_tab(TabId::new(9)).await.unwrap_err();
        assert!(matches!(err, Error::TabNotFound { .. }));
    }

    #[tokio::test]
    async fn test_activate_switches_siblings() {
        let browser = SimulatedBrowserAdapter::new();
        browser.add_tab(tab(1, 10).with_active(true));
        browser.add_tab(tab(2, 10));
        browser.activate(TabId::new(2));

        let active = browser
            .tabs_query(TabQuery::active_in_window(WindowId::new(10)))
            .await
            .expect("query");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, TabId::new(2));
    }

    #[tokio::test]
    async fn test_windows_filtered_by_type() {
        let browser = SimulatedBrowserAdapter::new();
        browser.add_window(WindowInfo::new(WindowId::new(1)));
        browser.add_window(WindowInfo::new(WindowId::new(2)).with_type(WindowType::Devtools));

        let windows = browser
            .get_all_windows(&[WindowType::Normal, WindowType::Popup])
            .await
            .expect("windows");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].id, WindowId::new(1));
    }
}
