//! Per-tab page state.
//!
//! | Action | Effect | Emits |
//! |--------|--------|-------|
//! | `new_tab_created` | Takes id, url, title; clears flags | Always |
//! | `existing_tab_updated` | Like `new_tab_created` on an empty store, else takes url, title and marks changed on URL change | On change |
//! | `tab_change` | Takes url, title; marks changed | Always |
//! | `tab_remove` | Marks closed | Always |
//! | `tab_visibility_change` | Sets hidden | On change |
//! | `get_current_state` | Nothing | Always |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::{Origin, Url};

use crate::actions::{TabActions, TabPayload};
use crate::flux::{StoreBacked, StoreCore, StoreName};
use crate::identifiers::TabId;
use crate::storage::PersistenceQueue;

// ============================================================================
// TabStoreData
// ============================================================================

/// State of the tab store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TabStoreData {
    /// Tab ID.
    pub id: Option<TabId>,
    /// Page URL.
    pub url: Option<String>,
    /// Page title.
    pub title: Option<String>,
    /// The tab was closed.
    pub is_closed: bool,
    /// The page changed since the tab got its context.
    pub is_changed: bool,
    /// The page is hidden.
    pub is_page_hidden: bool,
    /// The last URL change crossed origins.
    pub is_origin_changed: bool,
}

// ============================================================================
// TabStore
// ============================================================================

/// Store of [`TabStoreData`].
#[derive(Debug)]
pub struct TabStore {
    core: StoreCore<TabStoreData>,
}

impl StoreBacked for TabStore {
    type State = TabStoreData;

    fn core(&self) -> &StoreCore<TabStoreData> {
        &self.core
    }
}

impl TabStore {
    /// Creates a non-persistent store listening to `actions`.
    #[must_use]
    pub fn new(actions: &TabActions, initial: TabStoreData) -> Arc<Self> {
        Self::from_core(actions, StoreCore::new(StoreName::TabStore, initial))
    }

    /// Creates a store that persists under `key`.
    #[must_use]
    pub fn persistent(
        actions: &TabActions,
        initial: TabStoreData,
        key: String,
        queue: PersistenceQueue,
    ) -> Arc<Self> {
        let core = StoreCore::new(StoreName::TabStore, initial).with_persistence(key, queue);
        Self::from_core(actions, core)
    }

    /// Returns a snapshot of the state.
    #[inline]
    #[must_use]
    pub fn get_state(&self) -> TabStoreData {
        self.core.get_state()
    }

    fn from_core(actions: &TabActions, core: StoreCore<TabStoreData>) -> Arc<Self> {
        let store = Arc::new(Self { core });

        let s = Arc::clone(&store);
        actions
            .new_tab_created
            .add_listener(move |tab| s.on_new_tab_created(tab));

        let s = Arc::clone(&store);
        actions
            .existing_tab_updated
            .add_listener(move |tab| s.on_existing_tab_updated(tab));

        let s = Arc::clone(&store);
        actions.tab_change.add_listener(move |tab| s.on_tab_change(tab));

        let s = Arc::clone(&store);
        actions.tab_remove.add_listener(move |_| s.on_tab_remove());

        let s = Arc::clone(&store);
        actions
            .tab_visibility_change
            .add_listener(move |hidden| s.on_visibility_change(*hidden));

        let s = Arc::clone(&store);
        actions
            .get_current_state
            .add_listener(move |_| s.core.emit_changed());

        store
    }

    fn on_new_tab_created(&self, tab: &TabPayload) {
        self.core.update(|state| {
            adopt_tab(state, tab);
            true
        });
    }

    fn on_existing_tab_updated(&self, tab: &TabPayload) {
        self.core.update(|state| {
            if state.id.is_none() && state.url.is_none() {
                adopt_tab(state, tab);
                return true;
            }

            let url_changed = tab.url.is_some() && tab.url != state.url;
            let title_changed = tab.title.is_some() && tab.title != state.title;
            if !url_changed && !title_changed {
                return false;
            }

            if url_changed {
                state.is_origin_changed = origin_changed(state.url.as_deref(), tab.url.as_deref());
                state.is_changed = true;
                state.url = tab.url.clone();
            }
            if title_changed {
                state.title = tab.title.clone();
            }
            true
        });
    }

    fn on_tab_change(&self, tab: &TabPayload) {
        self.core.update(|state| {
            state.is_origin_changed = origin_changed(state.url.as_deref(), tab.url.as_deref());
            state.url = tab.url.clone();
            state.title = tab.title.clone();
            state.is_changed = true;
            true
        });
    }

    fn on_tab_remove(&self) {
        self.core.update(|state| {
            state.is_closed = true;
            true
        });
    }

    fn on_visibility_change(&self, hidden: bool) {
        self.core.update(|state| {
            if state.is_page_hidden == hidden {
                return false;
            }
            state.is_page_hidden = hidden;
            true
        });
    }
}

fn origin_of(url: Option<&str>) -> Option<Origin> {
    url.and_then(|u| Url::parse(u).ok()).map(|u| u.origin())
}

/// Returns `true` if both URLs are known and their origins differ.
fn origin_changed(previous: Option<&str>, next: Option<&str>) -> bool {
    if previous.is_none() || next.is_none() {
        return false;
    }
    origin_of(previous) != origin_of(next)
}

/// Takes a tab's identity and page as a fresh start.
fn adopt_tab(state: &mut TabStoreData, tab: &TabPayload) {
    if tab.id.is_some() {
        state.id = tab.id;
    }
    state.url = tab.url.clone();
    state.title = tab.title.clone();
    state.is_closed = false;
    state.is_changed = false;
    state.is_origin_changed = false;
}

// ============================================================================
// Tests
// ============================================================================
