//! Tab lifecycle controller.
//!
//! Translates browser lifecycle events into tab context creation,
//! deletion and tab messages, and keeps the persisted `knownTabIds` map in
//! step with the contexts that exist.
//!
//! | Event | Effect |
//! |-------|--------|
//! | `webNavigation.onCommitted` (main frame) | [`handle_tab_url_update`](TargetPageController::handle_tab_url_update) |
//! | `tabs.onUpdated` with a URL | [`handle_tab_url_update`](TargetPageController::handle_tab_url_update) |
//! | `tabs.onActivated` | Visibility of the window's tabs |
//! | `windows.onFocusChanged` | Visibility of every window's active tab |
//! | `tabs.onRemoved` | [`on_target_tab_removed`](TargetPageController::on_target_tab_removed) |
//!
//! Visibility handling never creates or destroys contexts.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::browser::{BrowserAdapter, TabQuery, WindowState, WindowType};
use crate::context::{TabContextCreator, TabContextManager};
use crate::error::Result;
use crate::identifiers::{FrameId, TabId, WindowId};
use crate::protocol::{BrowserEvent, Message, TabChangeInfo, messages};
use crate::storage::{PersistenceQueue, keys};

use super::DetailsViewController;

// ============================================================================
// Constants
// ============================================================================

/// Window types whose active tabs track minimize state.
const VISIBILITY_WINDOW_TYPES: [WindowType; 2] = [WindowType::Normal, WindowType::Popup];

// ============================================================================
// TargetPageController
// ============================================================================

/// Drives tab context lifecycle from browser events.
pub struct TargetPageController {
    manager: Arc<TabContextManager>,
    browser: Arc<dyn BrowserAdapter>,
    factory: Arc<dyn TabContextCreator>,
    details_view_controller: Arc<DetailsViewController>,
    known_tabs: Mutex<BTreeMap<TabId, String>>,
    queue: PersistenceQueue,
    /// Tabs with URL handling in progress, flagged when another update
    /// arrived meanwhile.
    in_flight: Mutex<FxHashMap<TabId, bool>>,
}

impl TargetPageController {
    /// Creates a controller.
    ///
    /// `known_tabs` is the persisted `tabId -> url` map.
    #[must_use]
    pub fn new(
        manager: Arc<TabContextManager>,
        browser: Arc<dyn BrowserAdapter>,
        factory: Arc<dyn TabContextCreator>,
        details_view_controller: Arc<DetailsViewController>,
        known_tabs: BTreeMap<TabId, String>,
        queue: PersistenceQueue,
    ) -> Self {
        Self {
            manager,
            browser,
            factory,
            details_view_controller,
            known_tabs: Mutex::new(known_tabs),
            queue,
            in_flight: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns a copy of the known tab map.
    #[must_use]
    pub fn known_tab_ids(&self) -> BTreeMap<TabId, String> {
        self.known_tabs.lock().clone()
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Reconciles persisted tabs with the live browser.
    ///
    /// Restores contexts of known tabs, removes known tabs that no longer
    /// exist, and handles live tabs that are unknown or whose URL changed
    /// as new. Running it again on an unchanged browser does nothing.
    ///
    /// # Errors
    ///
    /// Returns the browser error if live tabs cannot be queried.
    pub async fn initialize(&self) -> Result<()> {
        let known: Vec<TabId> = self.known_tabs.lock().keys().copied().collect();
        for &tab_id in &known {
            self.manager
                .add_tab_context_if_not_exists(tab_id, self.factory.as_ref());
        }

        let tabs = self.browser.tabs_query(TabQuery::all()).await?;

        let removed: Vec<TabId> = known
            .iter()
            .copied()
            .filter(|id| !tabs.iter().any(|t| t.id == *id))
            .collect();
        for &tab_id in &removed {
            self.on_target_tab_removed(tab_id).await;
        }

        let changed: Vec<TabId> = {
            let known_tabs = self.known_tabs.lock();
            tabs.iter()
                .filter(|t| known_tabs.get(&t.id).map(String::as_str) != Some(t.url_or_empty()))
                .map(|t| t.id)
                .collect()
        };
        for &tab_id in &changed {
            self.handle_tab_url_update(tab_id).await;
        }

        info!(
            restored = known.len(),
            removed = removed.len(),
            updated = changed.len(),
            "Tab reconciliation complete"
        );
        Ok(())
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    /// Handles lifecycle events in order until the channel closes.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<BrowserEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Browser event stream ended");
    }

    /// Handles one lifecycle event.
    pub async fn handle_event(&self, event: BrowserEvent) {
        trace!(method = event.method(), "Browser event");

        match event {
            BrowserEvent::WebNavigationUpdated {
                tab_id, frame_id, ..
            } => self.on_tab_navigated(tab_id, frame_id).await,
            BrowserEvent::TabUpdated {
                tab_id,
                change_info,
            } => self.on_tab_updated(tab_id, &change_info).await,
            BrowserEvent::TabActivated { tab_id, window_id } => {
                self.on_tab_activated(tab_id, window_id).await;
            }
            BrowserEvent::TabRemoved { tab_id } => self.on_target_tab_removed(tab_id).await,
            BrowserEvent::WindowFocusChanged { window_id } => {
                self.on_window_focus_changed(window_id).await;
            }
            BrowserEvent::Connect => {}
        }
    }

    // ========================================================================
    // URL Updates
    // ========================================================================

    /// Handles a committed navigation. Subframes are ignored.
    pub async fn on_tab_navigated(&self, tab_id: TabId, frame_id: FrameId) {
        if !frame_id.is_main() {
            trace!(tab_id = %tab_id, frame_id = %frame_id, "Ignoring subframe navigation");
            return;
        }
        self.handle_tab_url_update(tab_id).await;
    }

    /// Handles a tab property change. Only URL changes matter.
    pub async fn on_tab_updated(&self, tab_id: TabId, change_info: &TabChangeInfo) {
        if change_info.url.is_none() {
            return;
        }
        self.handle_tab_url_update(tab_id).await;
    }

    /// Ensures the tab has a context and tells it about its page.
    ///
    /// The context receives `Tab.ExistingTabUpdated` with the current tab
    /// and the known URL is refreshed; an unchanged URL is not written
    /// again. Calls that arrive while the tab is being handled coalesce:
    /// the running call looks at the tab once more when it finishes and
    /// only pushes again if the URL moved on.
    pub async fn handle_tab_url_update(&self, tab_id: TabId) {
        let Some(mut guard) = InFlightGuard::acquire(&self.in_flight, tab_id) else {
            debug!(tab_id = %tab_id, "URL update already in progress, coalescing");
            return;
        };

        let mut pushed = self.push_tab_url(tab_id, None).await;
        while guard.rerun_or_release() {
            trace!(tab_id = %tab_id, "Re-checking tab after coalesced update");
            pushed = self.push_tab_url(tab_id, pushed.as_deref()).await;
        }
    }

    /// Pushes the tab's page into its context unless `last_pushed` already
    /// matches. Returns the URL the context now knows about.
    async fn push_tab_url(&self, tab_id: TabId, last_pushed: Option<&str>) -> Option<String> {
        self.manager
            .add_tab_context_if_not_exists(tab_id, self.factory.as_ref());

        let tab = match self.browser.get_tab(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                debug!(tab_id = %tab_id, error = %e, "Tab not found, skipping URL update");
                return last_pushed.map(str::to_string);
            }
        };

        let url = tab.url_or_empty().to_string();
        if last_pushed == Some(url.as_str()) {
            return Some(url);
        }

        let payload = match serde_json::to_value(&tab) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "Failed to serialize tab, skipping URL update");
                return last_pushed.map(str::to_string);
            }
        };
        self.send_to_tab(Message::for_tab(
            messages::tab::EXISTING_TAB_UPDATED,
            tab_id,
            payload,
        ));

        self.add_known_tab_id(tab_id, &url);
        Some(url)
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Marks the activated tab visible and its window siblings hidden.
    pub async fn on_tab_activated(&self, tab_id: TabId, window_id: WindowId) {
        self.send_visibility_change(tab_id, false);

        let tabs = match self.browser.tabs_query(TabQuery::in_window(window_id)).await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(window_id = %window_id, error = %e, "Failed to query window tabs");
                return;
            }
        };

        for tab in tabs.iter().filter(|t| !t.active) {
            self.send_visibility_change(tab.id, true);
        }
    }

    /// Marks every window's active tab hidden exactly when its window is
    /// minimized.
    pub async fn on_window_focus_changed(&self, window_id: Option<WindowId>) {
        trace!(window_id = ?window_id, "Window focus changed");

        let windows = match self.browser.get_all_windows(&VISIBILITY_WINDOW_TYPES).await {
            Ok(windows) => windows,
            Err(e) => {
                warn!(error = %e, "Failed to query windows");
                return;
            }
        };

        let queries = windows.iter().map(|window| async move {
            let hidden = window.state == WindowState::Minimized;
            match self
                .browser
                .tabs_query(TabQuery::active_in_window(window.id))
                .await
            {
                Ok(tabs) => tabs.into_iter().for_each(|t| self.send_visibility_change(t.id, hidden)),
                Err(e) => warn!(window_id = %window.id, error = %e, "Failed to query active tab"),
            }
        });
        join_all(queries).await;
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Handles a closed tab.
    ///
    /// Sends `Tab.Remove`, forgets the known id and deletes the context.
    /// If the tab hosted a details view, its target tab receives
    /// `DetailsView.Close`.
    pub async fn on_target_tab_removed(&self, tab_id: TabId) {
        if let Some(target) = self.details_view_controller.on_tab_removed(tab_id) {
            debug!(tab_id = %tab_id, target_tab = %target, "Details view tab closed");
            self.send_to_tab(Message::for_tab(messages::details_view::CLOSE, target, Value::Null));
        }

        self.send_to_tab(Message::for_tab(messages::tab::REMOVE, tab_id, Value::Null));
        self.remove_known_tab_id(tab_id);
        self.manager.delete_tab_context(tab_id).await;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn send_visibility_change(&self, tab_id: TabId, hidden: bool) {
        self.send_to_tab(Message::for_tab(
            messages::tab::VISIBILITY_CHANGE,
            tab_id,
            json!({ "hidden": hidden }),
        ));
    }

    /// Interprets a message in a tab's context, logging failures.
    ///
    /// Pending handler work is detached.
    fn send_to_tab(&self, message: Message) {
        let Some(tab_id) = message.tab_id else {
            return;
        };

        match self.manager.interpret_message_for_tab(tab_id, &message) {
            Ok(response) => {
                if let Some(pending) = response.into_result() {
                    let message_type = message.message_type.clone();
                    tokio::spawn(async move {
                        if let Err(e) = pending.await {
                            warn!(tab_id = %tab_id, message_type = %message_type, error = %e, "Tab handler failed");
                        }
                    });
                }
            }
            Err(e) => {
                warn!(
                    tab_id = %tab_id,
                    message_type = %message.message_type,
                    error = %e,
                    "Tab handler failed"
                );
            }
        }
    }

    fn add_known_tab_id(&self, tab_id: TabId, url: &str) {
        let snapshot = {
            let mut known = self.known_tabs.lock();
            if known.get(&tab_id).map(String::as_str) == Some(url) {
                return;
            }
            known.insert(tab_id, url.to_string());
            known.clone()
        };
        self.persist_known_tabs(&snapshot);
    }

    fn remove_known_tab_id(&self, tab_id: TabId) {
        let snapshot = {
            let mut known = self.known_tabs.lock();
            if known.remove(&tab_id).is_none() {
                return;
            }
            known.clone()
        };
        self.persist_known_tabs(&snapshot);
    }

    fn persist_known_tabs(&self, known: &BTreeMap<TabId, String>) {
        match serde_json::to_value(known) {
            Ok(value) => self.queue.set(keys::KNOWN_TAB_IDS, value),
            Err(e) => warn!(error = %e, "Failed to serialize known tab ids"),
        }
    }
}

// ============================================================================
// InFlightGuard
// ============================================================================

/// Marks a tab's URL update as in progress.
///
/// The map value records whether another update arrived meanwhile. The
/// entry is removed by [`rerun_or_release`](Self::rerun_or_release) or, if
/// the update is cancelled, on drop.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<FxHashMap<TabId, bool>>,
    tab_id: TabId,
    released: bool,
}

impl<'a> InFlightGuard<'a> {
    /// Claims the tab, or flags the running update to look again.
    fn acquire(in_flight: &'a Mutex<FxHashMap<TabId, bool>>, tab_id: TabId) -> Option<Self> {
        {
            let mut map = in_flight.lock();
            if let Some(rerun) = map.get_mut(&tab_id) {
                *rerun = true;
                return None;
            }
            map.insert(tab_id, false);
        }

        Some(Self {
            in_flight,
            tab_id,
            released: false,
        })
    }

    /// Returns `true` if an update arrived since the last check, otherwise
    /// releases the tab in the same critical section.
    fn rerun_or_release(&mut self) -> bool {
        let mut map = self.in_flight.lock();
        match map.get_mut(&self.tab_id) {
            Some(rerun) if *rerun => {
                *rerun = false;
                true
            }
            _ => {
                map.remove(&self.tab_id);
                self.released = true;
                false
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.in_flight.lock().remove(&self.tab_id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
