//! Browser lifecycle events.
//!
//! Events are emitted by the browser shim and drive the tab lifecycle
//! controller.
//!
//! # Format
//!
//! ```json
//! {
//!   "method": "tabs.onRemoved",
//!   "params": { "tabId": 7 }
//! }
//! ```
//!
//! | Method | Meaning |
//! |--------|---------|
//! | `webNavigation.onCommitted` | A frame committed a navigation |
//! | `tabs.onUpdated` | Tab properties changed |
//! | `tabs.onActivated` | A tab became the active tab of its window |
//! | `tabs.onRemoved` | A tab was closed |
//! | `windows.onFocusChanged` | Window focus moved |
//! | `runtime.onConnect` | A port connected |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{FrameId, TabId, WindowId};

// ============================================================================
// TabChangeInfo
// ============================================================================

/// Changed tab properties reported by `tabs.onUpdated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChangeInfo {
    /// New URL, present only when the URL changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Loading status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ============================================================================
// BrowserEvent
// ============================================================================

/// A browser lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserEvent {
    /// A frame committed a navigation.
    #[serde(rename = "webNavigation.onCommitted", rename_all = "camelCase")]
    WebNavigationUpdated {
        /// Tab that navigated.
        tab_id: TabId,
        /// Frame that navigated.
        #[serde(default)]
        frame_id: FrameId,
        /// New URL.
        #[serde(default)]
        url: String,
    },

    /// Tab properties changed.
    #[serde(rename = "tabs.onUpdated", rename_all = "camelCase")]
    TabUpdated {
        /// Tab that changed.
        tab_id: TabId,
        /// What changed.
        #[serde(default)]
        change_info: TabChangeInfo,
    },

    /// A tab became the active tab of its window.
    #[serde(rename = "tabs.onActivated", rename_all = "camelCase")]
    TabActivated {
        /// Newly active tab.
        tab_id: TabId,
        /// Its window.
        window_id: WindowId,
    },

    /// A tab was closed.
    #[serde(rename = "tabs.onRemoved", rename_all = "camelCase")]
    TabRemoved {
        /// Closed tab.
        tab_id: TabId,
    },

    /// Window focus changed.
    #[serde(rename = "windows.onFocusChanged", rename_all = "camelCase")]
    WindowFocusChanged {
        /// Focused window, absent when focus left the browser.
        #[serde(default)]
        window_id: Option<WindowId>,
    },

    /// A port connected. Used by content scripts to detect reloads.
    #[serde(rename = "runtime.onConnect")]
    Connect,
}

impl BrowserEvent {
    /// Returns the event method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::WebNavigationUpdated { .. } => "webNavigation.onCommitted",
            Self::TabUpdated { .. } => "tabs.onUpdated",
            Self::TabActivated { .. } => "tabs.onActivated",
            Self::TabRemoved { .. } => "tabs.onRemoved",
            Self::WindowFocusChanged { .. } => "windows.onFocusChanged",
            Self::Connect => "runtime.onConnect",
        }
    }

    /// Returns the tab the event is about, if any.
    #[must_use]
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            Self::WebNavigationUpdated { tab_id, .. }
            | Self::TabUpdated { tab_id, .. }
            | Self::TabActivated { tab_id, .. }
            | Self::TabRemoved { tab_id } => Some(*tab_id),
            Self::WindowFocusChanged { .. } | Self::Connect => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
