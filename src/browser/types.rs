//! Browser tab and window descriptions.
//!
//! These mirror the subset of the browser's `tabs.Tab` and
//! `windows.Window` shapes that the lifecycle controller reads.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{TabId, WindowId};

// ============================================================================
// TabInfo
// ============================================================================

/// A browser tab as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    /// Tab ID.
    pub id: TabId,
    /// Window that owns the tab.
    pub window_id: WindowId,
    /// Current URL, absent for tabs the extension may not inspect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Current title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether the tab is the active tab of its window.
    #[serde(default)]
    pub active: bool,
}

impl TabInfo {
    /// Creates a tab description.
    #[must_use]
    pub fn new(id: TabId, window_id: WindowId, url: impl Into<String>) -> Self {
        Self {
            id,
            window_id,
            url: Some(url.into()),
            title: None,
            active: false,
        }
    }

    /// Sets the title.
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Marks the tab active.
    #[inline]
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns the URL or an empty string.
    #[inline]
    #[must_use]
    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// WindowInfo
// ============================================================================

/// Window display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    /// Regular window.
    #[default]
    Normal,
    /// Minimized window.
    Minimized,
    /// Maximized window.
    Maximized,
    /// Fullscreen window.
    Fullscreen,
    /// Locked fullscreen (kiosk) window.
    #[serde(rename = "locked-fullscreen")]
    LockedFullscreen,
}

/// Window kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Regular browser window.
    #[default]
    Normal,
    /// Popup window.
    Popup,
    /// Panel window.
    Panel,
    /// App window.
    App,
    /// Developer tools window.
    Devtools,
}

/// A browser window as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    /// Window ID.
    pub id: WindowId,
    /// Display state.
    #[serde(default)]
    pub state: WindowState,
    /// Window kind.
    #[serde(rename = "type", default)]
    pub window_type: WindowType,
    /// Whether the window has focus.
    #[serde(default)]
    pub focused: bool,
}

impl WindowInfo {
    /// Creates a normal window description.
    #[must_use]
    pub fn new(id: WindowId) -> Self {
        Self {
            id,
            state: WindowState::Normal,
            window_type: WindowType::Normal,
            focused: false,
        }
    }

    /// Sets the display state.
    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: WindowState) -> Self {
        self.state = state;
        self
    }

    /// Sets the window kind.
    #[inline]
    #[must_use]
    pub fn with_type(mut self, window_type: WindowType) -> Self {
        self.window_type = window_type;
        self
    }

    /// Returns `true` if the window is minimized.
    #[inline]
    #[must_use]
    pub fn is_minimized(&self) -> bool {
        self.state == WindowState::Minimized
    }
}

// ============================================================================
// TabQuery
// ============================================================================

/// Filter for `tabs.query`.
///
/// An empty query matches every tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabQuery {
    /// Only tabs in this window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    /// Only tabs with this active flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl TabQuery {
    /// Matches every tab.
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches every tab of a window.
    #[inline]
    #[must_use]
    pub fn in_window(window_id: WindowId) -> Self {
        Self {
            window_id: Some(window_id),
            active: None,
        }
    }

    /// Matches the active tab of a window.
    #[inline]
    #[must_use]
    pub fn active_in_window(window_id: WindowId) -> Self {
        Self {
            window_id: Some(window_id),
            active: Some(true),
        }
    }

    /// Returns `true` if the tab passes this filter.
    #[must_use]
    pub fn matches(&self, tab: &TabInfo) -> bool {
        self.window_id.is_none_or(|w| w == tab.window_id)
            && self.active.is_none_or(|a| a == tab.active)
    }
}

// ============================================================================
// Tests
// ============================================================================
