//! Browser API seam.
//!
//! The lifecycle controller reads tabs and windows through
//! [`BrowserAdapter`]. Production wiring uses the transport-backed
//! [`RemoteBrowserAdapter`](crate::transport::RemoteBrowserAdapter); tests
//! use [`SimulatedBrowserAdapter`](super::SimulatedBrowserAdapter).

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::TabId;

use super::types::{TabInfo, TabQuery, WindowInfo, WindowType};

// ============================================================================
// BrowserAdapter
// ============================================================================

/// Read access to browser tabs and windows.
#[async_trait]
pub trait BrowserAdapter: Send + Sync {
    /// Returns every tab matching the query.
    async fn tabs_query(&self, query: TabQuery) -> Result<Vec<TabInfo>>;

    /// Returns a single tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TabNotFound`](crate::Error::TabNotFound) if the tab
    /// does not exist.
    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo>;

    /// Returns every window of the given kinds.
    async fn get_all_windows(&self, window_types: &[WindowType]) -> Result<Vec<WindowInfo>>;
}
