//! Browser-facing types and the browser API seam.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BrowserAdapter`] | Tab and window queries consumed by the lifecycle controller |
//! | [`SimulatedBrowserAdapter`] | In-memory browser for tests and offline runs |
//! | [`TabInfo`] / [`WindowInfo`] | Browser tab and window descriptions |
//! | [`TabQuery`] | Filter for `tabs.query` |
//!
//! # Example
//!
//! ```no_run
//! use tab_context_router::browser::{BrowserAdapter, SimulatedBrowserAdapter, TabInfo, TabQuery};
//! use tab_context_router::{Result, TabId, WindowId};
//!
//! # async fn example() -> Result<()> {
//! let browser = SimulatedBrowserAdapter::new();
//! browser.add_tab(TabInfo::new(TabId::new(1), WindowId::new(1), "https://example.com"));
//!
//! let tabs = browser.tabs_query(TabQuery::all()).await?;
//! assert_eq!(tabs.len(), 1);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Browser API trait.
pub mod adapter;

/// In-memory browser.
pub mod simulated;

/// Tab and window descriptions.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::BrowserAdapter;
pub use simulated::SimulatedBrowserAdapter;
pub use types::{TabInfo, TabQuery, WindowInfo, WindowState, WindowType};
