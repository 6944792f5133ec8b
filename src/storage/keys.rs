//! Persisted key names.

use crate::identifiers::TabId;

/// Persisted `tabId -> url` of tabs with state.
pub const KNOWN_TAB_IDS: &str = "knownTabIds";

/// Persisted `targetTabId -> detailsViewTabId`.
pub const TAB_ID_TO_DETAILS_VIEW_MAP: &str = "tabIdToDetailsViewMap";

/// Feature flag store state.
pub const FEATURE_FLAGS: &str = "featureFlags";

/// User configuration store state.
pub const USER_CONFIGURATION: &str = "userConfiguration";

/// Tab store state prefix.
pub const TAB_STORE: &str = "tabStore";

/// Details view store state prefix.
pub const DETAILS_VIEW_STORE: &str = "detailsViewStore";

/// Prefixes of every per-tab key.
pub const TAB_SPECIFIC_PREFIXES: [&str; 2] = [TAB_STORE, DETAILS_VIEW_STORE];

/// Returns the per-tab key for a prefix: `<prefix>-<tabId>`.
#[must_use]
pub fn tab_specific(prefix: &str, tab_id: TabId) -> String {
    format!("{prefix}-{tab_id}")
}
