//! Message type strings.
//!
//! | Group | Prefix |
//! |-------|--------|
//! | [`tab`] | `insights/tab/`, `insights/targetTab/` |
//! | [`details_view`] | `insights/details-view/` |
//! | [`feature_flags`] | `insights/featureFlags/` |
//! | [`user_config`] | `insights/userConfig/` |
//! | [`store`] | `insights/store/` |
//! | [`backchannel`] | `backchannel_window_message.` |

const PREFIX: &str = "insights";

/// Target tab lifecycle.
pub mod tab {
    /// A tab got a context for the first time.
    pub const UPDATE: &str = "insights/tab/update";
    /// A tab that already has a context changed URL.
    pub const EXISTING_TAB_UPDATED: &str = "insights/tab/existingTabUpdated";
    /// Request for the current tab state.
    pub const GET_CURRENT: &str = "insights/tab/current";
    /// The tab was closed.
    pub const REMOVE: &str = "insights/tab/remove";
    /// The tab's page changed in place.
    pub const CHANGE: &str = "insights/targetTab/changed";
    /// The tab became hidden or visible.
    pub const VISIBILITY_CHANGE: &str = "insights/targetTab/visibilitychange";
}

/// Details view page lifecycle.
pub mod details_view {
    /// A details view was opened for a target tab.
    pub const OPEN: &str = "insights/details-view/open";
    /// The details view for a target tab was closed.
    pub const CLOSE: &str = "insights/details-view/closed";
}

/// Feature flag changes.
pub mod feature_flags {
    /// Sets one flag.
    pub const SET: &str = "insights/featureFlags/set";
    /// Restores defaults.
    pub const RESET: &str = "insights/featureFlags/reset";
}

/// User configuration changes.
pub mod user_config {
    /// Enables or disables telemetry.
    pub const SET_TELEMETRY_CONFIG: &str = "insights/userConfig/setTelemetryConfig";
    /// Enables or disables high contrast mode.
    pub const SET_HIGH_CONTRAST_CONFIG: &str = "insights/userConfig/setHighContrastConfig";
    /// Selects the issue filing service.
    pub const SET_BUG_SERVICE_CONFIG: &str = "insights/userConfig/setBugServiceConfig";
}

/// Store state traffic.
pub mod store {
    /// Pushed to surfaces after every store change.
    pub const UPDATE: &str = "insights/store/update";
}

/// Legacy window `postMessage` content channel.
pub mod backchannel {
    /// Stores content for later retrieval.
    pub const STORE_REQUEST: &str = "backchannel_window_message.store_request";
    /// Retrieves stored content.
    pub const RETRIEVE_REQUEST: &str = "backchannel_window_message.retrieve_request";
    /// Answer to a retrieve request.
    pub const RETRIEVE_RESPONSE: &str = "backchannel_window_message.retrieve_response";
}

/// Returns the message type that asks a store for its current state.
///
/// Format: `insights/store/<StoreName>/state/current`
#[must_use]
pub fn store_state_request(store_name: &str) -> String {
    format!("{PREFIX}/store/{store_name}/state/current")
}

// ============================================================================
// Tests
// ============================================================================
