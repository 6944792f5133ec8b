//! Concrete stores and store hubs.
//!
//! | Store | Scope | Persisted key |
//! |-------|-------|---------------|
//! | [`TabStore`] | Tab | `tabStore-<tabId>` |
//! | [`DetailsViewStore`] | Tab | `detailsViewStore-<tabId>` |
//! | [`FeatureFlagStore`] | Global | `featureFlags` |
//! | [`UserConfigurationStore`] | Global | `userConfiguration` |

// ============================================================================
// Submodules
// ============================================================================

/// Details view store.
pub mod details_view_store;

/// Feature flag store.
pub mod feature_flag_store;

/// Store hubs.
pub mod hub;

/// Tab store.
pub mod tab_store;

/// User configuration store.
pub mod user_configuration_store;

// ============================================================================
// Re-exports
// ============================================================================

pub use details_view_store::{DetailsViewStore, DetailsViewStoreData};
pub use feature_flag_store::{FeatureFlagStore, FeatureFlagStoreData, default_feature_flags};
pub use hub::{GlobalStoreHub, StoreHub, TabContextStoreHub};
pub use tab_store::{TabStore, TabStoreData};
pub use user_configuration_store::{UserConfigurationStore, UserConfigurationStoreData};
