//! Action groups and the callbacks that feed them.
//!
//! Each group pairs an actions struct with a creator that registers one
//! payload callback per message type. Callbacks decode the payload and
//! invoke the matching action; a payload that does not decode is rejected
//! with [`Error::InvalidPayload`](crate::Error::InvalidPayload).
//!
//! | Group | Scope | Message prefix |
//! |-------|-------|----------------|
//! | [`tab`] | Tab context | `insights/tab/`, `insights/targetTab/` |
//! | [`details_view`] | Tab context | `insights/details-view/` |
//! | [`feature_flags`] | Global | `insights/featureFlags/` |
//! | [`user_configuration`] | Global | `insights/userConfig/` |

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Submodules
// ============================================================================

/// Details view actions.
pub mod details_view;

/// Feature flag actions.
pub mod feature_flags;

/// Target tab actions.
pub mod tab;

/// User configuration actions.
pub mod user_configuration;

// ============================================================================
// Re-exports
// ============================================================================

pub use details_view::{DetailsViewActionCreator, DetailsViewActions, DetailsViewOpenPayload};
pub use feature_flags::{FeatureFlagActionCreator, FeatureFlagActions, SetFeatureFlagPayload};
pub use tab::{TabActionCreator, TabActions, TabPayload, VisibilityChangePayload};
pub use user_configuration::{
    SetBugServicePayload, SetHighContrastPayload, SetTelemetryPayload,
    UserConfigurationActionCreator, UserConfigurationActions,
};

// ============================================================================
// Payload Decoding
// ============================================================================

/// Decodes a message payload.
pub(crate) fn decode_payload<T: DeserializeOwned>(message_type: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| Error::invalid_payload(message_type, e.to_string()))
}
