//! User configuration actions.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flux::Action;
use crate::interpreter::Interpreter;
use crate::protocol::messages;

use super::decode_payload;

// ============================================================================
// Payloads
// ============================================================================

/// Payload of `insights/userConfig/setTelemetryConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTelemetryPayload {
    /// Whether telemetry is enabled.
    pub enable_telemetry: bool,
}

/// Payload of `insights/userConfig/setHighContrastConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetHighContrastPayload {
    /// Whether high contrast mode is enabled.
    pub enable_high_contrast: bool,
}

/// Payload of `insights/userConfig/setBugServiceConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBugServicePayload {
    /// Issue filing service name.
    pub bug_service_name: String,
}

// ============================================================================
// UserConfigurationActions
// ============================================================================

/// Actions of the user configuration store.
#[derive(Debug, Default)]
pub struct UserConfigurationActions {
    /// Telemetry opt-in changed.
    pub set_telemetry_state: Action<bool>,
    /// High contrast mode changed.
    pub set_high_contrast_mode: Action<bool>,
    /// Issue filing service changed.
    pub set_bug_service: Action<String>,
}

// ============================================================================
// UserConfigurationActionCreator
// ============================================================================

/// Registers user configuration message callbacks.
pub struct UserConfigurationActionCreator {
    actions: Arc<UserConfigurationActions>,
}

impl UserConfigurationActionCreator {
    /// Creates a creator invoking `actions`.
    #[must_use]
    pub fn new(actions: Arc<UserConfigurationActions>) -> Self {
        Self { actions }
    }

    /// Registers every user configuration message on the interpreter.
    pub fn register_callbacks(&self, interpreter: &Interpreter) {
        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(
            messages::user_config::SET_TELEMETRY_CONFIG,
            move |payload, _| {
                let set: SetTelemetryPayload =
                    decode_payload(messages::user_config::SET_TELEMETRY_CONFIG, payload)?;
                actions.set_telemetry_state.invoke(&set.enable_telemetry);
                Ok(None)
            },
        );

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(
            messages::user_config::SET_HIGH_CONTRAST_CONFIG,
            move |payload, _| {
                let set: SetHighContrastPayload =
                    decode_payload(messages::user_config::SET_HIGH_CONTRAST_CONFIG, payload)?;
                actions.set_high_contrast_mode.invoke(&set.enable_high_contrast);
                Ok(None)
            },
        );

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(
            messages::user_config::SET_BUG_SERVICE_CONFIG,
            move |payload, _| {
                let set: SetBugServicePayload =
                    decode_payload(messages::user_config::SET_BUG_SERVICE_CONFIG, payload)?;
                actions.set_bug_service.invoke(&set.bug_service_name);
                Ok(None)
            },
        );
    }
}
