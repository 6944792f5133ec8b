//! Feature flag actions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flux::Action;
use crate::interpreter::Interpreter;
use crate::protocol::messages;

use super::decode_payload;

/// Payload of `insights/featureFlags/set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetFeatureFlagPayload {
    /// Flag name.
    pub feature: String,
    /// New value.
    pub enabled: bool,
}

/// Actions of the feature flag store.
#[derive(Debug, Default)]
pub struct FeatureFlagActions {
    /// Sets one flag.
    pub set_feature_flag: Action<SetFeatureFlagPayload>,
    /// Restores defaults.
    pub reset_feature_flags: Action<()>,
}

/// Registers feature flag message callbacks.
pub struct FeatureFlagActionCreator {
    actions: Arc<FeatureFlagActions>,
}

impl FeatureFlagActionCreator {
    /// Creates a creator invoking `actions`.
    #[must_use]
    pub fn new(actions: Arc<FeatureFlagActions>) -> Self {
        Self { actions }
    }

    /// Registers every feature flag message on the interpreter.
    pub fn register_callbacks(&self, interpreter: &Interpreter) {
        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(
            messages::feature_flags::SET,
            move |payload, _| {
                let set: SetFeatureFlagPayload =
                    decode_payload(messages::feature_flags::SET, payload)?;
                actions.set_feature_flag.invoke(&set);
                Ok(None)
            },
        );

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(messages::feature_flags::RESET, move |_, _| {
            actions.reset_feature_flags.invoke(&());
            Ok(None)
        });
    }
}
