//! Target tab actions.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flux::Action;
use crate::identifiers::TabId;
use crate::interpreter::Interpreter;
use crate::protocol::messages;

use super::decode_payload;

// ============================================================================
// Payloads
// ============================================================================

/// Tab description carried by tab update messages.
///
/// Extra browser fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPayload {
    /// Tab ID.
    #[serde(default)]
    pub id: Option<TabId>,
    /// Page URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,
}

/// Payload of `insights/targetTab/visibilitychange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChangePayload {
    /// Whether the page is hidden.
    pub hidden: bool,
}

// ============================================================================
// TabActions
// ============================================================================

/// Actions of the tab store.
#[derive(Debug, Default)]
pub struct TabActions {
    /// The tab got a context.
    pub new_tab_created: Action<TabPayload>,
    /// A tab with a context navigated.
    pub existing_tab_updated: Action<TabPayload>,
    /// A surface asked for the current state.
    pub get_current_state: Action<()>,
    /// The tab was closed.
    pub tab_remove: Action<()>,
    /// The page changed in place.
    pub tab_change: Action<TabPayload>,
    /// The page became hidden or visible.
    pub tab_visibility_change: Action<bool>,
}

// ============================================================================
// TabActionCreator
// ============================================================================

/// Registers tab message callbacks.
pub struct TabActionCreator {
    actions: Arc<TabActions>,
}

impl TabActionCreator {
    /// Creates a creator invoking `actions`.
    #[must_use]
    pub fn new(actions: Arc<TabActions>) -> Self {
        Self { actions }
    }

    /// Registers every tab message on the interpreter.
    pub fn register_callbacks(&self, interpreter: &Interpreter) {
        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(messages::tab::UPDATE, move |payload, _| {
            let tab: TabPayload = decode_payload(messages::tab::UPDATE, payload)?;
            actions.new_tab_created.invoke(&tab);
            Ok(None)
        });

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(
            messages::tab::EXISTING_TAB_UPDATED,
            move |payload, _| {
                let tab: TabPayload = decode_payload(messages::tab::EXISTING_TAB_UPDATED, payload)?;
                actions.existing_tab_updated.invoke(&tab);
                Ok(None)
            },
        );

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(messages::tab::GET_CURRENT, move |_, _| {
            actions.get_current_state.invoke(&());
            Ok(None)
        });

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(messages::tab::REMOVE, move |_, _| {
            actions.tab_remove.invoke(&());
            Ok(None)
        });

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(messages::tab::CHANGE, move |payload, _| {
            let tab: TabPayload = decode_payload(messages::tab::CHANGE, payload)?;
            actions.tab_change.invoke(&tab);
            Ok(None)
        });

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(
            messages::tab::VISIBILITY_CHANGE,
            move |payload, _| {
                let change: VisibilityChangePayload =
                    decode_payload(messages::tab::VISIBILITY_CHANGE, payload)?;
                actions.tab_visibility_change.invoke(&change.hidden);
                Ok(None)
            },
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
