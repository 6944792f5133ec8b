//! Details view actions.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::controller::DetailsViewController;
use crate::error::Error;
use crate::flux::Action;
use crate::identifiers::TabId;
use crate::interpreter::Interpreter;
use crate::protocol::messages;

use super::decode_payload;

// ============================================================================
// Payloads
// ============================================================================

/// Payload of `insights/details-view/open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsViewOpenPayload {
    /// Browser tab hosting the details view.
    pub details_view_tab_id: TabId,
}

// ============================================================================
// DetailsViewActions
// ============================================================================

/// Actions of the details view store.
#[derive(Debug, Default)]
pub struct DetailsViewActions {
    /// A details view was opened for this tab.
    pub open: Action<DetailsViewOpenPayload>,
    /// The details view of this tab was closed.
    pub close: Action<()>,
}

// ============================================================================
// DetailsViewActionCreator
// ============================================================================

/// Registers details view message callbacks.
pub struct DetailsViewActionCreator {
    actions: Arc<DetailsViewActions>,
    controller: Arc<DetailsViewController>,
}

impl DetailsViewActionCreator {
    /// Creates a creator invoking `actions` and recording opened views.
    #[must_use]
    pub fn new(actions: Arc<DetailsViewActions>, controller: Arc<DetailsViewController>) -> Self {
        Self {
            actions,
            controller,
        }
    }

    /// Registers every details view message on the interpreter.
    pub fn register_callbacks(&self, interpreter: &Interpreter) {
        let actions = Arc::clone(&self.actions);
        let controller = Arc::clone(&self.controller);
        interpreter.register_type_to_payload_callback(
            messages::details_view::OPEN,
            move |payload, tab_id| {
                let target_tab = tab_id.ok_or_else(|| {
                    Error::handler(messages::details_view::OPEN, "message has no tab id")
                })?;
                let open: DetailsViewOpenPayload =
                    decode_payload(messages::details_view::OPEN, payload)?;

                controller.set_details_view_tab(target_tab, open.details_view_tab_id);
                actions.open.invoke(&open);
                Ok(None)
            },
        );

        let actions = Arc::clone(&self.actions);
        interpreter.register_type_to_payload_callback(messages::details_view::CLOSE, move |_, _| {
            actions.close.invoke(&());
            Ok(None)
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
