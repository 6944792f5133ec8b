//! Message envelope and sender description.
//!
//! Every surface talks to the background through the same envelope:
//!
//! ```json
//! {
//!   "messageType": "insights/tab/update",
//!   "payload": { ... },
//!   "tabId": 7
//! }
//! ```
//!
//! The payload is opaque to routing; only the message type and the tab id
//! decide where the message goes.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::TabId;

// ============================================================================
// Message
// ============================================================================

/// A routed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message type, the routing key.
    pub message_type: String,

    /// Opaque payload handed to the handler.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,

    /// Owning tab, resolved during routing when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
}

impl Message {
    /// Creates a message with no payload and no tab.
    #[inline]
    #[must_use]
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            payload: Value::Null,
            tab_id: None,
        }
    }

    /// Sets the payload.
    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the owning tab.
    #[inline]
    #[must_use]
    pub fn with_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    /// Creates a message addressed to a tab.
    #[inline]
    #[must_use]
    pub fn for_tab(message_type: impl Into<String>, tab_id: TabId, payload: Value) -> Self {
        Self::new(message_type).with_payload(payload).with_tab(tab_id)
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Kind of surface a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfaceKind {
    /// Script injected into a target page.
    ContentScript,
    /// The details view extension page.
    DetailsView,
    /// The toolbar popup.
    Popup,
    /// The dev tools panel.
    DevTools,
    /// Browser API shim.
    Browser,
    /// Any other extension page.
    #[serde(other)]
    Other,
}

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender {
    /// Surface kind.
    pub surface: SurfaceKind,
    /// Tab hosting the surface, if any.
    pub tab_id: Option<TabId>,
}

impl Sender {
    /// Creates a sender description.
    #[inline]
    #[must_use]
    pub const fn new(surface: SurfaceKind, tab_id: Option<TabId>) -> Self {
        Self { surface, tab_id }
    }

    /// A content script running in the given tab.
    #[inline]
    #[must_use]
    pub const fn content_script(tab_id: TabId) -> Self {
        Self::new(SurfaceKind::ContentScript, Some(tab_id))
    }

    /// Returns `true` for content scripts.
    #[inline]
    #[must_use]
    pub fn is_content_script(&self) -> bool {
        self.surface == SurfaceKind::ContentScript
    }
}

// ============================================================================
// Tests
// ============================================================================
