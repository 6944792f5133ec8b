//! Transport frames.
//!
//! Every WebSocket text message is one JSON frame tagged by `type`.
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `hello` | Surface → Background | Identifies the surface, first frame |
//! | `message` | Surface → Background | Routed message awaiting a reply |
//! | `event` | Shim → Background | Browser lifecycle event |
//! | `response` | Shim → Background | Answer to a browser API request |
//! | `reply` | Background → Surface | Routing result for a `message` |
//! | `request` | Background → Shim | Browser API request |
//! | `push` | Background → Surface | Store state update |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::{RequestId, TabId};

use super::{BrowserEvent, Message, Request, Response, SurfaceKind};

// ============================================================================
// InboundFrame
// ============================================================================

/// A frame received from a surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Handshake.
    Hello {
        /// Surface kind.
        surface: SurfaceKind,
        /// Tab hosting the surface.
        #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },

    /// A message to route.
    Message {
        /// Correlation id echoed in the reply.
        id: RequestId,
        /// The message.
        message: Message,
    },

    /// A browser lifecycle event.
    Event {
        /// The event.
        event: BrowserEvent,
    },

    /// A browser API response.
    Response(Response),
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// A frame sent to a surface.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Routing result.
    Reply {
        /// Id of the routed message.
        id: RequestId,
        /// Whether any handler took the message.
        handled: bool,
        /// Response value, if a handler produced one.
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },

    /// Browser API request.
    Request(Request),

    /// Store state update.
    Push {
        /// The pushed message.
        message: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::BrowserCommand;

    #[test]
    fn test_parse_hello() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type": "hello", "surface": "contentScript", "tabId": 5}"#)
                .expect("parse");
        assert!(matches!(
            frame,
            InboundFrame::Hello {
                surface: SurfaceKind::ContentScript,
                tab_id: Some(id)
            } if id == TabId::new(5)
        ));
    }

    #[test]
    fn test_parse_message() {
        let frame: InboundFrame = serde_json::from_value(json!({
            "type": "message",
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "message": {"messageType": "insights/tab/current"}
        }))
        .expect("parse");

        let InboundFrame::Message { message, .. } = frame else {
            panic!("expected message frame");
        };
        assert_eq!(message.message_type, "insights/tab/current");
    }

    #[test]
    fn test_parse_response() {
        let frame: InboundFrame = serde_json::from_value(json!({
            "type": "response",
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "result": []
        }))
        .expect("parse");
        assert!(matches!(frame, InboundFrame::Response(r) if r.is_success()));
    }

    #[test]
    fn test_serialize_request() {
        let request = Request::new(BrowserCommand::WindowsGetAll {
            window_types: Vec::new(),
        });
        let json = serde_json::to_value(OutboundFrame::Request(request)).expect("serialize");
        assert_eq!(json["type"], "request");
        assert_eq!(json["method"], "windows.getAll");
    }

    #[test]
    fn test_serialize_reply_without_response() {
        let id = RequestId::generate();
        let json = serde_json::to_value(OutboundFrame::Reply {
            id,
            handled: false,
            response: None,
        })
        .expect("serialize");
        assert_eq!(json, json!({"type": "reply", "id": id.to_string(), "handled": false}));
    }
}
