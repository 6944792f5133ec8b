//! Legacy window `postMessage` content channel.
//!
//! Content scripts cannot pass large payloads through window messages, so
//! the sending frame stores the payload here and the receiving frame
//! retrieves it by id.
//!
//! | Message type | Payload | Response |
//! |--------------|---------|----------|
//! | `backchannel_window_message.store_request` | `{messageId, stringifiedMessageData}` | none |
//! | `backchannel_window_message.retrieve_request` | `{messageId}` | `retrieve_response` with the data |
//!
//! Stored content is returned at most once and expires after
//! [`DEFAULT_CONTENT_TTL`] if nobody retrieves it.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::protocol::{Message, messages};

// ============================================================================
// Constants
// ============================================================================

/// How long stored content waits for its retrieve request.
///
/// Matches how long a frame waits for a response before giving up.
pub const DEFAULT_CONTENT_TTL: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

/// Result of offering a message to the backchannel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackchannelResponse {
    /// Whether the message was a backchannel message.
    pub success: bool,
    /// Value to return to the sender.
    pub response: Option<Value>,
}

impl BackchannelResponse {
    /// The message was not a backchannel message.
    #[inline]
    #[must_use]
    pub fn declined() -> Self {
        Self::default()
    }
}

/// Side channel consulted for every routed message.
pub trait BackchannelHandler: Send + Sync {
    /// Handles the message if it belongs to the backchannel.
    fn handle_message(&self, message: &Message) -> BackchannelResponse;
}

/// Payload of store and retrieve requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackchannelPayload {
    /// Correlation id chosen by the sending frame.
    pub message_id: String,
    /// Opaque content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stringified_message_data: Option<String>,
}

/// Retrieve response pushed back to the requesting frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse<'a> {
    message_id: &'a str,
    message_type: &'static str,
    stringified_message_data: String,
}

// ============================================================================
// PostMessageContentHandler
// ============================================================================

#[derive(Debug)]
struct StoredContent {
    data: String,
    stored_at: Instant,
}

/// In-memory backchannel keyed by message id.
#[derive(Debug)]
pub struct PostMessageContentHandler {
    content: Mutex<FxHashMap<String, StoredContent>>,
    ttl: Duration,
}

impl Default for PostMessageContentHandler {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_CONTENT_TTL)
    }
}

impl PostMessageContentHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty handler whose entries expire after `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            content: Mutex::new(FxHashMap::default()),
            ttl,
        }
    }

    /// Returns the number of stored, unretrieved, unexpired entries.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut content = self.content.lock();
        self.evict_expired(&mut content);
        content.len()
    }

    fn evict_expired(&self, content: &mut FxHashMap<String, StoredContent>) {
        let before = content.len();
        content.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        let evicted = before - content.len();
        if evicted > 0 {
            debug!(evicted, "Expired backchannel content dropped");
        }
    }

    fn decode(message: &Message) -> Option<BackchannelPayload> {
        serde_json::from_value(message.payload.clone())
            .inspect_err(|e| {
                debug!(message_type = %message.message_type, error = %e, "Malformed backchannel payload");
            })
            .ok()
    }
}

impl BackchannelHandler for PostMessageContentHandler {
    fn handle_message(&self, message: &Message) -> BackchannelResponse {
        match message.message_type.as_str() {
            messages::backchannel::STORE_REQUEST => {
                let Some(payload) = Self::decode(message) else {
                    return BackchannelResponse::declined();
                };
                let data = payload.stringified_message_data.unwrap_or_default();
                trace!(message_id = %payload.message_id, "Backchannel content stored");
                let mut content = self.content.lock();
                self.evict_expired(&mut content);
                content.insert(
                    payload.message_id,
                    StoredContent {
                        data,
                        stored_at: Instant::now(),
                    },
                );
                BackchannelResponse {
                    success: true,
                    response: None,
                }
            }
            messages::backchannel::RETRIEVE_REQUEST => {
                let Some(payload) = Self::decode(message) else {
                    return BackchannelResponse::declined();
                };
                let stored = {
                    let mut content = self.content.lock();
                    self.evict_expired(&mut content);
                    content.remove(&payload.message_id)
                };
                let Some(StoredContent { data, .. }) = stored else {
                    debug!(message_id = %payload.message_id, "No backchannel content to retrieve");
                    return BackchannelResponse::declined();
                };

                let response = RetrieveResponse {
                    message_id: &payload.message_id,
                    message_type: messages::backchannel::RETRIEVE_RESPONSE,
                    stringified_message_data: data,
                };
                BackchannelResponse {
                    success: true,
                    response: serde_json::to_value(response).ok(),
                }
            }
            _ => BackchannelResponse::declined(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn store(id: &str, data: &str) -> Message {
        Message::new(messages::backchannel::STORE_REQUEST)
            .with_payload(json!({"messageId": id, "stringifiedMessageData": data}))
    }

    fn retrieve(id: &str) -> Message {
        Message::new(messages::backchannel::RETRIEVE_REQUEST).with_payload(json!({"messageId": id}))
    }

    #[test]
    fn test_store_then_retrieve_once() {
        let handler = PostMessageContentHandler::new();

        let stored = handler.handle_message(&store("m1", "{\"a\":1}"));
        assert!(stored.success);
        assert!(stored.response.is_none());

        let retrieved = handler.handle_message(&retrieve("m1"));
        assert!(retrieved.success);
        assert_eq!(
            retrieved.response,
            Some(json!({
                "messageId": "m1",
                "messageType": messages::backchannel::RETRIEVE_RESPONSE,
                "stringifiedMessageData": "{\"a\":1}",
            }))
        );

        assert!(!handler.handle_message(&retrieve("m1")).success);
        assert_eq!(handler.pending(), 0);
    }

    #[test]
    fn test_unretrieved_content_expires() {
        let handler = PostMessageContentHandler::with_ttl(Duration::from_millis(20));

        handler.handle_message(&store("stale", "x"));
        assert_eq!(handler.pending(), 1);

        std::thread::sleep(Duration::from_millis(40));
        handler.handle_message(&store("fresh", "y"));

        assert_eq!(handler.pending(), 1);
        assert!(!handler.handle_message(&retrieve("stale")).success);
        assert!(handler.handle_message(&retrieve("fresh")).success);
    }

    #[test]
    fn test_other_messages_declined() {
        let handler = PostMessageContentHandler::new();

        assert_eq!(
            handler.handle_message(&Message::new(messages::tab::UPDATE)),
            BackchannelResponse::declined()
        );
        assert!(
            !handler
                .handle_message(&Message::new(messages::backchannel::STORE_REQUEST))
                .success
        );
    }
}
