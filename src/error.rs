//! Error types for the background router.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tab_context_router::{Error, Result};
//!
//! async fn example(store: &dyn DataStore) -> Result<()> {
//!     store.set_item("knownTabIds", serde_json::json!({})).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::BrowserNotConnected`] |
//! | Protocol | [`Error::Protocol`], [`Error::InvalidPayload`] |
//! | Routing | [`Error::Handler`], [`Error::TabNotFound`] |
//! | Browser | [`Error::Browser`], [`Error::RequestTimeout`] |
//! | Storage | [`Error::Storage`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{RequestId, TabId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when background configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Which setting is wrong.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// A surface or shim connection could not be used.
    #[error("Connection failed: {message}")]
    Connection {
        /// What went wrong with the connection.
        message: String,
    },

    /// The browser shim or a surface did not connect or say hello in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// How long we waited, in milliseconds.
        timeout_ms: u64,
    },

    /// The peer went away mid-exchange.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No browser shim is connected to serve browser API requests.
    #[error("Browser shim not connected")]
    BrowserNotConnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// The offending frame or field.
        message: String,
    },

    /// Message payload does not match what the handler expects.
    #[error("Invalid payload for {message_type}: {message}")]
    InvalidPayload {
        /// Message type whose payload was rejected.
        message_type: String,
        /// Decoder error.
        message: String,
    },

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// A registered handler failed.
    ///
    /// Handlers are expected not to fail for expected conditions, so this
    /// usually indicates a defect.
    #[error("Handler for {message_type} failed: {message}")]
    Handler {
        /// Message type being handled.
        message_type: String,
        /// Failure description.
        message: String,
    },

    /// Tab not found.
    #[error("Tab not found: {tab_id}")]
    TabNotFound {
        /// Tab the browser does not know.
        tab_id: TabId,
    },

    // ========================================================================
    // Browser Errors
    // ========================================================================
    /// Browser API call failed.
    #[error("Browser API error: {message}")]
    Browser {
        /// Error reported by the browser shim.
        message: String,
    },

    /// Browser API request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Correlation id of the unanswered request.
        request_id: RequestId,
        /// Request timeout, in milliseconds.
        timeout_ms: u64,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Durable store read or write failed.
    #[error("Storage error for {key}: {message}")]
    Storage {
        /// Key being read or written.
        key: String,
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// File store or socket failure.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Envelope, frame or store state failed to (de)serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// A response channel was dropped before completing.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid payload error.
    #[inline]
    pub fn invalid_payload(message_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message_type: message_type.into(),
            message: message.into(),
        }
    }

    /// Creates a handler failure error.
    #[inline]
    pub fn handler(message_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            message_type: message_type.into(),
            message: message.into(),
        }
    }

    /// Creates a tab not found error.
    #[inline]
    pub fn tab_not_found(tab_id: TabId) -> Self {
        Self::TabNotFound { tab_id }
    }

    /// Creates a browser API error.
    #[inline]
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a storage error.
    #[inline]
    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` for connect and request timeouts.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the transport or shim connection is at fault.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::BrowserNotConnected
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came out of a message handler.
    #[inline]
    #[must_use]
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Self::Handler { .. } | Self::InvalidPayload { .. })
    }

    /// Returns `true` if retrying later may succeed.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::BrowserNotConnected
                | Self::Storage { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_storage_error_display() {
        let err = Error::storage("tabStore-7", "permission denied");
        assert_eq!(err.to_string(), "Storage error for tabStore-7: permission denied");
    }

    #[test]
    fn test_handler_error_display() {
        let err = Error::handler("insights/tab/update", "boom");
        assert_eq!(
            err.to_string(),
            "Handler for insights/tab/update failed: boom"
        );
        assert!(err.is_handler_error());
    }

    #[test]
    fn test_timeouts() {
        assert!(Error::connection_timeout(10_000).is_timeout());
        assert!(Error::request_timeout(RequestId::generate(), 30_000).is_timeout());
        assert!(!Error::BrowserNotConnected.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::BrowserNotConnected.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::storage("knownTabIds", "disk full").is_recoverable());
        assert!(!Error::config("test").is_recoverable());
    }

    #[test]
    fn test_io_and_json_conversions() {
        let err: Error = IoError::new(ErrorKind::PermissionDenied, "read-only").into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = serde_json::from_str::<Vec<u32>>("{").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
