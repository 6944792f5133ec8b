//! Message-type dispatch table.
//!
//! An [`Interpreter`] maps a message type to exactly one payload callback.
//! Each tab context and the global context own one.
//!
//! # Dispatch
//!
//! | Lookup | Result |
//! |--------|--------|
//! | Registered | Callback runs, [`InterpreterResponse::Handled`] |
//! | Unregistered | Nothing runs, [`InterpreterResponse::NotHandled`] |
//!
//! Callbacks run synchronously inside [`Interpreter::interpret`]. A callback
//! with asynchronous work returns it as a [`HandlerFuture`] which the caller
//! awaits.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::Message;

// ============================================================================
// Types
// ============================================================================

/// Pending asynchronous tail of a handler.
pub type HandlerFuture = BoxFuture<'static, Result<()>>;

/// Handler invoked with `(payload, tab_id)`.
pub type PayloadCallback =
    Arc<dyn Fn(Value, Option<TabId>) -> Result<Option<HandlerFuture>> + Send + Sync>;

// ============================================================================
// InterpreterResponse
// ============================================================================

/// Outcome of [`Interpreter::interpret`].
pub enum InterpreterResponse {
    /// No callback is registered for the message type.
    NotHandled,
    /// A callback ran.
    Handled {
        /// Asynchronous work the callback left behind.
        result: Option<HandlerFuture>,
    },
}

impl InterpreterResponse {
    /// Handled with nothing pending.
    #[inline]
    #[must_use]
    pub fn handled() -> Self {
        Self::Handled { result: None }
    }

    /// Returns `true` if a callback ran.
    #[inline]
    #[must_use]
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }

    /// Takes the pending result, if any.
    #[inline]
    #[must_use]
    pub fn into_result(self) -> Option<HandlerFuture> {
        match self {
            Self::Handled { result } => result,
            Self::NotHandled => None,
        }
    }
}

impl fmt::Debug for InterpreterResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotHandled => f.write_str("NotHandled"),
            Self::Handled { result } => f
                .debug_struct("Handled")
                .field("pending", &result.is_some())
                .finish(),
        }
    }
}

// ============================================================================
// Interpreter
// ============================================================================

/// Dispatch table from message type to payload callback.
///
/// Registration replaces any earlier callback for the same type.
#[derive(Default)]
pub struct Interpreter {
    callbacks: RwLock<FxHashMap<String, PayloadCallback>>,
}

impl Interpreter {
    /// Creates an empty interpreter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback for a message type.
    pub fn register_type_to_payload_callback<F>(&self, message_type: impl Into<String>, callback: F)
    where
        F: Fn(Value, Option<TabId>) -> Result<Option<HandlerFuture>> + Send + Sync + 'static,
    {
        let message_type = message_type.into();
        let previous = self
            .callbacks
            .write()
            .insert(message_type.clone(), Arc::new(callback));

        if previous.is_some() {
            debug!(message_type = %message_type, "Replaced payload callback");
        }
    }

    /// Dispatches a message to its callback.
    ///
    /// # Errors
    ///
    /// Returns whatever the callback returns synchronously.
    pub fn interpret(&self, message: &Message) -> Result<InterpreterResponse> {
        let callback = self.callbacks.read().get(&message.message_type).cloned();

        let Some(callback) = callback else {
            trace!(message_type = %message.message_type, "No payload callback");
            return Ok(InterpreterResponse::NotHandled);
        };

        let result = callback(message.payload.clone(), message.tab_id)?;
        Ok(InterpreterResponse::Handled { result })
    }

    /// Returns `true` if the message type has a callback.
    #[inline]
    #[must_use]
    pub fn is_registered(&self, message_type: &str) -> bool {
        self.callbacks.read().contains_key(message_type)
    }

    /// Returns the number of registered message types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("registered", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
