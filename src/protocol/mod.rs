//! Message envelopes and wire types.
//!
//! This module defines the routed message envelope shared by every
//! surface, the browser API request/response types, browser lifecycle
//! events and the transport frames that carry them.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Message`] | Surface → Background | Routed business message |
//! | [`Request`] | Background → Shim | Browser API call |
//! | [`Response`] | Shim → Background | Browser API result |
//! | [`BrowserEvent`] | Shim → Background | Tab and window lifecycle |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Browser API commands |
//! | `event` | Browser lifecycle events |
//! | `frame` | Transport frames |
//! | `message` | Message envelope and sender |
//! | `messages` | Message type strings |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Browser API commands.
pub mod command;

/// Browser lifecycle events.
pub mod event;

/// Transport frames.
pub mod frame;

/// Message envelope and sender.
pub mod message;

/// Message type strings.
pub mod messages;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::BrowserCommand;
pub use event::{BrowserEvent, TabChangeInfo};
pub use frame::{InboundFrame, OutboundFrame};
pub use message::{Message, Sender, SurfaceKind};
pub use request::{Request, Response};
