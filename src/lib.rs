//! Tab Context Router - per-tab message routing for an extension background.
//!
//! The background owns one global context and one context per inspected
//! browser tab. Messages from surfaces (popup, details view, content
//! scripts) are routed to the right contexts, and tab contexts follow the
//! lifecycle of their browser tabs.
//!
//! # Architecture
//!
//! - **Surfaces** connect over WebSocket and send [`Message`]s
//! - **Browser shim** answers [`protocol::BrowserCommand`]s and emits [`BrowserEvent`]s
//! - **Background (Rust)** routes messages, updates stores, pushes state
//!
//! Key design principles:
//!
//! - A tab context is created at most once per tab id and only by tab lifecycle handling
//! - Messages never create contexts; unknown tabs are not handled
//! - Store changes are broadcast as `insights/store/update` and persisted in order
//! - Event-driven; browser events are applied one at a time
//!
//! # Quick Start
//!
//! ```no_run
//! use tab_context_router::{Background, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Background::builder()
//!         .persist_store_data(true)
//!         .data_dir("./state")
//!         .port(9222)
//!         .build()?;
//!
//!     let background = Background::start(config).await?;
//!     println!("Tabs: {:?}", background.tab_context_manager().tab_ids());
//!
//!     background.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`actions`] | Action groups and message-to-action creators |
//! | [`background`] | [`Background`] lifecycle and configuration |
//! | [`broadcast`] | Store update delivery to surfaces |
//! | [`browser`] | Browser adapter trait and tab/window types |
//! | [`context`] | Global and per-tab contexts |
//! | [`controller`] | Tab lifecycle and details view bookkeeping |
//! | [`distributor`] | Message routing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`flux`] | Action and store primitives |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`interpreter`] | Message type to handler registry |
//! | [`protocol`] | Message and wire frame types |
//! | [`storage`] | Durable key-value persistence |
//! | [`stores`] | Global and per-tab stores |
//! | [`transport`] | WebSocket surface server |

// ============================================================================
// Modules
// ============================================================================

/// Action groups and their creators.
pub mod actions;

/// Background lifecycle.
///
/// Use [`Background::builder()`] to configure and [`Background::start`] to run.
pub mod background;

/// Store update broadcasting.
pub mod broadcast;

/// Browser adapter and tab/window types.
pub mod browser;

/// Global and per-tab contexts.
pub mod context;

/// Tab lifecycle controllers.
pub mod controller;

/// Message routing.
pub mod distributor;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Action and store primitives.
pub mod flux;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Message interpreter.
pub mod interpreter;

/// Message and wire protocol types.
pub mod protocol;

/// Persistence.
pub mod storage;

/// Store implementations.
pub mod stores;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Background types
pub use background::{Background, BackgroundBuilder, BackgroundConfig};

// Browser types
pub use browser::{BrowserAdapter, SimulatedBrowserAdapter, TabInfo, WindowInfo};

// Context types
pub use context::{GlobalContext, TabContext, TabContextManager};

// Controller types
pub use controller::{DetailsViewController, TargetPageController};

// Routing types
pub use distributor::{BackgroundMessageDistributor, RoutingOutcome};
pub use interpreter::{Interpreter, InterpreterResponse};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, FrameId, RequestId, TabId, WindowId};

// Protocol types
pub use protocol::{BrowserEvent, Message, Sender, SurfaceKind};
