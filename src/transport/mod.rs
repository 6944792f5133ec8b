//! WebSocket transport layer.
//!
//! Extension surfaces and the browser shim talk to the background over
//! WebSocket, one JSON frame per text message.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Background     │                              │  Extension      │
//! │  (Rust)         │         WebSocket            │  surfaces       │
//! │  SurfaceServer  │◄────────────────────────────►│  + browser shim │
//! │  → Connection   │      localhost:PORT          │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `SurfaceServer::bind` - Bind and start accepting
//! 2. Surface connects and sends `hello`
//! 3. `SurfaceConnection` - Frames flow both ways
//! 4. Socket closes, the surface is unregistered
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `server` | Accept loop, surface registry, routing and pushes |
//! | `remote_adapter` | Browser API calls through the shim |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Browser adapter over the shim connection.
pub mod remote_adapter;

/// Surface WebSocket server.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::SurfaceConnection;
pub use remote_adapter::RemoteBrowserAdapter;
pub use server::{DEFAULT_BIND_IP, MessageHandler, SurfaceServer};
