//! Actions and stores.
//!
//! Handlers invoke [`Action`]s; stores listen to actions, mutate their
//! state and emit payload-free change notifications.
//!
//! ```text
//! message → handler → Action::invoke → store listener → update → changed
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Multi-listener invocation point.
pub mod action;

/// Store core and traits.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{Action, ActionListener};
pub use store::{ChangedListener, Store, StoreBacked, StoreCore, StoreName, StoreType};
