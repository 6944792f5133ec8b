//! Execution contexts.
//!
//! | Type | Scope |
//! |------|-------|
//! | [`GlobalContext`] | Extension-wide interpreter and stores |
//! | [`TabContext`] | Interpreter and stores of one tab |
//! | [`TabContextManager`] | Owner of all tab contexts |
//! | [`TabContextFactory`] | Builds wired tab contexts |

// ============================================================================
// Submodules
// ============================================================================

/// Global context and its factory.
pub mod global_context;

/// Tab context.
pub mod tab_context;

/// Tab context construction.
pub mod tab_context_factory;

/// Tab context ownership.
pub mod tab_context_manager;

// ============================================================================
// Re-exports
// ============================================================================

pub use global_context::{GlobalContext, GlobalContextFactory};
pub use tab_context::TabContext;
pub use tab_context_factory::{TabContextCreator, TabContextFactory};
pub use tab_context_manager::TabContextManager;
