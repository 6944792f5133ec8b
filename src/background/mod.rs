//! Background lifecycle.
//!
//! | Type | Role |
//! |------|------|
//! | [`BackgroundBuilder`] | Validated configuration |
//! | [`Background`] | Owns contexts, controllers and the surface server |

// ============================================================================
// Submodules
// ============================================================================

mod config;
mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{BackgroundBuilder, BackgroundConfig, DEFAULT_BROWSER_CONNECT_TIMEOUT};
pub use core::Background;
