//! Browser-driven controllers.
//!
//! | Controller | Role |
//! |------------|------|
//! | [`TargetPageController`] | Tab context lifecycle from browser events |
//! | [`DetailsViewController`] | Target tab to details view tab bookkeeping |

// ============================================================================
// Submodules
// ============================================================================

/// Details view bookkeeping.
pub mod details_view_controller;

/// Tab lifecycle controller.
pub mod target_page_controller;

// ============================================================================
// Re-exports
// ============================================================================

pub use details_view_controller::DetailsViewController;
pub use target_page_controller::TargetPageController;
