//! Inbound message routing.
//!
//! | Type | Role |
//! |------|------|
//! | [`BackgroundMessageDistributor`] | Fans each message out to every target |
//! | [`RoutingOutcome`] | Merged result of one routed message |
//! | [`PostMessageContentHandler`] | Legacy window message content store |

// ============================================================================
// Submodules
// ============================================================================

/// Legacy backchannel content handler.
pub mod backchannel;

/// Message fan-out.
pub mod background_message_distributor;

// ============================================================================
// Re-exports
// ============================================================================

pub use backchannel::{
    BackchannelHandler, BackchannelPayload, BackchannelResponse, DEFAULT_CONTENT_TTL,
    PostMessageContentHandler,
};
pub use background_message_distributor::{
    BackgroundMessageDistributor, PendingRouting, RoutingOutcome, resolve_tab_id,
};
