//! Durable state.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `data_store` | [`DataStore`] trait with memory and file backends |
//! | `keys` | Persisted key names |
//! | `persisted` | Startup loading into [`PersistedData`] |
//! | `queue` | Ordered fire-and-forget [`PersistenceQueue`] |

// ============================================================================
// Submodules
// ============================================================================

/// Key-value store trait and backends.
pub mod data_store;

/// Persisted key names.
pub mod keys;

/// Startup loading.
pub mod persisted;

/// Ordered write queue.
pub mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use data_store::{DataStore, FileDataStore, MemoryDataStore};
pub use persisted::{PersistedData, TabSpecificPersistedData, load_persisted_data};
pub use queue::PersistenceQueue;
