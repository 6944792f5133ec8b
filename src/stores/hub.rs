//! Store groups.
//!
//! | Hub | Stores |
//! |-----|--------|
//! | [`TabContextStoreHub`] | [`TabStore`], [`DetailsViewStore`] |
//! | [`GlobalStoreHub`] | [`FeatureFlagStore`], [`UserConfigurationStore`] |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};

use crate::flux::{Store, StoreName};

use super::{DetailsViewStore, FeatureFlagStore, TabStore, UserConfigurationStore};

// ============================================================================
// StoreHub
// ============================================================================

/// A fixed group of stores.
pub trait StoreHub: Send + Sync {
    /// Returns every store of the hub.
    fn get_all_stores(&self) -> Vec<Arc<dyn Store>>;

    /// Returns one store by name.
    fn get_store(&self, name: StoreName) -> Option<Arc<dyn Store>> {
        self.get_all_stores().into_iter().find(|s| s.name() == name)
    }

    /// Tears down every store.
    ///
    /// Teardown work is scheduled before this returns; the future waits
    /// for it to finish.
    fn teardown(&self) -> BoxFuture<'static, ()> {
        let pending: Vec<_> = self.get_all_stores().iter().map(|s| s.teardown()).collect();
        join_all(pending).map(|_| ()).boxed()
    }
}

// ============================================================================
// TabContextStoreHub
// ============================================================================

/// Stores of one tab context.
#[derive(Debug, Clone)]
pub struct TabContextStoreHub {
    /// Page state.
    pub tab_store: Arc<TabStore>,
    /// Details view state.
    pub details_view_store: Arc<DetailsViewStore>,
}

impl StoreHub for TabContextStoreHub {
    fn get_all_stores(&self) -> Vec<Arc<dyn Store>> {
        vec![
            Arc::clone(&self.tab_store) as Arc<dyn Store>,
            Arc::clone(&self.details_view_store) as Arc<dyn Store>,
        ]
    }
}

// ============================================================================
// GlobalStoreHub
// ============================================================================

/// Stores of the global context.
#[derive(Debug, Clone)]
pub struct GlobalStoreHub {
    /// Feature flags.
    pub feature_flag_store: Arc<FeatureFlagStore>,
    /// User configuration.
    pub user_configuration_store: Arc<UserConfigurationStore>,
}

impl StoreHub for GlobalStoreHub {
    fn get_all_stores(&self) -> Vec<Arc<dyn Store>> {
        vec![
            Arc::clone(&self.feature_flag_store) as Arc<dyn Store>,
            Arc::clone(&self.user_configuration_store) as Arc<dyn Store>,
        ]
    }
}

// ============================================================================
// Tests
// ============================================================================
