//! Per-tab details view state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::DetailsViewActions;
use crate::flux::{StoreBacked, StoreCore, StoreName};
use crate::identifiers::TabId;
use crate::storage::PersistenceQueue;

/// State of the details view store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailsViewStoreData {
    /// A details view is open for this tab.
    pub is_open: bool,
    /// Browser tab hosting it.
    pub details_view_tab_id: Option<TabId>,
}

/// Store of [`DetailsViewStoreData`].
#[derive(Debug)]
pub struct DetailsViewStore {
    core: StoreCore<DetailsViewStoreData>,
}

impl StoreBacked for DetailsViewStore {
    type State = DetailsViewStoreData;

    fn core(&self) -> &StoreCore<DetailsViewStoreData> {
        &self.core
    }
}

impl DetailsViewStore {
    /// Creates a non-persistent store listening to `actions`.
    #[must_use]
    pub fn new(actions: &DetailsViewActions, initial: DetailsViewStoreData) -> Arc<Self> {
        Self::from_core(actions, StoreCore::new(StoreName::DetailsViewStore, initial))
    }

    /// Creates a store that persists under `key`.
    #[must_use]
    pub fn persistent(
        actions: &DetailsViewActions,
        initial: DetailsViewStoreData,
        key: String,
        queue: PersistenceQueue,
    ) -> Arc<Self> {
        let core = StoreCore::new(StoreName::DetailsViewStore, initial).with_persistence(key, queue);
        Self::from_core(actions, core)
    }

    /// Returns a snapshot of the state.
    #[inline]
    #[must_use]
    pub fn get_state(&self) -> DetailsViewStoreData {
        self.core.get_state()
    }

    fn from_core(actions: &DetailsViewActions, core: StoreCore<DetailsViewStoreData>) -> Arc<Self> {
        let store = Arc::new(Self { core });

        let s = Arc::clone(&store);
        actions.open.add_listener(move |open| {
            s.core.update(|state| {
                let next = Some(open.details_view_tab_id);
                if state.is_open && state.details_view_tab_id == next {
                    return false;
                }
                state.is_open = true;
                state.details_view_tab_id = next;
                true
            });
        });

        let s = Arc::clone(&store);
        actions.close.add_listener(move |_| {
            s.core.update(|state| {
                if !state.is_open {
                    return false;
                }
                state.is_open = false;
                state.details_view_tab_id = None;
                true
            });
        });

        store
    }
}
