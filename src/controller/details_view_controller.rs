//! Details view bookkeeping.
//!
//! Tracks which browser tab hosts the details view of each target tab, so
//! that closing a details view tab can be reported to its target tab's
//! context. The mapping is persisted under `tabIdToDetailsViewMap`.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::identifiers::TabId;
use crate::storage::{PersistenceQueue, keys};

// ============================================================================
// DetailsViewController
// ============================================================================

/// Owner of the `targetTabId -> detailsViewTabId` map.
#[derive(Debug)]
pub struct DetailsViewController {
    tab_id_to_details_view: Mutex<BTreeMap<TabId, TabId>>,
    queue: PersistenceQueue,
}

impl DetailsViewController {
    /// Creates a controller from persisted state.
    #[must_use]
    pub fn new(initial: BTreeMap<TabId, TabId>, queue: PersistenceQueue) -> Self {
        Self {
            tab_id_to_details_view: Mutex::new(initial),
            queue,
        }
    }

    /// Records that `details_view_tab` shows the details view of `target_tab`.
    pub fn set_details_view_tab(&self, target_tab: TabId, details_view_tab: TabId) {
        let snapshot = {
            let mut map = self.tab_id_to_details_view.lock();
            if map.get(&target_tab) == Some(&details_view_tab) {
                return;
            }
            map.retain(|_, details| *details != details_view_tab);
            map.insert(target_tab, details_view_tab);
            map.clone()
        };

        debug!(target_tab = %target_tab, details_view_tab = %details_view_tab, "Details view registered");
        self.persist(&snapshot);
    }

    /// Returns the details view tab of a target tab.
    #[must_use]
    pub fn details_view_tab_for(&self, target_tab: TabId) -> Option<TabId> {
        self.tab_id_to_details_view.lock().get(&target_tab).copied()
    }

    /// Updates the map for a closed tab.
    ///
    /// Returns the target tab whose details view was closed, if the closed
    /// tab hosted one. A closed target tab just loses its entry.
    pub fn on_tab_removed(&self, removed_tab: TabId) -> Option<TabId> {
        let (target, snapshot) = {
            let mut map = self.tab_id_to_details_view.lock();
            let target = map
                .iter()
                .find(|(_, details)| **details == removed_tab)
                .map(|(target, _)| *target);

            let removed = match target {
                Some(target) => map.remove(&target).is_some(),
                None => map.remove(&removed_tab).is_some(),
            };
            if !removed {
                return None;
            }
            (target, map.clone())
        };

        self.persist(&snapshot);
        target
    }

    /// Returns a copy of the map.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<TabId, TabId> {
        self.tab_id_to_details_view.lock().clone()
    }

    fn persist(&self, map: &BTreeMap<TabId, TabId>) {
        match serde_json::to_value(map) {
            Ok(value) => self.queue.set(keys::TAB_ID_TO_DETAILS_VIEW_MAP, value),
            Err(e) => warn!(error = %e, "Failed to serialize details view map"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;

    use crate::storage::MemoryDataStore;

    #[test]
    fn test_closing_details_view_reports_target() {
        let controller = DetailsViewController::new(BTreeMap::new(), PersistenceQueue::disabled());
        controller.set_details_view_tab(TabId::new(1), TabId::new(50));

        assert_eq!(controller.on_tab_removed(TabId::new(50)), Some(TabId::new(1)));
        assert_eq!(controller.details_view_tab_for(TabId::new(1)), None);
        assert_eq!(controller.on_tab_removed(TabId::new(50)), None);
    }

    #[test]
    fn test_closing_target_drops_entry() {
        let controller = DetailsViewController::new(
            BTreeMap::from([(TabId::new(1), TabId::new(50))]),
            PersistenceQueue::disabled(),
        );

        assert_eq!(controller.on_tab_removed(TabId::new(1)), None);
        assert!(controller.snapshot().is_empty());
    }

    #[test]
    fn test_details_view_reused_for_new_target() {
        let controller = DetailsViewController::new(BTreeMap::new(), PersistenceQueue::disabled());
        controller.set_details_view_tab(TabId::new(1), TabId::new(50));
        controller.set_details_view_tab(TabId::new(2), TabId::new(50));

        assert_eq!(
            controller.snapshot(),
            BTreeMap::from([(TabId::new(2), TabId::new(50))])
        );
    }

    #[tokio::test]
    async fn test_map_is_persisted() {
        let store = Arc::new(MemoryDataStore::new());
        let queue = PersistenceQueue::spawn(store.clone());
        let controller = DetailsViewController::new(BTreeMap::new(), queue.clone());

        controller.set_details_view_tab(TabId::new(7), TabId::new(70));
        queue.flush().await;

        assert_eq!(store.peek("tabIdToDetailsViewMap"), Some(json!({"7": 70})));
    }
}
