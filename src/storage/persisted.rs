//! Startup loading of persisted state.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use futures_util::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::TabId;

use super::{DataStore, keys};

// ============================================================================
// PersistedData
// ============================================================================

/// Per-tab store state read at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabSpecificPersistedData {
    /// Raw `tabStore-<id>` value.
    pub tab_store: Option<Value>,
    /// Raw `detailsViewStore-<id>` value.
    pub details_view_store: Option<Value>,
}

/// Everything read from the durable store at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedData {
    /// Tabs that had state, with their last known URL.
    pub known_tab_ids: BTreeMap<TabId, String>,
    /// Target tab to details view tab.
    pub tab_id_to_details_view_map: BTreeMap<TabId, TabId>,
    /// Raw feature flag store state.
    pub feature_flags: Option<Value>,
    /// Raw user configuration store state.
    pub user_configuration: Option<Value>,
    /// Per-tab store state for every known tab.
    pub tab_data: BTreeMap<TabId, TabSpecificPersistedData>,
}

impl PersistedData {
    /// Returns the persisted state for a tab, if any.
    #[must_use]
    pub fn tab(&self, tab_id: TabId) -> Option<&TabSpecificPersistedData> {
        self.tab_data.get(&tab_id)
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Reads all persisted state.
///
/// Per-tab keys are read for every id in `knownTabIds`. Values that do not
/// decode are logged and treated as absent.
///
/// # Errors
///
/// Returns the first storage read error.
pub async fn load_persisted_data(store: &dyn DataStore) -> Result<PersistedData> {
    let known_tab_ids: BTreeMap<TabId, String> =
        decode_or_default(keys::KNOWN_TAB_IDS, store.get_item(keys::KNOWN_TAB_IDS).await?);
    let tab_id_to_details_view_map: BTreeMap<TabId, TabId> = decode_or_default(
        keys::TAB_ID_TO_DETAILS_VIEW_MAP,
        store.get_item(keys::TAB_ID_TO_DETAILS_VIEW_MAP).await?,
    );
    let feature_flags = store.get_item(keys::FEATURE_FLAGS).await?;
    let user_configuration = store.get_item(keys::USER_CONFIGURATION).await?;

    let tab_loads = known_tab_ids.keys().map(|&tab_id| async move {
        let tab_store = store
            .get_item(&keys::tab_specific(keys::TAB_STORE, tab_id))
            .await?;
        let details_view_store = store
            .get_item(&keys::tab_specific(keys::DETAILS_VIEW_STORE, tab_id))
            .await?;
        Ok::<_, crate::Error>((
            tab_id,
            TabSpecificPersistedData {
                tab_store,
                details_view_store,
            },
        ))
    });
    let tab_data = try_join_all(tab_loads).await?.into_iter().collect();

    debug!(
        known_tabs = known_tab_ids.len(),
        details_views = tab_id_to_details_view_map.len(),
        "Persisted data loaded"
    );

    Ok(PersistedData {
        known_tab_ids,
        tab_id_to_details_view_map,
        feature_flags,
        user_configuration,
        tab_data,
    })
}

fn decode_or_default<T: DeserializeOwned + Default>(key: &str, value: Option<Value>) -> T {
    let Some(value) = value else {
        return T::default();
    };

    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(key, error = %e, "Discarding undecodable persisted value");
        T::default()
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::storage::MemoryDataStore;

    #[tokio::test]
    async fn test_load_empty() {
        let store = MemoryDataStore::new();
        let data = load_persisted_data(&store).await.expect("load");
        assert_eq!(data, PersistedData::default());
    }

    #[tokio::test]
    async fn test_load_known_tabs_with_tab_data() {
        let store = MemoryDataStore::with_items([
            ("knownTabIds", json!({"7": "https://a.test/", "9": "https://b.test/"})),
            ("tabIdToDetailsViewMap", json!({"7": 30})),
            ("tabStore-7", json!({"url": "https://a.test/"})),
            ("featureFlags", json!({"debugTools": true})),
        ]);

        let data = load_persisted_data(&store).await.expect("load");

        assert_eq!(data.known_tab_ids.len(), 2);
        assert_eq!(
            data.tab_id_to_details_view_map.get(&TabId::new(7)),
            Some(&TabId::new(30))
        );
        assert_eq!(data.feature_flags, Some(json!({"debugTools": true})));
        assert_eq!(data.user_configuration, None);

        let tab7 = data.tab(TabId::new(7)).expect("tab 7");
        assert_eq!(tab7.tab_store, Some(json!({"url": "https://a.test/"})));
        assert_eq!(tab7.details_view_store, None);
        assert!(data.tab(TabId::new(9)).is_some());
    }

    #[tokio::test]
    async fn test_corrupt_known_tabs_treated_as_empty() {
        let store = MemoryDataStore::with_items([("knownTabIds", json!(["not", "a", "map"]))]);
        let data = load_persisted_data(&store).await.expect("load");
        assert!(data.known_tab_ids.is_empty());
    }
}
