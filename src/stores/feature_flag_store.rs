//! Global feature flags.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::actions::FeatureFlagActions;
use crate::flux::{StoreBacked, StoreCore, StoreName};
use crate::storage::{PersistenceQueue, keys};

/// Flag name to enabled.
pub type FeatureFlagStoreData = BTreeMap<String, bool>;

/// Flags and their default values.
pub const DEFAULT_FEATURE_FLAGS: [(&str, bool); 4] = [
    ("debugTools", false),
    ("logTelemetryToConsole", false),
    ("manualInstanceDetails", false),
    ("showAllFeatureFlags", false),
];

/// Returns the default flag values.
#[must_use]
pub fn default_feature_flags() -> FeatureFlagStoreData {
    DEFAULT_FEATURE_FLAGS
        .iter()
        .map(|(name, enabled)| ((*name).to_string(), *enabled))
        .collect()
}

/// Store of [`FeatureFlagStoreData`].
#[derive(Debug)]
pub struct FeatureFlagStore {
    core: StoreCore<FeatureFlagStoreData>,
}

impl StoreBacked for FeatureFlagStore {
    type State = FeatureFlagStoreData;

    fn core(&self) -> &StoreCore<FeatureFlagStoreData> {
        &self.core
    }
}

impl FeatureFlagStore {
    /// Creates the store from defaults overlaid with persisted values.
    #[must_use]
    pub fn new(
        actions: &FeatureFlagActions,
        persisted: Option<Value>,
        queue: PersistenceQueue,
    ) -> Arc<Self> {
        let mut initial = default_feature_flags();
        if let Some(value) = persisted {
            match serde_json::from_value::<FeatureFlagStoreData>(value) {
                Ok(saved) => initial.extend(saved),
                Err(e) => warn!(error = %e, "Ignoring undecodable persisted feature flags"),
            }
        }

        let core = StoreCore::new(StoreName::FeatureFlagStore, initial)
            .with_persistence(keys::FEATURE_FLAGS, queue);
        let store = Arc::new(Self { core });

        let s = Arc::clone(&store);
        actions.set_feature_flag.add_listener(move |set| {
            s.core.update(|flags| {
                let previous = flags.insert(set.feature.clone(), set.enabled);
                previous != Some(set.enabled)
            });
            debug!(feature = %set.feature, enabled = set.enabled, "Feature flag set");
        });

        let s = Arc::clone(&store);
        actions.reset_feature_flags.add_listener(move |_| {
            s.core.update(|flags| {
                *flags = default_feature_flags();
                true
            });
        });

        store
    }

    /// Returns a snapshot of the flags.
    #[inline]
    #[must_use]
    pub fn get_state(&self) -> FeatureFlagStoreData {
        self.core.get_state()
    }

    /// Returns `true` if a flag is enabled.
    #[must_use]
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.core.get_state().get(feature).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::actions::SetFeatureFlagPayload;

    #[test]
    fn test_persisted_overrides_defaults() {
        let actions = FeatureFlagActions::default();
        let store = FeatureFlagStore::new(
            &actions,
            Some(json!({"debugTools": true, "custom": true})),
            PersistenceQueue::disabled(),
        );

        assert!(store.is_enabled("debugTools"));
        assert!(store.is_enabled("custom"));
        assert!(!store.is_enabled("logTelemetryToConsole"));
    }

    #[test]
    fn test_set_and_reset() {
        let actions = FeatureFlagActions::default();
        let store = FeatureFlagStore::new(&actions, None, PersistenceQueue::disabled());

        actions.set_feature_flag.invoke(&SetFeatureFlagPayload {
            feature: "debugTools".into(),
            enabled: true,
        });
        assert!(store.is_enabled("debugTools"));

        actions.reset_feature_flags.invoke(&());
        assert_eq!(store.get_state(), default_feature_flags());
    }
}
