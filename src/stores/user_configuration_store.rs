//! Global user configuration.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::actions::UserConfigurationActions;
use crate::flux::{StoreBacked, StoreCore, StoreName};
use crate::storage::{PersistenceQueue, keys};

// ============================================================================
// UserConfigurationStoreData
// ============================================================================

/// State of the user configuration store.
///
/// Missing persisted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfigurationStoreData {
    /// The user has not answered the telemetry prompt yet.
    pub is_first_time: bool,
    /// Telemetry opt-in.
    pub enable_telemetry: bool,
    /// High contrast mode.
    pub enable_high_contrast: bool,
    /// Issue filing service name.
    pub bug_service: String,
}

impl Default for UserConfigurationStoreData {
    fn default() -> Self {
        Self {
            is_first_time: true,
            enable_telemetry: false,
            enable_high_contrast: false,
            bug_service: "none".to_string(),
        }
    }
}

// ============================================================================
// UserConfigurationStore
// ============================================================================

/// Store of [`UserConfigurationStoreData`].
#[derive(Debug)]
pub struct UserConfigurationStore {
    core: StoreCore<UserConfigurationStoreData>,
}

impl StoreBacked for UserConfigurationStore {
    type State = UserConfigurationStoreData;

    fn core(&self) -> &StoreCore<UserConfigurationStoreData> {
        &self.core
    }
}

impl UserConfigurationStore {
    /// Creates the store from persisted state or defaults.
    #[must_use]
    pub fn new(
        actions: &UserConfigurationActions,
        persisted: Option<Value>,
        queue: PersistenceQueue,
    ) -> Arc<Self> {
        let initial: UserConfigurationStoreData = persisted
            .and_then(|value| {
                serde_json::from_value(value)
                    .inspect_err(|e| {
                        warn!(error = %e, "Ignoring undecodable persisted user configuration");
                    })
                    .ok()
            })
            .unwrap_or_default();

        let core = StoreCore::new(StoreName::UserConfigurationStore, initial)
            .with_persistence(keys::USER_CONFIGURATION, queue);
        let store = Arc::new(Self { core });

        let s = Arc::clone(&store);
        actions.set_telemetry_state.add_listener(move |enabled| {
            s.core.update(|state| {
                state.is_first_time = false;
                state.enable_telemetry = *enabled;
                true
            });
        });

        let s = Arc::clone(&store);
        actions.set_high_contrast_mode.add_listener(move |enabled| {
            s.core.update(|state| {
                state.enable_high_contrast = *enabled;
                true
            });
        });

        let s = Arc::clone(&store);
        actions.set_bug_service.add_listener(move |service| {
            s.core.update(|state| {
                state.bug_service = service.clone();
                true
            });
        });

        store
    }

    /// Returns a snapshot of the state.
    #[inline]
    #[must_use]
    pub fn get_state(&self) -> UserConfigurationStoreData {
        self.core.get_state()
    }
}

// ============================================================================
// Tests
// ============================================================================
