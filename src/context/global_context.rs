//! Extension-wide context.
//!
//! One [`GlobalContext`] exists per background. Its interpreter sees every
//! routed message regardless of tab, and its stores broadcast to every
//! surface.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::actions::{
    FeatureFlagActionCreator, FeatureFlagActions, UserConfigurationActionCreator,
    UserConfigurationActions,
};
use crate::broadcast::{Broadcaster, StateDispatcher};
use crate::interpreter::Interpreter;
use crate::storage::{PersistedData, PersistenceQueue};
use crate::stores::{FeatureFlagStore, GlobalStoreHub, StoreHub, UserConfigurationStore};

// ============================================================================
// GlobalContext
// ============================================================================

/// Interpreter and stores scoped to the extension.
pub struct GlobalContext {
    interpreter: Interpreter,
    stores: GlobalStoreHub,
}

impl GlobalContext {
    /// Assembles a context.
    #[must_use]
    pub fn new(interpreter: Interpreter, stores: GlobalStoreHub) -> Self {
        Self {
            interpreter,
            stores,
        }
    }

    /// Returns the interpreter.
    #[inline]
    #[must_use]
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Returns the stores.
    #[inline]
    #[must_use]
    pub fn stores(&self) -> &GlobalStoreHub {
        &self.stores
    }
}

impl fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalContext")
            .field("interpreter", &self.interpreter)
            .finish()
    }
}

// ============================================================================
// GlobalContextFactory
// ============================================================================

/// Builds the global context.
pub struct GlobalContextFactory;

impl GlobalContextFactory {
    /// Builds the global context from persisted state.
    ///
    /// Every global store broadcasts its state once here and again after
    /// each change.
    #[must_use]
    pub fn create_global_context(
        broadcaster: Arc<Broadcaster>,
        persisted: &PersistedData,
        queue: PersistenceQueue,
    ) -> GlobalContext {
        let feature_flag_actions = Arc::new(FeatureFlagActions::default());
        let user_configuration_actions = Arc::new(UserConfigurationActions::default());

        let stores = GlobalStoreHub {
            feature_flag_store: FeatureFlagStore::new(
                &feature_flag_actions,
                persisted.feature_flags.clone(),
                queue.clone(),
            ),
            user_configuration_store: UserConfigurationStore::new(
                &user_configuration_actions,
                persisted.user_configuration.clone(),
                queue,
            ),
        };

        let interpreter = Interpreter::new();
        FeatureFlagActionCreator::new(feature_flag_actions).register_callbacks(&interpreter);
        UserConfigurationActionCreator::new(user_configuration_actions)
            .register_callbacks(&interpreter);

        let all_stores = stores.get_all_stores();
        let dispatcher = StateDispatcher::global(broadcaster);
        dispatcher.initialize(&all_stores);
        dispatcher.register_state_requests(&interpreter, &all_stores);

        debug!(handlers = interpreter.len(), "Global context created");

        GlobalContext::new(interpreter, stores)
    }
}

// ============================================================================
// Tests
// ============================================================================
