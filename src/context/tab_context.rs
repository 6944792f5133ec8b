//! Execution context of one tab.

use std::fmt;

use futures_util::future::BoxFuture;

use crate::identifiers::TabId;
use crate::interpreter::Interpreter;
use crate::stores::{StoreHub, TabContextStoreHub};

/// One interpreter and one store hub, created and torn down together.
pub struct TabContext {
    tab_id: TabId,
    interpreter: Interpreter,
    stores: TabContextStoreHub,
}

impl TabContext {
    /// Assembles a context.
    #[must_use]
    pub fn new(tab_id: TabId, interpreter: Interpreter, stores: TabContextStoreHub) -> Self {
        Self {
            tab_id,
            interpreter,
            stores,
        }
    }

    /// Returns the owning tab.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab_id
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
    pub fn stores(&self) -> &TabContextStoreHub {
        &self.stores
    }

    /// Releases the context's persisted state.
    pub fn teardown(&self) -> BoxFuture<'static, ()> {
        self.stores.teardown()
    }
}

impl fmt::Debug for TabContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabContext")
            .field("tab_id", &self.tab_id)
            .field("interpreter", &self.interpreter)
            .finish()
    }
}
