//! Multi-listener invocation point.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

// ============================================================================
// Action
// ============================================================================

/// Listener called with an action payload.
pub type ActionListener<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// A typed event point with any number of listeners.
///
/// [`invoke`](Self::invoke) calls the listeners registered when the
/// invocation starts, in registration order. Listeners added during an
/// invocation see the next one. A panicking listener is not isolated.
pub struct Action<P> {
    listeners: Mutex<Vec<ActionListener<P>>>,
}

impl<P> Action<P> {
    /// Creates an action with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Adds a listener.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Calls every listener with the payload.
    pub fn invoke(&self, payload: &P) {
        let snapshot: Vec<_> = self.listeners.lock().clone();
        for listener in snapshot {
            listener(payload);
        }
    }

    /// Returns the number of listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<P> Default for Action<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Action<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listeners_called_in_order() {
        let action = Action::<u32>::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let calls = Arc::clone(&calls);
            action.add_listener(move |p| calls.lock().push(format!("{tag}{p}")));
        }

        action.invoke(&1);
        assert_eq!(*calls.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_listener_added_during_invoke_waits_for_next() {
        let action = Arc::new(Action::<()>::new());
        let late_calls = Arc::new(Mutex::new(0));

        let action_inner = Arc::downgrade(&action);
        let late = Arc::clone(&late_calls);
        action.add_listener(move |_| {
            if let Some(action) = action_inner.upgrade() {
                let late = Arc::clone(&late);
                action.add_listener(move |_| *late.lock() += 1);
            }
        });

        action.invoke(&());
        assert_eq!(*late_calls.lock(), 0);
        assert_eq!(action.listener_count(), 2);

        action.invoke(&());
        assert_eq!(*late_calls.lock(), 1);
    }
}
