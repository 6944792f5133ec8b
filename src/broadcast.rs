//! Store state delivery to surfaces.
//!
//! [`StateDispatcher`] turns store changes into [`StoreUpdateMessage`]s;
//! [`Broadcaster`] delivers them through a [`MessageSink`] on an ordered
//! worker task so store listeners never wait on the transport.
//!
//! | Scope | Delivery |
//! |-------|----------|
//! | Tab context store | Surfaces of that tab |
//! | Global store | Every surface |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::flux::{Store, StoreName, StoreType};
use crate::identifiers::TabId;
use crate::interpreter::Interpreter;
use crate::protocol::messages;

// ============================================================================
// MessageSink
// ============================================================================

/// Outbound delivery to surfaces.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Delivers a message to the surfaces of one tab.
    async fn send_to_tab(&self, tab_id: TabId, message: Value) -> Result<()>;

    /// Delivers a message to every surface.
    async fn send_to_all(&self, message: Value) -> Result<()>;
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMessageSink;

#[async_trait]
impl MessageSink for NullMessageSink {
    async fn send_to_tab(&self, _tab_id: TabId, _message: Value) -> Result<()> {
        Ok(())
    }

    async fn send_to_all(&self, _message: Value) -> Result<()> {
        Ok(())
    }
}

/// Sink that records every delivery.
///
/// `None` as recipient means "every surface".
#[derive(Debug, Default)]
pub struct RecordingMessageSink {
    sent: Mutex<Vec<(Option<TabId>, Value)>>,
}

impl RecordingMessageSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delivery so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(Option<TabId>, Value)> {
        self.sent.lock().clone()
    }

    /// Returns the messages delivered to one tab.
    #[must_use]
    pub fn sent_to_tab(&self, tab_id: TabId) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == Some(tab_id))
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Forgets recorded deliveries.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl MessageSink for RecordingMessageSink {
    async fn send_to_tab(&self, tab_id: TabId, message: Value) -> Result<()> {
        self.sent.lock().push((Some(tab_id), message));
        Ok(())
    }

    async fn send_to_all(&self, message: Value) -> Result<()> {
        self.sent.lock().push((None, message));
        Ok(())
    }
}

// ============================================================================
// StoreUpdateMessage
// ============================================================================

/// Store state pushed to surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreUpdateMessage {
    /// Always `insights/store/update`.
    pub message_type: &'static str,
    /// Store that changed.
    pub store_id: StoreName,
    /// Scope of the store.
    pub store_type: StoreType,
    /// Owning tab for tab context stores.
    pub tab_id: Option<TabId>,
    /// New state.
    pub payload: Value,
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Delivery target.
#[derive(Debug, Clone, Copy)]
enum Recipient {
    Tab(TabId),
    All,
}

/// Internal operations for the worker.
enum BroadcastOp {
    Send { to: Recipient, message: Value },
    Flush { done: oneshot::Sender<()> },
}

/// Ordered, non-blocking delivery through a [`MessageSink`].
///
/// Created outside a tokio runtime, the broadcaster drops everything.
pub struct Broadcaster {
    tx: Option<mpsc::UnboundedSender<BroadcastOp>>,
}

impl Broadcaster {
    /// Creates a broadcaster and spawns its worker.
    #[must_use]
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime, broadcaster disabled");
            return Self::disabled();
        };

        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(Self::run_worker(sink, rx));
        Self { tx: Some(tx) }
    }

    /// Creates a broadcaster that drops everything.
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Queues a message for the surfaces of one tab.
    pub fn send_to_tab(&self, tab_id: TabId, message: Value) {
        self.enqueue(Recipient::Tab(tab_id), message);
    }

    /// Queues a message for every surface.
    pub fn send_to_all(&self, message: Value) {
        self.enqueue(Recipient::All, message);
    }

    /// Waits until every message queued so far was handed to the sink.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };

        let (done, rx) = oneshot::channel();
        if tx.send(BroadcastOp::Flush { done }).is_ok() {
            let _ = rx.await;
        }
    }

    fn enqueue(&self, to: Recipient, message: Value) {
        if let Some(tx) = &self.tx
            && tx.send(BroadcastOp::Send { to, message }).is_err()
        {
            debug!("Broadcast worker gone, message dropped");
        }
    }

    async fn run_worker(sink: Arc<dyn MessageSink>, mut rx: mpsc::UnboundedReceiver<BroadcastOp>) {
        while let Some(op) = rx.recv().await {
            match op {
                BroadcastOp::Send { to, message } => {
                    let result = match to {
                        Recipient::Tab(tab_id) => sink.send_to_tab(tab_id, message).await,
                        Recipient::All => sink.send_to_all(message).await,
                    };
                    if let Err(e) = result {
                        warn!(recipient = ?to, error = %e, "Failed to deliver message");
                    }
                }
                BroadcastOp::Flush { done } => {
                    let _ = done.send(());
                }
            }
        }

        trace!("Broadcast worker terminated");
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("enabled", &self.tx.is_some())
            .finish()
    }
}

// ============================================================================
// StateDispatcher
// ============================================================================

/// Pushes store state after every change.
#[derive(Debug, Clone)]
pub struct StateDispatcher {
    broadcaster: Arc<Broadcaster>,
    tab_id: Option<TabId>,
}

impl StateDispatcher {
    /// Dispatcher for the stores of one tab.
    #[must_use]
    pub fn for_tab(broadcaster: Arc<Broadcaster>, tab_id: TabId) -> Self {
        Self {
            broadcaster,
            tab_id: Some(tab_id),
        }
    }

    /// Dispatcher for global stores.
    #[must_use]
    pub fn global(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            broadcaster,
            tab_id: None,
        }
    }

    /// Returns the store scope this dispatcher serves.
    #[inline]
    #[must_use]
    pub fn store_type(&self) -> StoreType {
        match self.tab_id {
            Some(_) => StoreType::TabContextStore,
            None => StoreType::GlobalStore,
        }
    }

    /// Pushes each store's state now and after every change.
    pub fn initialize(&self, stores: &[Arc<dyn Store>]) {
        for store in stores {
            self.dispatch(store.as_ref());

            let dispatcher = self.clone();
            let weak = Arc::downgrade(store);
            store.add_changed_listener(Arc::new(move || {
                if let Some(store) = weak.upgrade() {
                    dispatcher.dispatch(store.as_ref());
                }
            }));
        }
    }

    /// Answers `insights/store/<StoreName>/state/current` for each store.
    pub fn register_state_requests(&self, interpreter: &Interpreter, stores: &[Arc<dyn Store>]) {
        for store in stores {
            let dispatcher = self.clone();
            let store = Arc::clone(store);
            interpreter.register_type_to_payload_callback(
                messages::store_state_request(store.name().as_str()),
                move |_, _| {
                    dispatcher.dispatch(store.as_ref());
                    Ok(None)
                },
            );
        }
    }

    /// Pushes one store's current state.
    pub fn dispatch(&self, store: &dyn Store) {
        let payload = match store.state_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(store = %store.name(), error = %e, "Failed to serialize store state");
                return;
            }
        };

        let update = StoreUpdateMessage {
            message_type: messages::store::UPDATE,
            store_id: store.name(),
            store_type: self.store_type(),
            tab_id: self.tab_id,
            payload,
        };

        let message = match serde_json::to_value(&update) {
            Ok(message) => message,
            Err(e) => {
                warn!(store = %store.name(), error = %e, "Failed to serialize store update");
                return;
            }
        };

        match self.tab_id {
            Some(tab_id) => self.broadcaster.send_to_tab(tab_id, message),
            None => self.broadcaster.send_to_all(message),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
