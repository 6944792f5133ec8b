//! Single entry point for inbound messages.
//!
//! Every message is offered to three targets:
//!
//! | Target | When |
//! |--------|------|
//! | Global interpreter | Always |
//! | Tab context interpreter | When the owning tab is known |
//! | Backchannel handler | Always |
//!
//! All targets run synchronously in [`BackgroundMessageDistributor::dispatch`],
//! so interpreters see messages in dispatch order. No target's result
//! changes whether another one runs. Pending handler work is awaited by
//! [`PendingRouting::settle`] and results merge into a [`RoutingOutcome`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::{GlobalContext, TabContextManager};
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::interpreter::{HandlerFuture, InterpreterResponse};
use crate::protocol::{Message, Sender};

use super::BackchannelHandler;

// ============================================================================
// RoutingOutcome
// ============================================================================

/// Aggregated result of routing one message.
///
/// `handled` is true if any target handled the message; `response` is the
/// first non-empty response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingOutcome {
    /// Whether any target handled the message.
    pub handled: bool,
    /// Value returned to the sender.
    pub response: Option<Value>,
}

impl RoutingOutcome {
    /// Nothing handled the message.
    #[inline]
    #[must_use]
    pub fn not_handled() -> Self {
        Self::default()
    }

    /// Handled with no response.
    #[inline]
    #[must_use]
    pub fn handled() -> Self {
        Self {
            handled: true,
            response: None,
        }
    }

    /// Merges another target's outcome into this one.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            handled: self.handled || other.handled,
            response: self.response.or(other.response),
        }
    }
}

// ============================================================================
// Tab Resolution
// ============================================================================

/// Returns the tab a message belongs to.
///
/// The message's own tab id wins, except for content scripts, which can
/// only speak for the tab hosting them.
#[must_use]
pub fn resolve_tab_id(message: &Message, sender: Option<&Sender>) -> Option<TabId> {
    let sender_tab = sender.and_then(|s| s.tab_id);

    match (message.tab_id, sender) {
        (Some(claimed), Some(sender)) if sender.is_content_script() => match sender.tab_id {
            Some(actual) if actual != claimed => {
                warn!(
                    claimed = %claimed,
                    actual = %actual,
                    message_type = %message.message_type,
                    "Content script claimed another tab, using its own"
                );
                Some(actual)
            }
            _ => Some(claimed),
        },
        (Some(claimed), _) => Some(claimed),
        (None, _) => sender_tab,
    }
}

// ============================================================================
// BackgroundMessageDistributor
// ============================================================================

/// Routes messages to the global context, tab contexts and backchannel.
pub struct BackgroundMessageDistributor {
    global_context: Arc<GlobalContext>,
    tab_context_manager: Arc<TabContextManager>,
    backchannel: Arc<dyn BackchannelHandler>,
}

impl BackgroundMessageDistributor {
    /// Creates a distributor.
    #[must_use]
    pub fn new(
        global_context: Arc<GlobalContext>,
        tab_context_manager: Arc<TabContextManager>,
        backchannel: Arc<dyn BackchannelHandler>,
    ) -> Self {
        Self {
            global_context,
            tab_context_manager,
            backchannel,
        }
    }

    /// Routes one message and waits for every handler to settle.
    ///
    /// Unroutable messages are logged and reported as not handled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handler`] if any handler failed, after every
    /// target's pending work has finished.
    pub async fn distribute(
        &self,
        message: Message,
        sender: Option<&Sender>,
    ) -> Result<RoutingOutcome> {
        self.dispatch(message, sender).settle().await
    }

    /// Runs every target's synchronous handling now.
    ///
    /// Interpreters see messages in the order `dispatch` is called; only the
    /// asynchronous tails are left in the returned [`PendingRouting`].
    pub fn dispatch(&self, mut message: Message, sender: Option<&Sender>) -> PendingRouting {
        let tab_id = resolve_tab_id(&message, sender);
        message.tab_id = tab_id;

        let mut routing = PendingRouting {
            message_type: message.message_type.clone(),
            tab_id,
            outcome: RoutingOutcome::not_handled(),
            pending: Vec::new(),
            failures: Vec::new(),
        };

        let global = self.global_context.interpreter().interpret(&message);
        routing.collect(global);

        if let Some(tab_id) = tab_id {
            let tab = self
                .tab_context_manager
                .interpret_message_for_tab(tab_id, &message);
            routing.collect(tab);
        }

        let backchannel = self.backchannel.handle_message(&message);
        routing.outcome = std::mem::take(&mut routing.outcome).merge(RoutingOutcome {
            handled: backchannel.success,
            response: backchannel.response,
        });

        if !routing.outcome.handled {
            warn!(
                message_type = %message.message_type,
                tab_id = ?tab_id,
                "Unable to interpret message"
            );
        }

        routing
    }
}

// ============================================================================
// PendingRouting
// ============================================================================

/// A dispatched message whose handlers may still have work in flight.
#[must_use = "pending handler work only completes when settled"]
pub struct PendingRouting {
    message_type: String,
    tab_id: Option<TabId>,
    outcome: RoutingOutcome,
    pending: Vec<HandlerFuture>,
    failures: Vec<Error>,
}

impl PendingRouting {
    /// Returns the outcome known before pending work settles.
    #[inline]
    #[must_use]
    pub fn outcome(&self) -> &RoutingOutcome {
        &self.outcome
    }

    /// Awaits every pending handler and reports the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handler`] if any handler failed.
    pub async fn settle(self) -> Result<RoutingOutcome> {
        let Self {
            message_type,
            tab_id,
            outcome,
            pending,
            mut failures,
        } = self;

        let settled = join_all(pending).await;
        failures.extend(settled.into_iter().filter_map(|r| r.err()));

        if let Some(first) = failures.into_iter().next() {
            return Err(as_handler_error(&message_type, first));
        }

        debug!(
            message_type = %message_type,
            tab_id = ?tab_id,
            handled = outcome.handled,
            "Message routed"
        );
        Ok(outcome)
    }

    fn collect(&mut self, result: Result<InterpreterResponse>) {
        match result {
            Ok(response) => {
                if response.is_handled() {
                    self.outcome.handled = true;
                }
                self.pending.extend(response.into_result());
            }
            Err(e) => {
                self.outcome.handled = true;
                self.failures.push(e);
            }
        }
    }
}

impl std::fmt::Debug for PendingRouting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRouting")
            .field("message_type", &self.message_type)
            .field("tab_id", &self.tab_id)
            .field("outcome", &self.outcome)
            .field("pending", &self.pending.len())
            .field("failures", &self.failures.len())
            .finish()
    }
}

fn as_handler_error(message_type: &str, error: Error) -> Error {
    if error.is_handler_error() {
        error
    } else {
        Error::handler(message_type, error.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::FutureExt;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::actions::{
        DetailsViewActions, FeatureFlagActions, TabActions, UserConfigurationActions,
    };
    use crate::context::{TabContext, TabContextCreator};
    use crate::distributor::{BackchannelResponse, PostMessageContentHandler};
    use crate::interpreter::Interpreter;
    use crate::protocol::SurfaceKind;
    use crate::stores::{
        DetailsViewStore, DetailsViewStoreData, FeatureFlagStore, GlobalStoreHub, TabContextStoreHub,
        TabStore, TabStoreData, UserConfigurationStore,
    };
    use crate::storage::PersistenceQueue;

    type Calls = Arc<Mutex<Vec<(&'static str, Value, Option<TabId>)>>>;

    fn recording_interpreter(scope: &'static str, types: &[&'static str], calls: &Calls) -> Interpreter {
        let interpreter = Interpreter::new();
        for &message_type in types {
            let calls = Arc::clone(calls);
            interpreter.register_type_to_payload_callback(message_type, move |payload, tab| {
                calls.lock().push((scope, payload, tab));
                Ok(None)
            });
        }
        interpreter
    }

    fn tab_stores() -> TabContextStoreHub {
        TabContextStoreHub {
            tab_store: TabStore::new(&TabActions::default(), TabStoreData::default()),
            details_view_store: DetailsViewStore::new(
                &DetailsViewActions::default(),
                DetailsViewStoreData::default(),
            ),
        }
    }

    fn global_context(interpreter: Interpreter) -> Arc<GlobalContext> {
        let stores = GlobalStoreHub {
            feature_flag_store: FeatureFlagStore::new(
                &FeatureFlagActions::default(),
                None,
                PersistenceQueue::disabled(),
            ),
            user_configuration_store: UserConfigurationStore::new(
                &UserConfigurationActions::default(),
                None,
                PersistenceQueue::disabled(),
            ),
        };
        Arc::new(GlobalContext::new(interpreter, stores))
    }

    struct TabCreator {
        types: Vec<&'static str>,
        calls: Calls,
    }

    impl TabContextCreator for TabCreator {
        fn create_tab_context(&self, tab_id: TabId) -> TabContext {
            TabContext::new(
                tab_id,
                recording_interpreter("tab", &self.types, &self.calls),
                tab_stores(),
            )
        }
    }

    fn distributor(
        global_types: &[&'static str],
        tab_types: &[&'static str],
        tabs: &[u32],
    ) -> (BackgroundMessageDistributor, Calls) {
        let calls: Calls = Arc::default();
        let manager = Arc::new(TabContextManager::new());
        let creator = TabCreator {
            types: tab_types.to_vec(),
            calls: Arc::clone(&calls),
        };
        for &tab in tabs {
            manager.add_tab_context_if_not_exists(TabId::new(tab), &creator);
        }

        let distributor = BackgroundMessageDistributor::new(
            global_context(recording_interpreter("global", global_types, &calls)),
            manager,
            Arc::new(PostMessageContentHandler::new()),
        );
        (distributor, calls)
    }

    #[test]
    fn test_resolve_tab_id() {
        let message = Message::new("t");
        let with_tab = Message::new("t").with_tab(TabId::new(1));
        let page = Sender::new(SurfaceKind::DetailsView, Some(TabId::new(2)));
        let script = Sender::content_script(TabId::new(3));

        assert_eq!(resolve_tab_id(&message, None), None);
        assert_eq!(resolve_tab_id(&message, Some(&page)), Some(TabId::new(2)));
        assert_eq!(resolve_tab_id(&with_tab, Some(&page)), Some(TabId::new(1)));
        assert_eq!(resolve_tab_id(&with_tab, Some(&script)), Some(TabId::new(3)));
    }

    #[test]
    fn test_outcome_merge() {
        let merged = RoutingOutcome::handled()
            .merge(RoutingOutcome::not_handled())
            .merge(RoutingOutcome {
                handled: true,
                response: Some(json!(1)),
            })
            .merge(RoutingOutcome {
                handled: true,
                response: Some(json!(2)),
            });

        assert!(merged.handled);
        assert_eq!(merged.response, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_routes_to_handler_once_with_tab() {
        let (distributor, calls) = distributor(&[], &["x/do"], &[4]);

        let outcome = distributor
            .distribute(
                Message::for_tab("x/do", TabId::new(4), json!({"k": 1})),
                None,
            )
            .await
            .expect("distribute");

        assert!(outcome.handled);
        assert_eq!(
            *calls.lock(),
            vec![("tab", json!({"k": 1}), Some(TabId::new(4)))]
        );
    }

    #[tokio::test]
    async fn test_unregistered_type_not_handled() {
        let (distributor, calls) = distributor(&["x/global"], &["x/tab"], &[4]);

        let outcome = distributor
            .distribute(Message::new("x/unknown").with_tab(TabId::new(4)), None)
            .await
            .expect("distribute");

        assert_eq!(outcome, RoutingOutcome::not_handled());
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tab_only_handled_is_handled() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let calls: Calls = Arc::default();
        let manager = Arc::new(TabContextManager::new());
        manager.add_tab_context_if_not_exists(
            TabId::new(4),
            &TabCreator {
                types: vec!["x/tab"],
                calls: Arc::clone(&calls),
            },
        );

        let distributor = BackgroundMessageDistributor::new(
            global_context(recording_interpreter("global", &["x/other"], &calls)),
            manager,
            Arc::new(CountingBackchannel(Arc::clone(&consulted))),
        );

        let outcome = distributor
            .distribute(Message::new("x/tab").with_tab(TabId::new(4)), None)
            .await
            .expect("distribute");

        assert!(outcome.handled);
        assert_eq!(outcome.response, None);
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(consulted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_global_and_tab_each_called_once() {
        let (distributor, calls) = distributor(&["x/both"], &["x/both"], &[2]);

        let sender = Sender::content_script(TabId::new(2));
        let outcome = distributor
            .distribute(Message::new("x/both"), Some(&sender))
            .await
            .expect("distribute");

        assert!(outcome.handled);
        let scopes: Vec<_> = calls.lock().iter().map(|(scope, _, tab)| (*scope, *tab)).collect();
        assert_eq!(
            scopes,
            vec![("global", Some(TabId::new(2))), ("tab", Some(TabId::new(2)))]
        );
    }

    #[tokio::test]
    async fn test_dispatch_interprets_before_settle() {
        let (distributor, calls) = distributor(&["x/first", "x/second"], &[], &[]);

        let first = distributor.dispatch(
            Message::new("x/first").with_payload(json!(1)),
            None,
        );
        let second = distributor.dispatch(
            Message::new("x/second").with_payload(json!(2)),
            None,
        );
        assert!(first.outcome().handled);

        let (second, first) = tokio::join!(second.settle(), first.settle());
        assert!(first.expect("first").handled);
        assert!(second.expect("second").handled);

        let payloads: Vec<_> = calls.lock().iter().map(|(_, payload, _)| payload.clone()).collect();
        assert_eq!(payloads, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_unknown_tab_not_created() {
        let (distributor, calls) = distributor(&[], &["x/tab"], &[]);

        let outcome = distributor
            .distribute(Message::new("x/tab").with_tab(TabId::new(9)), None)
            .await
            .expect("distribute");

        assert!(!outcome.handled);
        assert!(calls.lock().is_empty());
        assert!(distributor.tab_context_manager.is_empty());
    }

    #[tokio::test]
    async fn test_async_failure_reported_after_settle() {
        let finished = Arc::new(AtomicUsize::new(0));
        let global = Interpreter::new();
        global.register_type_to_payload_callback("x/fail", |_, _| {
            Ok(Some(async { Err::<(), _>(Error::handler("x/fail", "boom")) }.boxed()))
        });

        let manager = Arc::new(TabContextManager::new());
        let done = Arc::clone(&finished);
        let creator = FnCreator(move |tab_id| {
            let interpreter = Interpreter::new();
            let done = Arc::clone(&done);
            interpreter.register_type_to_payload_callback("x/fail", move |_, _| {
                let done = Arc::clone(&done);
                Ok(Some(
                    async move {
                        tokio::task::yield_now().await;
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), Error>(())
                    }
                    .boxed(),
                ))
            });
            TabContext::new(tab_id, interpreter, tab_stores())
        });
        manager.add_tab_context_if_not_exists(TabId::new(1), &creator);

        let distributor = BackgroundMessageDistributor::new(
            global_context(global),
            manager,
            Arc::new(PostMessageContentHandler::new()),
        );

        let err = distributor
            .distribute(Message::new("x/fail").with_tab(TabId::new(1)), None)
            .await
            .expect_err("handler failure");

        assert!(err.is_handler_error());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backchannel_response_returned() {
        let (distributor, _) = distributor(&[], &[], &[]);
        let store = Message::new(crate::protocol::messages::backchannel::STORE_REQUEST)
            .with_payload(json!({"messageId": "a", "stringifiedMessageData": "hi"}));
        let retrieve = Message::new(crate::protocol::messages::backchannel::RETRIEVE_REQUEST)
            .with_payload(json!({"messageId": "a"}));

        distributor.distribute(store, None).await.expect("store");
        let outcome = distributor.distribute(retrieve, None).await.expect("retrieve");

        assert!(outcome.handled);
        assert_eq!(
            outcome.response.as_ref().map(|r| r["stringifiedMessageData"].clone()),
            Some(json!("hi"))
        );
    }

    struct CountingBackchannel(Arc<AtomicUsize>);

    impl BackchannelHandler for CountingBackchannel {
        fn handle_message(&self, _message: &Message) -> BackchannelResponse {
            self.0.fetch_add(1, Ordering::SeqCst);
            BackchannelResponse::declined()
        }
    }

    struct FnCreator<F>(F);

    impl<F> TabContextCreator for FnCreator<F>
    where
        F: Fn(TabId) -> TabContext + Send + Sync,
    {
        fn create_tab_context(&self, tab_id: TabId) -> TabContext {
            (self.0)(tab_id)
        }
    }
}
