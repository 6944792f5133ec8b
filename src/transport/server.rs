//! Surface WebSocket server.
//!
//! Every extension surface (content scripts, extension pages, the browser
//! shim) connects to the same port and identifies itself with a `hello`
//! frame. Messages are routed through a [`MessageHandler`]; store pushes
//! go out through the server's [`MessageSink`] implementation.
//!
//! # Connection Flow
//!
//! 1. [`SurfaceServer::bind`] binds and starts the accept loop
//! 2. A surface connects and sends `hello {surface, tabId?}`
//! 3. The connection is registered by surface kind and tab
//! 4. `message` frames are dispatched in arrival order and answered with
//!    `reply` once their handlers settle
//! 5. `event` frames from the browser shim are forwarded in order
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                SurfaceServer                 │
//! │  browser shim  → requests / lifecycle events │
//! │  tab surfaces  → messages / store pushes     │
//! └──────────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::broadcast::MessageSink;
use crate::distributor::{BackgroundMessageDistributor, RoutingOutcome};
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, RequestId, TabId};
use crate::protocol::{
    BrowserCommand, BrowserEvent, InboundFrame, Message, OutboundFrame, Request, Sender,
    SurfaceKind,
};

use super::SurfaceConnection;
use super::connection::DEFAULT_REQUEST_TIMEOUT;

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (localhost).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Time a new connection has to send its `hello` frame.
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept poll interval, bounds how long shutdown takes to notice.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// MessageHandler
// ============================================================================

/// Routes messages received from surfaces.
///
/// [`dispatch_message`](MessageHandler::dispatch_message) is called on the
/// connection's read loop, so synchronous handling happens in arrival
/// order. The returned future only finishes pending work.
pub trait MessageHandler: Send + Sync {
    /// Handles one message now and returns its pending completion.
    fn dispatch_message(
        &self,
        message: Message,
        sender: Sender,
    ) -> BoxFuture<'static, Result<RoutingOutcome>>;
}

impl MessageHandler for BackgroundMessageDistributor {
    fn dispatch_message(
        &self,
        message: Message,
        sender: Sender,
    ) -> BoxFuture<'static, Result<RoutingOutcome>> {
        self.dispatch(message, Some(&sender)).settle().boxed()
    }
}

// ============================================================================
// SurfaceServer
// ============================================================================

#[derive(Debug, Clone)]
struct SurfaceEntry {
    connection: SurfaceConnection,
    sender: Sender,
}

/// WebSocket server for extension surfaces.
pub struct SurfaceServer {
    /// Bound address.
    addr: SocketAddr,

    /// Connected non-browser surfaces.
    surfaces: RwLock<FxHashMap<ConnectionId, SurfaceEntry>>,

    /// Connected browser shim.
    browser: RwLock<Option<SurfaceConnection>>,

    /// Callers waiting for the browser shim.
    browser_waiters: Mutex<Vec<oneshot::Sender<()>>>,

    /// Message router, set once the background is wired.
    message_handler: RwLock<Option<Arc<dyn MessageHandler>>>,

    /// Lifecycle event consumer.
    event_tx: RwLock<Option<mpsc::UnboundedSender<BrowserEvent>>>,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// SurfaceServer - Constructor
// ============================================================================

impl SurfaceServer {
    /// Binds to `ip:port` and starts the accept loop.
    ///
    /// Use port 0 for a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        let server = Arc::new(Self {
            addr,
            surfaces: RwLock::new(FxHashMap::default()),
            browser: RwLock::new(None),
            browser_waiters: Mutex::new(Vec::new()),
            message_handler: RwLock::new(None),
            event_tx: RwLock::new(None),
            shutdown: AtomicBool::new(false),
        });

        let accept = Arc::clone(&server);
        tokio::spawn(async move {
            accept.accept_loop(listener).await;
        });

        info!(port = addr.port(), "Surface server started");

        Ok(server)
    }
}

// ============================================================================
// SurfaceServer - Public API
// ============================================================================

impl SurfaceServer {
    /// Returns the WebSocket URL surfaces connect to.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the number of connected non-browser surfaces.
    #[inline]
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.read().len()
    }

    /// Returns `true` if the browser shim is connected.
    #[inline]
    #[must_use]
    pub fn is_browser_connected(&self) -> bool {
        self.browser.read().as_ref().is_some_and(|c| !c.is_closed())
    }

    /// Installs the message router.
    pub fn set_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.message_handler.write() = Some(handler);
    }

    /// Installs the lifecycle event consumer.
    pub fn set_event_sender(&self, event_tx: mpsc::UnboundedSender<BrowserEvent>) {
        *self.event_tx.write() = Some(event_tx);
    }

    /// Waits for the browser shim to connect.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if it does not connect in time
    /// - [`Error::Connection`] if the server shuts down while waiting
    pub async fn wait_for_browser(&self, wait: Duration) -> Result<()> {
        let rx = {
            let mut waiters = self.browser_waiters.lock();
            if self.is_browser_connected() {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            rx
        };

        match timeout(wait, rx).await {
            Ok(Ok(())) => {
                debug!("Browser shim connected");
                Ok(())
            }
            Ok(Err(_)) => Err(Error::connection("Browser waiter channel closed")),
            Err(_) => Err(Error::connection_timeout(wait.as_millis() as u64)),
        }
    }

    /// Sends a browser API command to the shim and returns its result.
    ///
    /// # Errors
    ///
    /// - [`Error::BrowserNotConnected`] if no shim is connected
    /// - [`Error::RequestTimeout`] if the shim does not answer in time
    /// - [`Error::Browser`] if the browser API failed
    pub async fn send_browser_command(
        &self,
        command: BrowserCommand,
        request_timeout: Duration,
    ) -> Result<Value> {
        let connection = self
            .browser
            .read()
            .clone()
            .ok_or(Error::BrowserNotConnected)?;

        let method = command.method();
        let response = connection
            .send_with_timeout(Request::new(command), request_timeout)
            .await?;
        trace!(method, success = response.is_success(), "Browser command answered");
        response.into_result()
    }

    /// Sends a browser API command with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`send_browser_command`](Self::send_browser_command).
    pub async fn browser_command(&self, command: BrowserCommand) -> Result<Value> {
        self.send_browser_command(command, DEFAULT_REQUEST_TIMEOUT)
            .await
    }
}

// ============================================================================
// SurfaceServer - Lifecycle
// ============================================================================

impl SurfaceServer {
    /// Stops accepting and closes every connection.
    pub fn shutdown(&self) {
        info!("Surface server shutting down");

        self.shutdown.store(true, Ordering::SeqCst);

        let surfaces: Vec<_> = self.surfaces.write().drain().collect();
        for (id, entry) in surfaces {
            entry.connection.shutdown();
            debug!(connection_id = %id, "Surface closed during shutdown");
        }

        if let Some(browser) = self.browser.write().take() {
            browser.shutdown();
        }

        // Dropping senders fails the waiters.
        self.browser_waiters.lock().clear();
    }

    fn register(&self, connection: &SurfaceConnection, sender: Sender) {
        if sender.surface == SurfaceKind::Browser {
            let previous = self.browser.write().replace(connection.clone());
            if let Some(previous) = previous {
                warn!(connection_id = %previous.id(), "Replacing connected browser shim");
                previous.shutdown();
            }

            let waiters: Vec<_> = self.browser_waiters.lock().drain(..).collect();
            for waiter in waiters {
                let _ = waiter.send(());
            }
            info!(connection_id = %connection.id(), "Browser shim registered");
            return;
        }

        self.surfaces.write().insert(
            connection.id(),
            SurfaceEntry {
                connection: connection.clone(),
                sender,
            },
        );
        info!(
            connection_id = %connection.id(),
            surface = ?sender.surface,
            tab_id = ?sender.tab_id,
            "Surface registered"
        );
    }

    fn unregister(&self, id: ConnectionId) {
        {
            let mut browser = self.browser.write();
            if browser.as_ref().is_some_and(|c| c.id() == id) {
                *browser = None;
                info!(connection_id = %id, "Browser shim disconnected");
                return;
            }
        }

        if self.surfaces.write().remove(&id).is_some() {
            debug!(connection_id = %id, "Surface disconnected");
        }
    }

    fn push_where(&self, message: &Value, filter: impl Fn(&Sender) -> bool) -> usize {
        let targets: Vec<SurfaceConnection> = self
            .surfaces
            .read()
            .values()
            .filter(|entry| filter(&entry.sender))
            .map(|entry| entry.connection.clone())
            .collect();

        let mut delivered = 0;
        for connection in targets {
            let frame = OutboundFrame::Push {
                message: message.clone(),
            };
            match connection.send_frame(frame) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(connection_id = %connection.id(), error = %e, "Push dropped"),
            }
        }
        delivered
    }
}

#[async_trait]
impl MessageSink for SurfaceServer {
    async fn send_to_tab(&self, tab_id: TabId, message: Value) -> Result<()> {
        let delivered = self.push_where(&message, |s| s.tab_id == Some(tab_id));
        trace!(tab_id = %tab_id, delivered, "Pushed to tab surfaces");
        Ok(())
    }

    async fn send_to_all(&self, message: Value) -> Result<()> {
        let delivered = self.push_where(&message, |_| true);
        trace!(delivered, "Pushed to all surfaces");
        Ok(())
    }
}

// ============================================================================
// SurfaceServer - Accept Loop
// ============================================================================

impl SurfaceServer {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        let (connection, mut inbound_rx) = SurfaceConnection::new(ws_stream);

        let sender = match timeout(HELLO_TIMEOUT, inbound_rx.recv()).await {
            Ok(Some(InboundFrame::Hello { surface, tab_id })) => Sender::new(surface, tab_id),
            Ok(Some(_)) => {
                connection.shutdown();
                return Err(Error::protocol("Expected hello as first frame"));
            }
            Ok(None) => return Err(Error::ConnectionClosed),
            Err(_) => {
                connection.shutdown();
                return Err(Error::connection_timeout(HELLO_TIMEOUT.as_millis() as u64));
            }
        };

        self.register(&connection, sender);

        while let Some(frame) = inbound_rx.recv().await {
            self.handle_frame(&connection, sender, frame);
        }

        self.unregister(connection.id());
        Ok(())
    }

    fn handle_frame(&self, connection: &SurfaceConnection, sender: Sender, frame: InboundFrame) {
        match frame {
            InboundFrame::Message { id, message } => {
                let message_type = message.message_type.clone();
                let handler = self.message_handler.read().clone();
                let routing = match handler {
                    Some(handler) => handler.dispatch_message(message, sender),
                    None => {
                        warn!(message_type = %message_type, "No message handler installed");
                        future::ready(Ok(RoutingOutcome::not_handled())).boxed()
                    }
                };
                tokio::spawn(Self::reply_when_settled(
                    connection.clone(),
                    id,
                    message_type,
                    routing,
                ));
            }

            InboundFrame::Event { event } => {
                if sender.surface != SurfaceKind::Browser {
                    warn!(surface = ?sender.surface, method = event.method(), "Ignoring event from non-browser surface");
                    return;
                }
                let event_tx = self.event_tx.read().clone();
                match event_tx {
                    Some(tx) => {
                        if tx.send(event).is_err() {
                            debug!("Event consumer gone");
                        }
                    }
                    None => debug!(method = event.method(), "No event consumer installed"),
                }
            }

            InboundFrame::Hello { .. } => {
                warn!(connection_id = %connection.id(), "Duplicate hello ignored");
            }

            InboundFrame::Response(response) => {
                warn!(id = %response.id, "Uncorrelated response ignored");
            }
        }
    }

    async fn reply_when_settled(
        connection: SurfaceConnection,
        id: RequestId,
        message_type: String,
        routing: BoxFuture<'static, Result<RoutingOutcome>>,
    ) {
        let outcome = routing.await;

        let reply = match outcome {
            Ok(outcome) => OutboundFrame::Reply {
                id,
                handled: outcome.handled,
                response: outcome.response,
            },
            Err(e) => {
                error!(message_type = %message_type, error = %e, "Message handling failed");
                OutboundFrame::Reply {
                    id,
                    handled: true,
                    response: None,
                }
            }
        };

        if let Err(e) = connection.send_frame(reply) {
            debug!(%id, error = %e, "Reply dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
