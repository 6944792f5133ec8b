//! Surface WebSocket connection and event loop.
//!
//! Each connected surface gets one [`SurfaceConnection`]. The connection
//! spawns a tokio task that handles:
//!
//! - Outbound frames (replies, pushes, browser requests)
//! - Request/response correlation for browser API requests
//! - Forwarding every other inbound frame to the server, in order

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, RequestId};
use crate::protocol::{InboundFrame, OutboundFrame, Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for browser API requests.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending browser requests before rejecting new ones.
const MAX_IN_FLIGHT: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Reply channels keyed by request id.
type InFlightMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

// ============================================================================
// LoopCommand
// ============================================================================

/// Commands sent to the socket task.
enum LoopCommand {
    /// Send a request and wait for its response.
    Request {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Send a frame without waiting.
    Frame(OutboundFrame),
    /// Drop the entry of a request that timed out.
    Forget(RequestId),
    /// Close the connection.
    Shutdown,
}

// ============================================================================
// SurfaceConnection
// ============================================================================

/// WebSocket connection to one surface.
///
/// Cheap to clone; clones share the event loop.
#[derive(Clone)]
pub struct SurfaceConnection {
    id: ConnectionId,
    command_tx: mpsc::UnboundedSender<LoopCommand>,
    in_flight: Arc<Mutex<InFlightMap>>,
}

impl SurfaceConnection {
    /// Creates a connection from an upgraded WebSocket stream.
    ///
    /// Spawns the event loop. Inbound frames other than responses arrive on
    /// the returned receiver, which closes when the socket does.
    pub(crate) fn new(
        ws_stream: WebSocketStream<TcpStream>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundFrame>) {
        let id = ConnectionId::generate();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(Mutex::new(InFlightMap::default()));

        tokio::spawn(Self::drive(
            id,
            ws_stream,
            command_rx,
            inbound_tx,
            Arc::clone(&in_flight),
        ));

        let connection = Self {
            id,
            command_tx,
            in_flight,
        };
        (connection, inbound_rx)
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Queues a frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection is closed.
    pub fn send_frame(&self, frame: OutboundFrame) -> Result<()> {
        self.command_tx
            .send(LoopCommand::Frame(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Sends a browser request and waits for the response (30s timeout).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    /// Sends a browser request and waits for the response.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;

        {
            let in_flight = self.in_flight.lock();
            if in_flight.len() >= MAX_IN_FLIGHT {
                warn!(
                    pending = in_flight.len(),
                    max = MAX_IN_FLIGHT,
                    "Too many in-flight shim requests"
                );
                return Err(Error::protocol(format!(
                    "Too many in-flight shim requests: {}/{}",
                    in_flight.len(),
                    MAX_IN_FLIGHT
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(LoopCommand::Request {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(LoopCommand::Forget(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending browser requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Closes the connection.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(LoopCommand::Shutdown);
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    async fn drive(
        id: ConnectionId,
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
        inbound_tx: mpsc::UnboundedSender<InboundFrame>,
        in_flight: Arc<Mutex<InFlightMap>>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            Self::handle_incoming_frame(&text, &inbound_tx, &in_flight);
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!(connection_id = %id, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(connection_id = %id, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(connection_id = %id, "WebSocket stream ended");
                            break;
                        }

                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(LoopCommand::Request { request, response_tx }) => {
                            Self::handle_request_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &in_flight,
                            ).await;
                        }

                        Some(LoopCommand::Frame(frame)) => {
                            if let Err(e) = Self::write_frame(&mut ws_write, &frame).await {
                                warn!(connection_id = %id, error = %e, "Failed to send frame");
                            }
                        }

                        Some(LoopCommand::Forget(request_id)) => {
                            in_flight.lock().remove(&request_id);
                            debug!(%request_id, "Forgot timed-out shim request");
                        }

                        Some(LoopCommand::Shutdown) => {
                            debug!(connection_id = %id, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!(connection_id = %id, "Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        command_rx.close();
        Self::fail_in_flight(&in_flight);

        debug!(connection_id = %id, "Event loop terminated");
    }

    fn handle_incoming_frame(
        text: &str,
        inbound_tx: &mpsc::UnboundedSender<InboundFrame>,
        in_flight: &Arc<Mutex<InFlightMap>>,
    ) {
        let frame = match from_str::<InboundFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse inbound frame");
                return;
            }
        };

        if let InboundFrame::Response(response) = frame {
            let tx = in_flight.lock().remove(&response.id);
            match tx {
                Some(tx) => {
                    let _ = tx.send(Ok(response));
                }
                None => warn!(id = %response.id, "Response for unknown request"),
            }
            return;
        }

        if inbound_tx.send(frame).is_err() {
            trace!("Inbound frame dropped, receiver closed");
        }
    }

    async fn handle_request_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut WsSink,
        in_flight: &Arc<Mutex<InFlightMap>>,
    ) {
        let request_id = request.id;
        let method = request.command.method();

        in_flight.lock().insert(request_id, response_tx);

        if let Err(e) = Self::write_frame(ws_write, &OutboundFrame::Request(request)).await
            && let Some(tx) = in_flight.lock().remove(&request_id)
        {
            let _ = tx.send(Err(e));
            return;
        }

        trace!(%request_id, method, "Request sent");
    }

    async fn write_frame(ws_write: &mut WsSink, frame: &OutboundFrame) -> Result<()> {
        let json = to_string(frame)?;
        ws_write
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| Error::connection(e.to_string()))
    }

    fn fail_in_flight(in_flight: &Arc<Mutex<InFlightMap>>) {
        let pending: Vec<_> = in_flight.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Dropped in-flight shim requests");
        }
    }
}

impl std::fmt::Debug for SurfaceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceConnection")
            .field("id", &self.id)
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
