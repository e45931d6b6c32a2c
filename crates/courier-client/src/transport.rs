//! Persistent connection to the chat server.
//!
//! One [`Transport`] owns one connection for the whole process. The handle is
//! a cheap clone over channels into a spawned link task that performs all
//! socket I/O, so every component shares the same connection and there is
//! never a second concurrent socket.
//!
//! # State machine
//!
//! ```text
//! ┌──────────────┐ connect() ┌────────────┐  dial ok   ┌───────────┐
//! │ Disconnected │──────────>│ Connecting │───────────>│ Connected │
//! └──────────────┘           └────────────┘            └───────────┘
//!        ^                        │   ^                      │
//!        │       dial failed,     │   │ fixed-delay retry    │ socket
//!        │       no reconnect     │   │ (serialized)         │ closed
//!        └────────────────────────┘   └──────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - At most one live socket at a time; reconnect attempts are serialized
//!   inside the single link task, never concurrent.
//! - `connect()` while connecting or connected is a no-op; `disconnect()`
//!   is idempotent and cancels any pending reconnect timer.
//! - Every call pending when the link drops resolves to
//!   [`CallError::Disconnected`]; none are left dangling.
//!
//! Dialing is abstracted behind [`Connector`] so the same link task runs
//! against a real WebSocket in production and an in-memory duplex in tests.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use courier_proto::{AckBody, WireFrame};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot, watch},
    time::{Sleep, sleep},
};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::CallError;

/// Delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Bound on how long a call waits for its acknowledgment.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-socket frame channel capacity.
const FRAME_BUFFER: usize = 32;

/// Push fan-out buffer; slow subscribers lag rather than block the link.
const PUSH_BUFFER: usize = 64;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Dialing the endpoint failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No live socket to send on.
    #[error("not connected")]
    NotConnected,

    /// The link task is gone (process shutdown).
    #[error("connection task stopped")]
    Stopped,
}

/// Connection lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No socket and no attempt in progress.
    Disconnected,
    /// Dial in progress or reconnect scheduled.
    Connecting,
    /// Live socket established.
    Connected,
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Server endpoint.
    pub endpoint: Url,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Whether to keep retrying after a drop (unbounded attempts).
    pub auto_reconnect: bool,
    /// Bound on how long a call waits for its acknowledgment.
    pub call_timeout: Duration,
}

impl TransportConfig {
    /// Configuration with default timings for the given endpoint.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            auto_reconnect: true,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// A live framed duplex to the server.
///
/// Produced by a [`Connector`]; the link task owns it for the lifetime of
/// one connection. Dropping `outbound` tells the I/O side to close.
pub struct Socket {
    /// Frames headed to the server.
    pub outbound: mpsc::Sender<WireFrame>,
    /// Frames arriving from the server.
    pub inbound: mpsc::Receiver<WireFrame>,
}

/// Dials the server.
///
/// Production uses [`WsConnector`]; tests use
/// [`testing::FakeConnector`](crate::testing::FakeConnector) to drive the
/// same link task deterministically.
pub trait Connector: Send + 'static {
    /// Dial the endpoint and return a live socket.
    fn connect(
        &mut self,
        endpoint: &Url,
    ) -> impl Future<Output = Result<Socket, TransportError>> + Send;
}

/// An inbound push event, fanned out to all subscribers.
#[derive(Debug, Clone)]
pub struct PushFrame {
    /// Plain push event name.
    pub event: String,
    /// Push payload.
    pub data: Value,
}

/// In-flight calls awaiting their acknowledgment.
///
/// Shared between the caller (registers slots) and the link task (resolves
/// them). Each slot resolves exactly once: by ack, by timeout reclaim, or by
/// link drop.
#[derive(Default)]
pub(crate) struct PendingCalls {
    slots: Mutex<HashMap<u64, oneshot::Sender<Result<Value, CallError>>>>,
}

impl PendingCalls {
    /// Register a slot for `seq`.
    pub(crate) async fn register(&self, seq: u64, tx: oneshot::Sender<Result<Value, CallError>>) {
        self.slots.lock().await.insert(seq, tx);
    }

    /// Reclaim a slot that will never resolve (timed out before send).
    pub(crate) async fn discard(&self, seq: u64) {
        self.slots.lock().await.remove(&seq);
    }

    /// Resolve the slot for `seq` with the server's acknowledgment.
    ///
    /// Acks for unknown sequence numbers (late, after timeout reclaim) are
    /// dropped: the call already resolved and must not resolve twice.
    async fn resolve(&self, seq: u64, body: AckBody) {
        let Some(tx) = self.slots.lock().await.remove(&seq) else {
            tracing::debug!(seq, "dropping ack for unknown call");
            return;
        };
        let result = match body {
            AckBody::Err(reason) => Err(CallError::Domain(reason)),
            AckBody::Ok(value) => Ok(value),
        };
        // The caller may have stopped listening; that is its choice.
        let _ = tx.send(result);
    }

    /// Resolve every in-flight call to `err`.
    async fn fail_all(&self, err: &CallError) {
        let drained: Vec<_> = self.slots.lock().await.drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "failing in-flight calls");
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(err.clone()));
        }
    }
}

/// Commands from handles to the link task.
enum Command {
    Connect,
    Disconnect,
    Emit { frame: WireFrame, done: oneshot::Sender<Result<(), TransportError>> },
}

/// Handle to the process-wide connection.
///
/// Cloning is cheap and every clone talks to the same link task.
#[derive(Clone)]
pub struct Transport {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<LinkStatus>,
    pushes: broadcast::Sender<PushFrame>,
    pending: Arc<PendingCalls>,
    seq: Arc<AtomicU64>,
    config: TransportConfig,
}

impl Transport {
    /// Spawn the link task and return its handle.
    ///
    /// The connection starts disconnected; call [`Transport::connect`] to
    /// begin dialing.
    pub fn spawn<C: Connector>(connector: C, config: TransportConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::Disconnected);
        let (pushes, _) = broadcast::channel(PUSH_BUFFER);
        let pending = Arc::new(PendingCalls::default());

        tokio::spawn(run_link(
            connector,
            config.clone(),
            cmd_rx,
            status_tx,
            pushes.clone(),
            Arc::clone(&pending),
        ));

        Self { cmd_tx, status_rx, pushes, pending, seq: Arc::new(AtomicU64::new(1)), config }
    }

    /// Begin connecting. No-op while already connecting or connected.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Tear down the connection and cancel any pending reconnect. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Send a frame to the server.
    ///
    /// Fails fast with [`TransportError::NotConnected`] when there is no
    /// live socket; nothing is queued for later retry.
    pub async fn emit(&self, frame: WireFrame) -> Result<(), TransportError> {
        let (done, wait) = oneshot::channel();
        self.cmd_tx.send(Command::Emit { frame, done }).map_err(|_| TransportError::Stopped)?;
        wait.await.map_err(|_| TransportError::Stopped)?
    }

    /// Watch the connection status.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    /// Wait until the connection reaches `status`.
    pub async fn wait_for(&self, status: LinkStatus) -> Result<(), TransportError> {
        let mut rx = self.status_rx.clone();
        rx.wait_for(|s| *s == status).await.map(|_| ()).map_err(|_| TransportError::Stopped)
    }

    /// Subscribe to inbound push events.
    ///
    /// Registrations are additive: every subscriber receives every push.
    pub fn subscribe_pushes(&self) -> broadcast::Receiver<PushFrame> {
        self.pushes.subscribe()
    }

    /// This transport's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Next call sequence number.
    pub(crate) fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// The shared in-flight call table.
    pub(crate) fn pending(&self) -> &PendingCalls {
        &self.pending
    }
}

/// Receive the next inbound frame, or park forever when no socket is live.
async fn next_frame(socket: &mut Option<Socket>) -> Option<WireFrame> {
    match socket.as_mut() {
        Some(s) => s.inbound.recv().await,
        None => std::future::pending().await,
    }
}

/// Dial once, updating status. Returns true on success.
async fn dial<C: Connector>(
    connector: &mut C,
    config: &TransportConfig,
    status_tx: &watch::Sender<LinkStatus>,
    socket: &mut Option<Socket>,
) -> bool {
    let _ = status_tx.send(LinkStatus::Connecting);
    match connector.connect(&config.endpoint).await {
        Ok(s) => {
            *socket = Some(s);
            let _ = status_tx.send(LinkStatus::Connected);
            tracing::info!(endpoint = %config.endpoint, "link established");
            true
        },
        Err(e) => {
            tracing::warn!(endpoint = %config.endpoint, error = %e, "dial failed");
            false
        },
    }
}

/// The link task: owns the socket, serializes connects and reconnects,
/// routes acks to pending calls and pushes to subscribers.
async fn run_link<C: Connector>(
    mut connector: C,
    config: TransportConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<LinkStatus>,
    pushes: broadcast::Sender<PushFrame>,
    pending: Arc<PendingCalls>,
) {
    // True from connect() until disconnect() or a non-retried failure.
    let mut want_link = false;
    let mut socket: Option<Socket> = None;
    let mut retry: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None => break,

                Some(Command::Connect) => {
                    if want_link {
                        // Already connecting or connected.
                        continue;
                    }
                    want_link = true;
                    if !dial(&mut connector, &config, &status_tx, &mut socket).await {
                        if config.auto_reconnect {
                            retry = Some(Box::pin(sleep(config.reconnect_delay)));
                        } else {
                            want_link = false;
                            let _ = status_tx.send(LinkStatus::Disconnected);
                        }
                    }
                },

                Some(Command::Disconnect) => {
                    want_link = false;
                    retry = None;
                    socket = None;
                    let _ = status_tx.send(LinkStatus::Disconnected);
                    pending.fail_all(&CallError::Disconnected).await;
                },

                Some(Command::Emit { frame, done }) => {
                    let result = match socket.as_ref() {
                        Some(s) => {
                            s.outbound.send(frame).await.map_err(|_| TransportError::NotConnected)
                        },
                        None => Err(TransportError::NotConnected),
                    };
                    let _ = done.send(result);
                },
            },

            frame = next_frame(&mut socket), if socket.is_some() => match frame {
                Some(WireFrame::Ack { seq, error, data }) => {
                    pending.resolve(seq, AckBody::from_slots(error, data)).await;
                },
                Some(WireFrame::Push { event, data }) => {
                    let _ = pushes.send(PushFrame { event, data });
                },
                Some(WireFrame::Call { seq, .. }) => {
                    tracing::warn!(seq, "server sent a call frame; ignoring");
                },
                None => {
                    // Socket closed under us.
                    socket = None;
                    let _ = status_tx.send(LinkStatus::Disconnected);
                    pending.fail_all(&CallError::Disconnected).await;
                    if want_link && config.auto_reconnect {
                        tracing::info!(
                            delay = ?config.reconnect_delay,
                            "link lost, reconnect scheduled"
                        );
                        let _ = status_tx.send(LinkStatus::Connecting);
                        retry = Some(Box::pin(sleep(config.reconnect_delay)));
                    } else {
                        want_link = false;
                    }
                },
            },

            () = async {
                if let Some(timer) = retry.as_mut() {
                    timer.as_mut().await;
                }
            }, if retry.is_some() => {
                retry = None;
                if want_link
                    && socket.is_none()
                    && !dial(&mut connector, &config, &status_tx, &mut socket).await
                {
                    // Unbounded fixed-delay retries.
                    retry = Some(Box::pin(sleep(config.reconnect_delay)));
                }
            },
        }
    }
}

/// Production connector: dials a WebSocket endpoint and bridges it to frame
/// channels via a spawned I/O task.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    async fn connect(&mut self, endpoint: &Url) -> Result<Socket, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<WireFrame>(FRAME_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<WireFrame>(FRAME_BUFFER);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = out_rx.recv() => match frame {
                        Some(frame) => match frame.encode() {
                            Ok(text) => {
                                if sink.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            },
                            Err(e) => tracing::warn!(error = %e, "dropping unencodable frame"),
                        },
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        },
                    },
                    msg = source.next() => match msg {
                        Some(Ok(Message::Text(text))) => match WireFrame::decode(&text) {
                            Ok(frame) => {
                                if in_tx.send(frame).await.is_err() {
                                    break;
                                }
                            },
                            Err(e) => tracing::warn!(error = %e, "ignoring undecodable frame"),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        // Binary, ping and pong are not part of this protocol.
                        Some(Ok(_)) => {},
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "socket read failed");
                            break;
                        },
                    },
                }
            }
        });

        Ok(Socket { outbound: out_tx, inbound: in_rx })
    }
}
