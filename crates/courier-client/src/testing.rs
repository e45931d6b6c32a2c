//! Deterministic in-memory connector.
//!
//! Drives the production link task against a scripted in-process peer
//! instead of a real network, so connection behavior (reconnects, dropped
//! acks, pending-call draining) is testable without sockets or timing
//! luck. The same orchestration code runs in production and in tests; only
//! the [`Connector`] differs.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use courier_proto::WireFrame;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::transport::{Connector, Socket, TransportError};

/// Per-socket frame channel capacity, matching the production connector.
const FRAME_BUFFER: usize = 32;

/// Build a connector/listener pair.
///
/// Hand the [`FakeConnector`] to [`Transport::spawn`](crate::Transport::spawn)
/// and drive the server side through the [`FakeListener`].
pub fn fake_link() -> (FakeConnector, FakeListener) {
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let dials = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));

    let connector = FakeConnector {
        accepted_tx,
        dials: Arc::clone(&dials),
        failures: Arc::clone(&failures),
    };
    let listener = FakeListener { accepted: accepted_rx, dials, failures };
    (connector, listener)
}

/// Connector that accepts in-process instead of dialing a network.
pub struct FakeConnector {
    accepted_tx: mpsc::UnboundedSender<FakePeer>,
    dials: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl Connector for FakeConnector {
    async fn connect(&mut self, _endpoint: &Url) -> Result<Socket, TransportError> {
        self.dials.fetch_add(1, Ordering::SeqCst);

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Connection("scripted dial failure".to_owned()));
        }

        let (out_tx, out_rx) = mpsc::channel(FRAME_BUFFER);
        let (in_tx, in_rx) = mpsc::channel(FRAME_BUFFER);

        let peer = FakePeer { from_client: out_rx, to_client: in_tx };
        self.accepted_tx
            .send(peer)
            .map_err(|_| TransportError::Connection("listener dropped".to_owned()))?;

        Ok(Socket { outbound: out_tx, inbound: in_rx })
    }
}

/// Test-side view of dial attempts and accepted connections.
pub struct FakeListener {
    accepted: mpsc::UnboundedReceiver<FakePeer>,
    dials: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl FakeListener {
    /// Wait for the next accepted connection.
    pub async fn accept(&mut self) -> Option<FakePeer> {
        self.accepted.recv().await
    }

    /// The connection accepted so far, without waiting.
    pub fn try_accept(&mut self) -> Option<FakePeer> {
        self.accepted.try_recv().ok()
    }

    /// Total dial attempts, including scripted failures.
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Make the next `n` dial attempts fail.
    pub fn fail_next_dials(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

/// The server side of one accepted connection.
///
/// Dropping it closes the socket under the client, which is how tests force
/// a mid-call disconnect.
pub struct FakePeer {
    /// Frames the client sent.
    pub from_client: mpsc::Receiver<WireFrame>,
    /// Channel for frames to deliver to the client.
    pub to_client: mpsc::Sender<WireFrame>,
}

impl FakePeer {
    /// Next frame from the client, if the socket is still open.
    pub async fn recv(&mut self) -> Option<WireFrame> {
        self.from_client.recv().await
    }

    /// Next call frame from the client as `(seq, event, data)`.
    ///
    /// Returns `None` when the socket closed or a non-call frame arrived.
    pub async fn recv_call(&mut self) -> Option<(u64, String, Value)> {
        match self.recv().await? {
            WireFrame::Call { seq, event, data } => Some((seq, event, data)),
            _ => None,
        }
    }

    /// Deliver a frame to the client.
    pub async fn send(&self, frame: WireFrame) -> bool {
        self.to_client.send(frame).await.is_ok()
    }

    /// Acknowledge a call successfully.
    pub async fn ack_ok(&self, seq: u64, data: Value) -> bool {
        self.send(WireFrame::Ack { seq, error: None, data: Some(data) }).await
    }

    /// Acknowledge a call with a domain error.
    pub async fn ack_err(&self, seq: u64, reason: &str) -> bool {
        self.send(WireFrame::Ack { seq, error: Some(reason.to_owned()), data: None }).await
    }

    /// Deliver a push event to the client.
    pub async fn push(&self, event: &str, data: Value) -> bool {
        self.send(WireFrame::Push { event: event.to_owned(), data }).await
    }
}
