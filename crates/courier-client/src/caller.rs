//! Request/response correlation.
//!
//! Turns fire-and-forget frame emission into awaitable calls. Each call
//! registers a single-shot slot keyed by sequence number, emits a `call`
//! frame, and resolves exactly once: from the server's ack, from the
//! configured timeout, or from a link drop.
//!
//! # Invariants
//!
//! - Exactly one resolution per call. Late acks after a timeout reclaim are
//!   dropped by the link task; a second resolution is structurally
//!   impossible because resolving consumes the slot.
//! - No slot outlives its call: timeout and emit failure both reclaim the
//!   registered slot, so abandoned calls are not a leak.

use courier_proto::{EventName, WireFrame, payloads};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::{error::CallError, transport::Transport};

/// Awaitable calls over the shared transport.
///
/// Cheap to clone; all clones correlate against the same connection.
#[derive(Clone)]
pub struct Caller {
    transport: Transport,
}

impl Caller {
    /// Build a caller over the given transport.
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// The underlying transport handle.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Issue a `"{namespace}/{action}"` call and await its resolution.
    ///
    /// Resolves to the server's success payload, or to exactly one
    /// [`CallError`]: `Domain` for server-reported failures, `Disconnected`
    /// when the link drops (or does not exist) before the ack, `Timeout`
    /// when no ack arrives within the configured bound.
    pub async fn call(
        &self,
        namespace: &str,
        action: &str,
        data: Value,
    ) -> Result<Value, CallError> {
        let event = EventName::new(namespace, action)?;
        let seq = self.transport.next_seq();

        let (tx, rx) = oneshot::channel();
        self.transport.pending().register(seq, tx).await;

        let frame = WireFrame::Call { seq, event: event.to_string(), data };
        if let Err(e) = self.transport.emit(frame).await {
            self.transport.pending().discard(seq).await;
            tracing::debug!(%event, seq, error = %e, "call failed to send");
            return Err(CallError::Disconnected);
        }

        let timeout = self.transport.config().call_timeout;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(resolution)) => resolution,
            // The link task dropped the slot without resolving: shutdown.
            Ok(Err(_)) => Err(CallError::Disconnected),
            Err(_) => {
                self.transport.pending().discard(seq).await;
                tracing::warn!(%event, seq, ?timeout, "call timed out waiting for ack");
                Err(CallError::Timeout { waited: timeout })
            },
        }
    }

    /// Typed variant of [`Caller::call`]: serializes the request and
    /// deserializes the success payload.
    pub async fn call_typed<Req, Resp>(
        &self,
        namespace: &str,
        action: &str,
        request: &Req,
    ) -> Result<Resp, CallError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let data = payloads::to_value(request)?;
        let reply = self.call(namespace, action, data).await?;
        let event = format!("{namespace}/{action}");
        Ok(payloads::from_value(&event, reply)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_event_is_a_protocol_error() {
        // Constructing the event name fails before any slot is registered,
        // so a bad namespace never touches the transport.
        let err = EventName::new("user/extra", "login").unwrap_err();
        assert!(matches!(CallError::from(err), CallError::Protocol(_)));
    }
}
