//! Wire frames.
//!
//! Every WebSocket text message is exactly one JSON object tagged by a
//! `frame` field. Three shapes exist:
//!
//! - `call`: client request, carries a sequence number the server must echo
//! - `ack`: the server's single acknowledgment of a call
//! - `push`: unsolicited server event, no sequence number, no reply
//!
//! # Invariants
//!
//! - Each `call` receives at most one `ack` with the same `seq`.
//! - An `ack` resolves to either an error string or a data payload, never
//!   both (see [`AckBody::from_slots`] for how malformed acks are coerced).
//! - Decoding arbitrary text never panics; invalid input returns an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "camelCase")]
pub enum WireFrame {
    /// Client request expecting exactly one acknowledgment.
    #[serde(rename_all = "camelCase")]
    Call {
        /// Per-connection sequence number correlating the ack.
        seq: u64,
        /// Composite event name, `"namespace/action"`.
        event: String,
        /// Request payload.
        data: Value,
    },

    /// Server acknowledgment of a call.
    #[serde(rename_all = "camelCase")]
    Ack {
        /// Sequence number of the call being acknowledged.
        seq: u64,
        /// Domain error string. Present means the call failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Success payload. Ignored when `error` is present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },

    /// Unsolicited server event.
    #[serde(rename_all = "camelCase")]
    Push {
        /// Plain push event name (`newMessage`, `previousMessages`, ...).
        event: String,
        /// Push payload.
        data: Value,
    },
}

impl WireFrame {
    /// Encode this frame as a JSON text message.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode a text message into a frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// Normalized acknowledgment body: the exactly-once two-shape result.
///
/// The original wire convention is "a string means failure, anything else
/// means success". Modeling it as a sum type makes the never-both /
/// never-neither invariant structural instead of conventional.
#[derive(Debug, Clone, PartialEq)]
pub enum AckBody {
    /// Domain failure reported by the server.
    Err(String),
    /// Success payload (null when the server acked with no body).
    Ok(Value),
}

impl AckBody {
    /// Collapse the two optional ack slots into one result.
    ///
    /// The error slot wins when both are present. An ack carrying neither is
    /// a success with null data.
    pub fn from_slots(error: Option<String>, data: Option<Value>) -> Self {
        match (error, data) {
            (Some(reason), _) => Self::Err(reason),
            (None, Some(value)) => Self::Ok(value),
            (None, None) => Self::Ok(Value::Null),
        }
    }
}
