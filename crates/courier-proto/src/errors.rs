//! Error types for the Courier wire protocol.
//!
//! Strongly-typed errors for frame and payload handling. We avoid leaking
//! `serde_json::Error` across the crate boundary so callers match on protocol
//! conditions rather than serializer internals.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame or payload could not be serialized to JSON.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Inbound text was not a valid frame.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Request event name is not of the form `namespace/action`.
    #[error("malformed event name: {0:?}")]
    MalformedEventName(String),

    /// Payload did not match the shape expected for the event.
    #[error("payload mismatch for {event}: {reason}")]
    PayloadMismatch {
        /// Event whose payload failed to decode.
        event: String,
        /// Underlying deserialization failure.
        reason: String,
    },
}

/// Convenience alias for protocol results.
pub type Result<T> = std::result::Result<T, ProtocolError>;
