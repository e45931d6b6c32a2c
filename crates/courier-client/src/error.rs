//! Error types for the client layer.
//!
//! Every failure a call can hit (server-reported, transport-level, local
//! validation) funnels into [`CallError`] so callers have exactly one
//! handling path. Errors are values returned from calls, never panics; the
//! worst outcome anywhere in this crate is a resolved error.

use std::time::Duration;

use courier_proto::ProtocolError;
use thiserror::Error;

/// Unified call failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Server-reported domain failure (invalid credentials, username taken).
    ///
    /// The string is the server's error text, passed through unchanged so
    /// the UI can surface it verbatim.
    #[error("{0}")]
    Domain(String),

    /// The connection dropped before the call was acknowledged, or no
    /// connection existed when the call was made.
    #[error("disconnected")]
    Disconnected,

    /// No acknowledgment arrived within the configured bound.
    #[error("no acknowledgment after {waited:?}")]
    Timeout {
        /// How long the call waited.
        waited: Duration,
    },

    /// Rejected locally before touching the transport.
    #[error("validation: {0}")]
    Validation(String),

    /// The server's reply did not match the expected shape.
    #[error("protocol: {0}")]
    Protocol(String),

    /// The external token store failed.
    #[error("storage: {0}")]
    Storage(String),
}

impl CallError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Connection loss and timeouts are transient. Domain errors, validation
    /// failures, and shape mismatches will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Timeout { .. })
    }
}

impl From<ProtocolError> for CallError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
