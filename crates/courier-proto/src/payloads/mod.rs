//! Typed event payloads.
//!
//! Frames carry untyped JSON (`serde_json::Value`); these structs give every
//! known event a concrete shape. The event name identifies the payload type,
//! so payloads serialize without any tag of their own.
//!
//! Field names follow the server contract, including its MongoDB-flavored
//! `_id` spelling (accepted via serde alias, emitted as `id`).

pub mod message;
pub mod session;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// Serialize a typed payload into a frame's data slot.
pub fn to_value<T: Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Deserialize a frame's data slot into a typed payload.
///
/// `event` is only used to label the error.
pub fn from_value<T: DeserializeOwned>(event: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ProtocolError::PayloadMismatch {
        event: event.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{session::UserProfile, *};

    #[test]
    fn from_value_labels_the_event() {
        let err = from_value::<UserProfile>("user/login", json!(42)).unwrap_err();

        assert!(matches!(
            err,
            ProtocolError::PayloadMismatch { ref event, .. } if event == "user/login"
        ));
    }
}
