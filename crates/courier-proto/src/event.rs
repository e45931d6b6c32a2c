//! Event names.
//!
//! Request events are composite `"namespace/action"` names (`user/login`,
//! `message/send`). Push events are plain names chosen by the server
//! (`newMessage`, `previousMessages`). The two namespaces never mix: a push
//! name containing `/` is simply an unknown push.

use std::{fmt, str::FromStr};

use crate::errors::{ProtocolError, Result};

/// Composite request event name, rendered `"namespace/action"` on the wire.
///
/// # Invariants
///
/// Both parts are non-empty and contain no `/`. Construction and parsing
/// enforce this, so a held `EventName` always round-trips through its
/// `Display` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventName {
    namespace: String,
    action: String,
}

impl EventName {
    /// Build an event name from its parts.
    pub fn new(namespace: &str, action: &str) -> Result<Self> {
        if namespace.is_empty() || action.is_empty() {
            return Err(ProtocolError::MalformedEventName(format!("{namespace}/{action}")));
        }
        if namespace.contains('/') || action.contains('/') {
            return Err(ProtocolError::MalformedEventName(format!("{namespace}/{action}")));
        }
        Ok(Self { namespace: namespace.to_owned(), action: action.to_owned() })
    }

    /// Parse a `"namespace/action"` string.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(ns), Some(action)) => Self::new(ns, action),
            _ => Err(ProtocolError::MalformedEventName(raw.to_owned())),
        }
    }

    /// Namespace part (`user`, `message`).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Action part (`login`, `send`).
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.action)
    }
}

impl FromStr for EventName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Known server push events.
///
/// Push frames carry a plain event name; anything not listed here is
/// surfaced as [`PushKind::Unknown`] so handlers can log and skip it without
/// tearing down the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushKind {
    /// A single newly delivered message.
    NewMessage,
    /// Bulk delivery of a conversation's history.
    PreviousMessages,
    /// A peer's online/offline transition.
    Presence,
    /// Push event this client version does not understand.
    Unknown(String),
}

impl PushKind {
    /// Wire name for a new-message push.
    pub const NEW_MESSAGE: &'static str = "newMessage";
    /// Wire name for a history push.
    pub const PREVIOUS_MESSAGES: &'static str = "previousMessages";
    /// Wire name for a presence push.
    pub const PRESENCE: &'static str = "presence";

    /// Classify a push event name.
    pub fn from_name(name: &str) -> Self {
        match name {
            Self::NEW_MESSAGE => Self::NewMessage,
            Self::PREVIOUS_MESSAGES => Self::PreviousMessages,
            Self::PRESENCE => Self::Presence,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// Wire name for this push kind.
    pub fn name(&self) -> &str {
        match self {
            Self::NewMessage => Self::NEW_MESSAGE,
            Self::PreviousMessages => Self::PREVIOUS_MESSAGES,
            Self::Presence => Self::PRESENCE,
            Self::Unknown(name) => name,
        }
    }
}
