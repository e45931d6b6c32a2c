//! Folding inbound pushes into conversation state.
//!
//! The [`Inbox`] is the single authoritative owner of every conversation's
//! message list. It is a pure state machine: events in, changed conversation
//! ids out, no I/O. All mutation happens through [`Inbox::apply`] in arrival
//! order, which is the only ordering the lists ever reflect.
//!
//! # Invariants
//!
//! - Each message id appears at most once per conversation, regardless of
//!   duplicate delivery. The authoritative (server-delivered) instance's
//!   fields win.
//! - Replaying the same bulk history load is idempotent.
//! - Optimistic local entries are replaced in place (list position kept),
//!   never duplicated and never silently removed.

use std::collections::{HashMap, HashSet};

use courier_proto::{
    ProtocolError, PushKind, payloads,
    payloads::message::{HistoryPage, MessageRecord, PresenceUpdate},
};
use serde_json::Value;

use crate::state::{Conversation, Delivery, Direction, LoadPhase, Message};

/// An input to the fold.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Bulk history delivery: wholesale list replacement.
    HistoryLoaded(HistoryPage),
    /// A single new message.
    MessageArrived(MessageRecord),
    /// A peer's presence changed.
    PresenceChanged(PresenceUpdate),
}

impl StreamEvent {
    /// Decode a transport push into a stream event.
    ///
    /// Returns `Ok(None)` for push events this client version does not
    /// understand; they are skipped, not fatal.
    pub fn from_push(event: &str, data: Value) -> Result<Option<Self>, ProtocolError> {
        match PushKind::from_name(event) {
            PushKind::NewMessage => {
                Ok(Some(Self::MessageArrived(payloads::from_value(event, data)?)))
            },
            PushKind::PreviousMessages => {
                Ok(Some(Self::HistoryLoaded(payloads::from_value(event, data)?)))
            },
            PushKind::Presence => {
                Ok(Some(Self::PresenceChanged(payloads::from_value(event, data)?)))
            },
            PushKind::Unknown(_) => Ok(None),
        }
    }
}

/// Authoritative fold state: all conversations plus presence.
#[derive(Debug, Default)]
pub struct Inbox {
    /// Our own user id, for deriving message direction.
    me: Option<String>,
    /// Conversation currently on screen; its arrivals do not count as unread.
    active: Option<String>,
    conversations: HashMap<String, Conversation>,
    online: HashSet<String>,
}

impl Inbox {
    /// Empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity used to derive message direction.
    pub fn set_identity(&mut self, user_id: Option<String>) {
        self.me = user_id;
    }

    /// Mark a conversation active, clearing its unread counter.
    pub fn set_active(&mut self, conversation: Option<&str>) {
        self.active = conversation.map(str::to_owned);
        if let Some(conv) = conversation.and_then(|id| self.conversations.get_mut(id)) {
            conv.unread = 0;
        }
    }

    /// Look up a conversation.
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Get or create a conversation.
    pub fn ensure_conversation(&mut self, id: &str) -> &mut Conversation {
        self.conversations.entry(id.to_owned()).or_insert_with(|| Conversation::new(id))
    }

    /// User ids currently online.
    pub fn online(&self) -> &HashSet<String> {
        &self.online
    }

    /// Apply one event, returning the ids of changed conversations.
    pub fn apply(&mut self, event: StreamEvent) -> Vec<String> {
        match event {
            StreamEvent::HistoryLoaded(page) => self.apply_history(page),
            StreamEvent::MessageArrived(record) => self.apply_arrival(record),
            StreamEvent::PresenceChanged(update) => {
                if update.online {
                    self.online.insert(update.user.id);
                } else {
                    self.online.remove(&update.user.id);
                }
                Vec::new()
            },
        }
    }

    /// Wholesale list replacement from a history page.
    ///
    /// Idempotent: the page is keyed by id, so replaying it reproduces the
    /// same list. Unconfirmed local entries not covered by the page are
    /// retained after it, preserving their arrival order.
    fn apply_history(&mut self, page: HistoryPage) -> Vec<String> {
        let me = self.me.clone();
        let conversation_id = page.conversation.clone();
        let conv = self.ensure_conversation(&conversation_id);

        let mut seen = HashSet::new();
        let mut fresh: Vec<Message> = Vec::with_capacity(page.messages.len());
        for record in page.messages {
            if seen.insert(record.id.clone()) {
                fresh.push(Message::from_record(record, me.as_deref()));
            }
        }
        let page_refs: HashSet<_> = fresh.iter().filter_map(|m| m.client_ref).collect();

        // Keep optimistic entries the page does not already cover.
        let previous = std::mem::take(&mut conv.messages);
        for existing in previous {
            let covered = seen.contains(&existing.id)
                || existing.client_ref.is_some_and(|r| page_refs.contains(&r));
            if existing.delivery != Delivery::Confirmed && !covered {
                fresh.push(existing);
            }
        }

        if let Some(latest) = fresh.iter().map(|m| m.timestamp).max() {
            conv.touch(latest);
        }
        conv.messages = fresh;
        conv.phase = LoadPhase::Ready;

        vec![conversation_id]
    }

    /// Append or reconcile a single arrived message.
    fn apply_arrival(&mut self, record: MessageRecord) -> Vec<String> {
        let me = self.me.clone();
        let active = self.active.clone();
        let conversation_id = record.conversation.clone();
        let conv = self.ensure_conversation(&conversation_id);
        let incoming = Message::from_record(record, me.as_deref());
        conv.touch(incoming.timestamp);

        // Duplicate delivery: same id already present, authoritative wins.
        if let Some(pos) = conv.position_of(&incoming.id) {
            conv.messages[pos] = incoming;
            return vec![conversation_id];
        }

        // Exact echo of an optimistic entry, matched by correlation ref.
        if let Some(pos) = incoming.client_ref.and_then(|r| conv.position_of_ref(r)) {
            conv.messages[pos] = incoming;
            return vec![conversation_id];
        }

        // No shared ref: best-effort match against unconfirmed outbound
        // entries with the same content, closest local timestamp.
        if incoming.direction == Direction::Outbound {
            let candidate = conv
                .messages
                .iter()
                .enumerate()
                .filter(|(_, m)| {
                    m.direction == Direction::Outbound
                        && m.delivery != Delivery::Confirmed
                        && m.kind == incoming.kind
                        && m.content == incoming.content
                })
                .min_by_key(|(_, m)| m.timestamp.abs_diff(incoming.timestamp))
                .map(|(pos, _)| pos);
            if let Some(pos) = candidate {
                conv.messages[pos] = incoming;
                return vec![conversation_id];
            }
        }

        if incoming.direction == Direction::Inbound
            && active.as_deref() != Some(conversation_id.as_str())
        {
            conv.unread = conv.unread.saturating_add(1);
        }
        conv.messages.push(incoming);
        vec![conversation_id]
    }
}
