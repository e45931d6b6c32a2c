//! Observable conversation state types.
//!
//! These structures are the view model screens render from: per-conversation
//! message lists plus the derived per-message run markers. They contain no
//! protocol mechanics; the [`crate::Inbox`] owns all mutation.

use courier_proto::{
    CallRef,
    payloads::{
        message::{ContentKind, MessageRecord},
        session::UserProfile,
    },
};

/// Which side of the conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by this client.
    Outbound,
    /// Received from a peer.
    Inbound,
}

/// Delivery state of a message in the local list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Optimistic local entry; the send is still in flight.
    Pending,
    /// Acknowledged by the server (or delivered by it).
    Confirmed,
    /// The send failed; kept in place so the user can retry.
    Failed,
}

/// A message in a conversation's ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique id within the conversation. Server-assigned once confirmed;
    /// locally generated for optimistic entries.
    pub id: String,
    /// Owning conversation.
    pub conversation: String,
    /// Sender identity.
    pub sender: UserProfile,
    /// Content type.
    pub kind: ContentKind,
    /// Message body.
    pub content: String,
    /// Unix milliseconds. Server clock for confirmed messages, local clock
    /// for optimistic entries.
    pub timestamp: u64,
    /// Which side sent it.
    pub direction: Direction,
    /// Delivery state.
    pub delivery: Delivery,
    /// Correlation reference for messages this client sent.
    pub client_ref: Option<CallRef>,
}

impl Message {
    /// Build the local view of a server-delivered record.
    ///
    /// Direction is derived by comparing the sender against our own user id;
    /// anything the server delivers is `Confirmed`.
    pub fn from_record(record: MessageRecord, my_user_id: Option<&str>) -> Self {
        let direction = if my_user_id.is_some_and(|me| me == record.sender.id) {
            Direction::Outbound
        } else {
            Direction::Inbound
        };
        Self {
            id: record.id,
            conversation: record.conversation,
            sender: record.sender,
            kind: record.kind,
            content: record.content,
            timestamp: record.timestamp,
            direction,
            delivery: Delivery::Confirmed,
            client_ref: record.client_ref,
        }
    }
}

/// Load phase of a conversation's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPhase {
    /// Nothing requested yet.
    #[default]
    Empty,
    /// History request in flight.
    Loading,
    /// History loaded; the list is live.
    Ready,
}

/// Per-conversation state.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Conversation id.
    pub id: String,
    /// History load phase.
    pub phase: LoadPhase,
    /// Messages in arrival order. Arrival order is what the UI renders;
    /// timestamps are display metadata only.
    pub messages: Vec<Message>,
    /// Messages arrived while the conversation was not active.
    pub unread: u32,
    /// Timestamp of the latest activity, Unix milliseconds.
    pub last_activity: Option<u64>,
}

impl Conversation {
    /// Create empty conversation state.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phase: LoadPhase::default(),
            messages: Vec::new(),
            unread: 0,
            last_activity: None,
        }
    }

    /// Index of the message with `id`, if present.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Index of the message carrying `client_ref`, if present.
    pub fn position_of_ref(&self, client_ref: CallRef) -> Option<usize> {
        self.messages.iter().position(|m| m.client_ref == Some(client_ref))
    }

    /// Record activity at `timestamp`.
    pub fn touch(&mut self, timestamp: u64) {
        self.last_activity = Some(self.last_activity.map_or(timestamp, |t| t.max(timestamp)));
    }

    /// Render snapshot with derived run markers.
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation: self.id.clone(),
            phase: self.phase,
            messages: render_with_runs(&self.messages),
            unread: self.unread,
        }
    }
}

/// A message plus its derived run markers, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// The message itself.
    pub message: Message,
    /// Predecessor has a different sender (or none exists).
    pub first_in_run: bool,
    /// Successor has a different sender (or none exists).
    pub last_in_run: bool,
}

/// Compute same-sender run markers for a list in final order.
///
/// Pure function of the list; recomputed on every change rather than stored,
/// so the markers can never drift from the order they describe.
pub fn render_with_runs(messages: &[Message]) -> Vec<RenderedMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            let first_in_run =
                i == 0 || messages[i - 1].sender.id != message.sender.id;
            let last_in_run =
                i + 1 == messages.len() || messages[i + 1].sender.id != message.sender.id;
            RenderedMessage { message: message.clone(), first_in_run, last_in_run }
        })
        .collect()
}

/// Snapshot handed to subscribers on every change.
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    /// Conversation id.
    pub conversation: String,
    /// History load phase.
    pub phase: LoadPhase,
    /// Messages with derived run markers, arrival order.
    pub messages: Vec<RenderedMessage>,
    /// Unread counter.
    pub unread: u32,
}

impl ConversationSnapshot {
    /// Snapshot of a conversation nothing is known about yet.
    pub fn empty(conversation: impl Into<String>) -> Self {
        Self {
            conversation: conversation.into(),
            phase: LoadPhase::Empty,
            messages: Vec::new(),
            unread: 0,
        }
    }
}
