//! Application layer for Courier.
//!
//! The conversation state machine and the view model screens bind to,
//! decoupled from I/O: the [`Inbox`] folds events into per-conversation
//! message lists as pure state, and [`Chat`] mediates between that state,
//! the request correlator, and subscribers.
//!
//! # Components
//!
//! - [`Inbox`]: authoritative per-conversation message lists (dedup,
//!   reconciliation, unread tracking)
//! - [`Chat`]: consumer-facing API (send, subscribe, history)
//! - [`state`] types: [`Message`], [`Conversation`], derived run markers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chat;
pub mod state;
mod stream;

pub use chat::Chat;
pub use state::{
    Conversation, ConversationSnapshot, Delivery, Direction, LoadPhase, Message, RenderedMessage,
    render_with_runs,
};
pub use stream::{Inbox, StreamEvent};
