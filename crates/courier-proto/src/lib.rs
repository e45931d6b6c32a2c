//! Wire protocol for the Courier chat client.
//!
//! Courier speaks a text-frame event protocol over a single persistent
//! connection: named request events acknowledged exactly once by the server,
//! and unsolicited push events. Frames are JSON objects tagged by a `frame`
//! field (see [`WireFrame`]).
//!
//! # Components
//!
//! - [`WireFrame`]: the three frame shapes (Call, Ack, Push)
//! - [`EventName`]: composite `"namespace/action"` request event names
//! - [`PushKind`]: the known server push events
//! - [`payloads`]: typed payload structs for every known event
//!
//! The server side of this contract is an external collaborator; this crate
//! only defines the shapes both ends agree on.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod event;
mod frame;
mod ids;
pub mod payloads;

pub use errors::ProtocolError;
pub use event::{EventName, PushKind};
pub use frame::{AckBody, WireFrame};
pub use ids::CallRef;
