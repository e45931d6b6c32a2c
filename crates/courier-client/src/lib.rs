//! Client core for Courier.
//!
//! Everything between the wire protocol and the conversation state: the
//! single persistent connection, the request/response correlation layered on
//! it, and the process-scoped session identity.
//!
//! # Architecture
//!
//! One [`Transport`] is created at application start and injected into
//! every component that needs the connection; handles are cheap clones over
//! a single link task, so there is never a second socket and never ambient
//! global state. [`Caller`] turns emitted events into awaitable calls with
//! exactly-once resolution; [`Session`] runs the `user` namespace over it.
//!
//! # Components
//!
//! - [`Transport`]: connection lifecycle, reconnects, push fan-out
//! - [`Caller`]: awaitable `"namespace/action"` calls
//! - [`Session`]: login/register/token-restore/logout, identity watch
//! - [`TokenStore`]: seam to the external persisted key-value collaborator
//! - [`testing`]: in-memory connector for deterministic tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod caller;
mod error;
mod session;
mod store;
pub mod testing;
pub mod transport;

pub use caller::Caller;
pub use error::CallError;
pub use session::{CLIENT_FLAVOR, Identity, Session, SessionState};
pub use store::{MemoryTokenStore, StoreError, TokenStore};
pub use transport::{
    Connector, LinkStatus, PushFrame, Socket, Transport, TransportConfig, TransportError,
    WsConnector,
};
