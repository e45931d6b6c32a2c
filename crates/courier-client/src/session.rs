//! Session state.
//!
//! Holds the authenticated identity for the lifetime of the process. The
//! session is created once at startup and injected wherever it is needed;
//! it survives screen navigation and transport reconnects, and is cleared
//! only by explicit logout.
//!
//! All operations return the uniform two-shape result ([`CallError`] or a
//! typed payload); server error strings pass through unchanged so the UI
//! can show them as field-level errors.

use std::sync::Arc;

use courier_proto::payloads::session::{AuthReply, AuthRequest, TokenLoginRequest, UserProfile};
use tokio::sync::watch;

use crate::{caller::Caller, error::CallError, store::TokenStore};

/// Client flavor reported to the server alongside credentials.
pub const CLIENT_FLAVOR: &str = "courier-rs";

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Server-assigned user id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Opaque session token.
    pub token: String,
}

/// Current session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No authenticated identity; the connection may still be used
    /// anonymously.
    #[default]
    Anonymous,
    /// Logged in.
    Authenticated(Identity),
}

impl SessionState {
    /// The authenticated identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(identity) => Some(identity),
        }
    }
}

/// Session operations over the `user` namespace.
pub struct Session {
    caller: Caller,
    store: Arc<dyn TokenStore>,
    state_tx: watch::Sender<SessionState>,
}

impl Session {
    /// Build a session over the given caller and token store.
    pub fn new(caller: Caller, store: Arc<dyn TokenStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Anonymous);
        Self { caller, store, state_tx }
    }

    /// Watch the session state.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Log in with credentials.
    ///
    /// Empty fields are rejected locally without touching the transport.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, CallError> {
        self.authenticate("login", username, password).await
    }

    /// Register a new account. Same contract as [`Session::login`].
    pub async fn register(&self, username: &str, password: &str) -> Result<Identity, CallError> {
        self.authenticate("register", username, password).await
    }

    /// Exchange a previously persisted token for a live session.
    pub async fn restore(&self, token: &str) -> Result<Identity, CallError> {
        if token.is_empty() {
            return Err(CallError::Validation("token is required".to_owned()));
        }
        let request = TokenLoginRequest { token: token.to_owned() };
        let reply: AuthReply = self.caller.call_typed("user", "loginByToken", &request).await?;
        self.capture(reply).await
    }

    /// Clear the in-memory identity and the persisted token.
    ///
    /// The transport is left alone; reconnecting as anonymous is allowed.
    pub async fn logout(&self) -> Result<(), CallError> {
        self.state_tx.send_replace(SessionState::Anonymous);
        self.store.clear().await.map_err(|e| CallError::Storage(e.to_string()))
    }

    async fn authenticate(
        &self,
        action: &str,
        username: &str,
        password: &str,
    ) -> Result<Identity, CallError> {
        if username.is_empty() {
            return Err(CallError::Validation("username is required".to_owned()));
        }
        if password.is_empty() {
            return Err(CallError::Validation("password is required".to_owned()));
        }

        let request = AuthRequest {
            username: username.to_owned(),
            password: password.to_owned(),
            platform: std::env::consts::OS.to_owned(),
            browser: CLIENT_FLAVOR.to_owned(),
        };
        let reply: AuthReply = self.caller.call_typed("user", action, &request).await?;
        self.capture(reply).await
    }

    /// Capture a successful auth reply: persist the token, publish the
    /// identity.
    async fn capture(&self, reply: AuthReply) -> Result<Identity, CallError> {
        let AuthReply { token, user: UserProfile { id, username } } = reply;
        let identity = Identity { user_id: id, username, token };

        self.store
            .save(&identity.token)
            .await
            .map_err(|e| CallError::Storage(e.to_string()))?;
        self.state_tx.send_replace(SessionState::Authenticated(identity.clone()));

        tracing::info!(user_id = %identity.user_id, "session established");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_anonymous() {
        assert_eq!(SessionState::default(), SessionState::Anonymous);
        assert!(SessionState::Anonymous.identity().is_none());
    }

    #[test]
    fn identity_accessor() {
        let identity = Identity {
            user_id: "u1".to_owned(),
            username: "alice".to_owned(),
            token: "t1".to_owned(),
        };
        let state = SessionState::Authenticated(identity.clone());

        assert_eq!(state.identity(), Some(&identity));
    }
}
