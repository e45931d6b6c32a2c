//! Session payload types.
//!
//! Requests and replies for the `user` namespace: credential login,
//! registration, and token-based session restore. All three replies share
//! one shape ([`AuthReply`]).

use serde::{Deserialize, Serialize};

/// Credentials for `user/login` and `user/register`.
///
/// `platform` and `browser` are client metadata the server logs alongside
/// the session; they are not authentication material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Account name.
    pub username: String,
    /// Plaintext password (the connection itself provides transport security).
    pub password: String,
    /// Client platform identifier (`linux`, `ios`, ...).
    pub platform: String,
    /// Client flavor identifier.
    pub browser: String,
}

/// Payload for `user/loginByToken`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLoginRequest {
    /// Opaque token from a previous [`AuthReply`].
    pub token: String,
}

/// Identity subset the server attaches to replies and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Server-assigned user id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub username: String,
}

/// Success payload for all three `user` namespace calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthReply {
    /// Opaque session token to persist for `user/loginByToken`.
    pub token: String,
    /// The authenticated identity.
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_reply_accepts_mongo_style_id() {
        let json = r#"{"token":"t1","user":{"_id":"u1","username":"alice"}}"#;
        let reply: AuthReply = serde_json::from_str(json).unwrap();

        assert_eq!(reply.user.id, "u1");
        assert_eq!(reply.token, "t1");
    }

    #[test]
    fn user_profile_username_defaults_empty() {
        let profile: UserProfile = serde_json::from_str(r#"{"id":"u2"}"#).unwrap();
        assert_eq!(profile.username, "");
    }

    #[test]
    fn auth_request_round_trip() {
        let req = AuthRequest {
            username: "alice".to_owned(),
            password: "secret".to_owned(),
            platform: "linux".to_owned(),
            browser: "courier-cli".to_owned(),
        };

        let value = serde_json::to_value(&req).unwrap();
        let back: AuthRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }
}
