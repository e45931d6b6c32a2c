//! Message payload types.
//!
//! The `message` namespace plus the push payloads that deliver messages back:
//! single new-message pushes and bulk history pages.

use serde::{Deserialize, Serialize};

use super::session::UserProfile;
use crate::ids::CallRef;

/// Content type of a message.
///
/// Image messages carry the URL of already-uploaded content; the upload
/// itself happens over a separate HTTP endpoint outside this protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Plain text.
    Text,
    /// URL reference to uploaded image content.
    Image,
}

/// Payload for `message/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Target conversation id.
    pub to: String,
    /// Content type.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Message body (text, or an uploaded-content URL).
    pub content: String,
    /// Client correlation reference, echoed by the server so the optimistic
    /// local entry can be matched exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<CallRef>,
}

/// Success payload for `message/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Server-assigned message id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Echo of the request's correlation reference, when the server supports
    /// it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<CallRef>,
}

/// A message as the server represents it.
///
/// Delivered one at a time via `newMessage` pushes and in bulk via
/// `previousMessages` pushes or `message/history` replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Server-assigned id, unique within the conversation.
    #[serde(alias = "_id")]
    pub id: String,
    /// Conversation this message belongs to.
    #[serde(alias = "to")]
    pub conversation: String,
    /// Who sent it.
    pub sender: UserProfile,
    /// Content type.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Message body.
    pub content: String,
    /// Server timestamp, Unix milliseconds.
    pub timestamp: u64,
    /// Echoed correlation reference for messages this client sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<CallRef>,
}

/// Payload for `message/history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Conversation to load.
    pub conversation: String,
}

/// Bulk history payload: `message/history` reply and `previousMessages` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Conversation the page belongs to.
    pub conversation: String,
    /// Messages in server order, oldest first.
    pub messages: Vec<MessageRecord>,
}

/// Payload of a `presence` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// The peer whose status changed.
    pub user: UserProfile,
    /// True when the peer came online.
    pub online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> MessageRecord {
        MessageRecord {
            id: id.to_owned(),
            conversation: "general".to_owned(),
            sender: UserProfile { id: "u1".to_owned(), username: "alice".to_owned() },
            kind: ContentKind::Text,
            content: "hello".to_owned(),
            timestamp: 1_700_000_000_000,
            client_ref: None,
        }
    }

    #[test]
    fn send_request_uses_wire_field_names() {
        let req = SendMessageRequest {
            to: "general".to_owned(),
            kind: ContentKind::Text,
            content: "hi".to_owned(),
            client_ref: None,
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""type":"text""#));
        assert!(json.contains(r#""to":"general""#));
        assert!(!json.contains("client_ref"));
    }

    #[test]
    fn record_accepts_server_aliases() {
        let json = r#"{
            "_id": "m1",
            "to": "general",
            "sender": {"_id": "u1", "username": "alice"},
            "type": "image",
            "content": "https://cdn.example/pic.png",
            "timestamp": 1700000000000
        }"#;

        let rec: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.id, "m1");
        assert_eq!(rec.conversation, "general");
        assert_eq!(rec.kind, ContentKind::Image);
        assert!(rec.client_ref.is_none());
    }

    #[test]
    fn history_page_round_trip() {
        let page = HistoryPage {
            conversation: "general".to_owned(),
            messages: vec![record("m1"), record("m2")],
        };

        let value = serde_json::to_value(&page).unwrap();
        let back: HistoryPage = serde_json::from_value(value).unwrap();
        assert_eq!(back, page);
    }
}
