//! View model flow tests against a scripted server.
//!
//! Covers optimistic sends (success, failure, retry), history loading, and
//! push-driven snapshot updates through the subscribe channel.

use std::time::Duration;

use courier_app::{Chat, Delivery, LoadPhase};
use courier_client::{
    Caller, Identity, LinkStatus, SessionState, Transport, TransportConfig, testing,
};
use courier_proto::payloads::message::ContentKind;
use serde_json::json;
use tokio::sync::watch;
use url::Url;

fn test_config() -> TransportConfig {
    let endpoint = Url::parse("ws://peer.test/").unwrap();
    let mut config = TransportConfig::new(endpoint);
    config.reconnect_delay = Duration::from_millis(20);
    config.call_timeout = Duration::from_millis(200);
    config
}

fn authenticated() -> watch::Receiver<SessionState> {
    let identity = Identity {
        user_id: "u1".to_owned(),
        username: "alice".to_owned(),
        token: "t1".to_owned(),
    };
    let (tx, rx) = watch::channel(SessionState::Authenticated(identity));
    // Keep the sender alive for the duration of the test process.
    std::mem::forget(tx);
    rx
}

async fn connected_chat() -> (Chat, testing::FakePeer) {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    transport.connect();
    let peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();
    (Chat::spawn(Caller::new(transport), authenticated()), peer)
}

#[tokio::test]
async fn send_while_disconnected_keeps_failed_entry() {
    let (connector, _listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    let chat = Chat::spawn(Caller::new(transport), authenticated());

    let rx = chat.subscribe("general").await;
    let err = chat.send("general", "hello?", ContentKind::Text).await.unwrap_err();
    assert!(err.is_transient());

    // The optimistic entry is still there, flagged failed for retry.
    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].message.delivery, Delivery::Failed);
    assert_eq!(snapshot.messages[0].message.content, "hello?");
}

#[tokio::test]
async fn empty_send_is_rejected_before_any_insert() {
    let (connector, _listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    let chat = Chat::spawn(Caller::new(transport), authenticated());

    let rx = chat.subscribe("general").await;
    assert!(chat.send("general", "   ", ContentKind::Text).await.is_err());

    assert!(rx.borrow().messages.is_empty());
}

#[tokio::test]
async fn confirmed_send_adopts_the_server_id() {
    let (chat, mut peer) = connected_chat().await;

    let server = tokio::spawn(async move {
        let (seq, event, data) = peer.recv_call().await.unwrap();
        assert_eq!(event, "message/send");
        assert_eq!(data["to"], "general");
        peer.ack_ok(seq, json!({"id": "srv-1", "client_ref": data["client_ref"]})).await;
        peer
    });

    chat.send("general", "hello", ContentKind::Text).await.unwrap();
    let peer = server.await.unwrap();

    let rx = chat.subscribe("general").await;
    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].message.id, "srv-1");
    assert_eq!(snapshot.messages[0].message.delivery, Delivery::Confirmed);

    // The authoritative echo dedups against the adopted id.
    let mut rx = rx;
    assert!(
        peer.push(
            "newMessage",
            json!({
                "id": "srv-1",
                "conversation": "general",
                "sender": {"id": "u1", "username": "alice"},
                "type": "text",
                "content": "hello",
                "timestamp": 1_700_000_000_000_u64,
            }),
        )
        .await
    );
    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await.unwrap().unwrap();
    assert_eq!(rx.borrow().messages.len(), 1);
}

#[tokio::test]
async fn failed_send_can_be_retried_after_reconnect() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    let chat = Chat::spawn(Caller::new(transport.clone()), authenticated());

    // First attempt with no connection fails and stays in the list.
    let rx = chat.subscribe("general").await;
    chat.send("general", "try me", ContentKind::Text).await.unwrap_err();
    let local_id = rx.borrow().messages[0].message.id.clone();

    // Bring the link up and retry the same entry.
    transport.connect();
    let mut peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();
    let server = tokio::spawn(async move {
        let (seq, _, data) = peer.recv_call().await.unwrap();
        peer.ack_ok(seq, json!({"id": "srv-9", "client_ref": data["client_ref"]})).await;
    });

    chat.retry("general", &local_id).await.unwrap();
    server.await.unwrap();

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].message.id, "srv-9");
    assert_eq!(snapshot.messages[0].message.delivery, Delivery::Confirmed);
}

#[tokio::test]
async fn load_history_is_requested_once() {
    let (chat, mut peer) = connected_chat().await;

    let server = tokio::spawn(async move {
        let (seq, event, data) = peer.recv_call().await.unwrap();
        assert_eq!(event, "message/history");
        assert_eq!(data["conversation"], "general");
        let page = json!({
            "conversation": "general",
            "messages": [
                {
                    "id": "m1",
                    "conversation": "general",
                    "sender": {"id": "u2", "username": "bob"},
                    "type": "text",
                    "content": "hi",
                    "timestamp": 1_700_000_000_000_u64,
                },
            ],
        });
        peer.ack_ok(seq, page).await;
        peer
    });

    chat.load_history("general").await.unwrap();
    let mut peer = server.await.unwrap();

    let rx = chat.subscribe("general").await;
    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.phase, LoadPhase::Ready);
    assert_eq!(snapshot.messages.len(), 1);

    // A second load is a no-op: the server sees no further call.
    chat.load_history("general").await.unwrap();
    let extra = tokio::time::timeout(Duration::from_millis(50), peer.recv_call()).await;
    assert!(extra.is_err(), "second load_history must not hit the server");
}

#[tokio::test]
async fn inbound_pushes_update_subscribers() {
    let (chat, peer) = connected_chat().await;

    let mut rx = chat.subscribe("general").await;
    assert!(
        peer.push(
            "newMessage",
            json!({
                "id": "m1",
                "conversation": "general",
                "sender": {"id": "u2", "username": "bob"},
                "type": "text",
                "content": "ping",
                "timestamp": 1_700_000_000_000_u64,
            }),
        )
        .await
    );

    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await.unwrap().unwrap();
    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].message.content, "ping");
    assert_eq!(snapshot.unread, 1);
}
