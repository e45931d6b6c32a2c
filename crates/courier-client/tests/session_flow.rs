//! Session flow tests against a scripted server.
//!
//! Covers the register → persist → restore round trip, validation
//! short-circuits, and logout semantics.

use std::{sync::Arc, time::Duration};

use courier_client::{
    CallError, Caller, LinkStatus, MemoryTokenStore, Session, SessionState, TokenStore, Transport,
    TransportConfig, testing,
};
use serde_json::json;
use url::Url;

fn test_config() -> TransportConfig {
    let endpoint = Url::parse("ws://peer.test/").unwrap();
    let mut config = TransportConfig::new(endpoint);
    config.reconnect_delay = Duration::from_millis(20);
    config.call_timeout = Duration::from_millis(200);
    config
}

/// Scripted auth server: acks `user/*` calls the way the real one does.
async fn run_auth_server(mut peer: testing::FakePeer) {
    while let Some((seq, event, data)) = peer.recv_call().await {
        match event.as_str() {
            "user/login" | "user/register" => {
                if data["username"] == "alice" {
                    let reply = json!({
                        "token": "t1",
                        "user": {"_id": "u1", "username": "alice"},
                    });
                    peer.ack_ok(seq, reply).await;
                } else {
                    peer.ack_err(seq, "Invalid credentials").await;
                }
            },
            "user/loginByToken" => {
                if data["token"] == "t1" {
                    let reply = json!({
                        "token": "t1",
                        "user": {"_id": "u1", "username": "alice"},
                    });
                    peer.ack_ok(seq, reply).await;
                } else {
                    peer.ack_err(seq, "Invalid token").await;
                }
            },
            other => {
                peer.ack_err(seq, &format!("unknown event {other}")).await;
            },
        }
    }
}

async fn session_against_server() -> (Session, Arc<MemoryTokenStore>) {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    transport.connect();
    let peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();
    tokio::spawn(run_auth_server(peer));

    let store = Arc::new(MemoryTokenStore::new());
    let session = Session::new(Caller::new(transport), Arc::clone(&store) as Arc<dyn TokenStore>);
    (session, store)
}

#[tokio::test]
async fn register_captures_identity_and_persists_token() {
    let (session, store) = session_against_server().await;

    let identity = session.register("alice", "secret").await.unwrap();

    assert_eq!(identity.user_id, "u1");
    assert_eq!(identity.token, "t1");
    assert_eq!(store.load().await.unwrap(), Some("t1".to_owned()));
    assert_eq!(session.current(), SessionState::Authenticated(identity));
}

#[tokio::test]
async fn restore_reproduces_the_same_session() {
    let (session, store) = session_against_server().await;

    let registered = session.register("alice", "secret").await.unwrap();
    session.logout().await.unwrap();
    assert_eq!(session.current(), SessionState::Anonymous);

    // A later process start restores from the persisted token alone.
    let restored = session.restore("t1").await.unwrap();

    assert_eq!(restored, registered);
    assert_eq!(store.load().await.unwrap(), Some("t1".to_owned()));
}

#[tokio::test]
async fn login_failure_passes_server_text_through() {
    let (session, store) = session_against_server().await;

    let err = session.login("mallory", "guess").await.unwrap_err();

    assert_eq!(err, CallError::Domain("Invalid credentials".to_owned()));
    assert_eq!(session.current(), SessionState::Anonymous);
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn empty_fields_short_circuit_without_network() {
    // No server at all: validation must reject before any call is made.
    let (connector, _listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    let session = Session::new(Caller::new(transport), Arc::new(MemoryTokenStore::new()));

    assert!(matches!(session.login("", "pw").await, Err(CallError::Validation(_))));
    assert!(matches!(session.login("alice", "").await, Err(CallError::Validation(_))));
    assert!(matches!(session.restore("").await, Err(CallError::Validation(_))));
}

#[tokio::test]
async fn logout_clears_state_and_token() {
    let (session, store) = session_against_server().await;
    session.register("alice", "secret").await.unwrap();

    let mut state = session.state();
    session.logout().await.unwrap();

    assert_eq!(session.current(), SessionState::Anonymous);
    assert_eq!(store.load().await.unwrap(), None);
    // Observers see the transition without polling.
    assert_eq!(*state.borrow_and_update(), SessionState::Anonymous);
}

#[tokio::test]
async fn session_survives_a_reconnect() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());
    transport.connect();
    let mut peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();

    let store = Arc::new(MemoryTokenStore::new());
    let session =
        Session::new(Caller::new(transport.clone()), Arc::clone(&store) as Arc<dyn TokenStore>);

    let login = tokio::spawn(async move { session.login("alice", "secret").await.map(|_| session) });
    let (seq, _, _) = peer.recv_call().await.unwrap();
    peer.ack_ok(seq, json!({"token": "t1", "user": {"_id": "u1", "username": "alice"}})).await;
    let session = login.await.unwrap().unwrap();
    let identity = session.current().identity().cloned().unwrap();

    // Drop the link; identity must survive while the transport redials.
    drop(peer);
    assert!(listener.accept().await.is_some());
    transport.wait_for(LinkStatus::Connected).await.unwrap();

    assert_eq!(session.current(), SessionState::Authenticated(identity));
}
