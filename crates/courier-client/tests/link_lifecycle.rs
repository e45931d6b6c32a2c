//! Connection lifecycle tests.
//!
//! Exercises the link task through the in-memory connector: idempotent
//! connects, serialized reconnects, and teardown semantics.

use std::time::Duration;

use courier_client::{LinkStatus, Transport, TransportConfig, testing};
use url::Url;

fn test_config() -> TransportConfig {
    let endpoint = Url::parse("ws://peer.test/").unwrap();
    let mut config = TransportConfig::new(endpoint);
    config.reconnect_delay = Duration::from_millis(20);
    config.call_timeout = Duration::from_millis(200);
    config
}

#[tokio::test]
async fn rapid_connects_dial_once() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());

    // Two rapid connect() calls in succession.
    transport.connect();
    transport.connect();

    transport.wait_for(LinkStatus::Connected).await.unwrap();
    assert!(listener.accept().await.is_some());

    assert_eq!(listener.dial_count(), 1);
    assert!(listener.try_accept().is_none());
}

#[tokio::test]
async fn reconnects_after_drop_with_fixed_delay() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());

    transport.connect();
    let peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();

    // Server hangs up; the link task should redial after the fixed delay.
    drop(peer);
    let second = tokio::time::timeout(Duration::from_secs(1), listener.accept())
        .await
        .expect("reconnect within the delay bound");

    assert!(second.is_some());
    assert_eq!(listener.dial_count(), 2);
    transport.wait_for(LinkStatus::Connected).await.unwrap();
}

#[tokio::test]
async fn disconnect_cancels_reconnect() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());

    transport.connect();
    let peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();

    // Drop and immediately disconnect: the scheduled retry must not fire.
    drop(peer);
    transport.disconnect();
    transport.wait_for(LinkStatus::Disconnected).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(listener.try_accept().is_none());
    assert_eq!(listener.dial_count(), 1);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());

    transport.disconnect();
    transport.disconnect();
    transport.wait_for(LinkStatus::Disconnected).await.unwrap();

    // A later connect still works.
    transport.connect();
    assert!(listener.accept().await.is_some());
    transport.wait_for(LinkStatus::Connected).await.unwrap();
}

#[tokio::test]
async fn failed_dial_retries_until_it_succeeds() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());

    listener.fail_next_dials(2);
    transport.connect();

    // Two scripted failures, then success on the third serialized attempt.
    let peer = tokio::time::timeout(Duration::from_secs(1), listener.accept())
        .await
        .expect("retries should eventually connect");
    assert!(peer.is_some());
    assert_eq!(listener.dial_count(), 3);
    transport.wait_for(LinkStatus::Connected).await.unwrap();
}

#[tokio::test]
async fn pushes_fan_out_to_all_subscribers() {
    let (connector, mut listener) = testing::fake_link();
    let transport = Transport::spawn(connector, test_config());

    let mut first = transport.subscribe_pushes();
    let mut second = transport.subscribe_pushes();

    transport.connect();
    let peer = listener.accept().await.unwrap();
    transport.wait_for(LinkStatus::Connected).await.unwrap();

    assert!(peer.push("newMessage", serde_json::json!({"id": "m1"})).await);

    let a = first.recv().await.unwrap();
    let b = second.recv().await.unwrap();
    assert_eq!(a.event, "newMessage");
    assert_eq!(b.event, "newMessage");
}
