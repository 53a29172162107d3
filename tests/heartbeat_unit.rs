//! Application-level keep-alive loop, driven on paused time.

mod common;

use std::time::Duration;

use common::{client_with, new_client, open_client};
use stomp_ws::heartbeat::keepalive_frame;
use stomp_ws::{ClientConfig, ClientEvent, Command};

const DEST: &str = "/app/heartbeat";

#[test]
fn keepalive_frame_headers() {
    let frame = keepalive_frame("token", "abc", DEST);
    assert_eq!(frame.command, Command::Send);
    let headers: Vec<(&str, &str)> = frame
        .headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        headers,
        vec![
            ("token", "abc"),
            ("destination", DEST),
            ("content-type", "text/plain"),
        ]
    );
    assert!(frame.body.is_empty());
}

#[tokio::test(start_paused = true)]
async fn one_heartbeat_per_interval() {
    let (_client, transport) = open_client().await;

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(transport.heartbeats(DEST).is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let beats = transport.heartbeats(DEST);
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0].get_header("token"), Some("abc"));
    assert_eq!(beats[0].get_header("content-type"), Some("text/plain"));

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(transport.heartbeats(DEST).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn no_token_no_heartbeat() {
    let (client, transport) = new_client();
    client.connect(&[("login", "guest")]).await.expect("connect");

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(transport.heartbeats(DEST).is_empty());
    assert_eq!(transport.count_sent(Command::Send), 0);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_uses_configured_interval_and_destination() {
    let config = ClientConfig::new()
        .auth_header("Authorization")
        .heartbeat_interval(Duration::from_secs(1))
        .heartbeat_destination("/app/ping");
    let (client, transport) = client_with(config);
    client
        .connect(&[("Authorization", "Bearer t")])
        .await
        .expect("connect");

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let beats = transport.heartbeats("/app/ping");
    assert_eq!(beats.len(), 3);
    assert_eq!(beats[0].get_header("Authorization"), Some("Bearer t"));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_publishes_event() {
    let (client, _transport) = open_client().await;
    let mut events = client.events();

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(events.try_recv().expect("event"), ClientEvent::HeartbeatSent);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_after_dispose() {
    let (client, transport) = open_client().await;

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(transport.heartbeats(DEST).len(), 1);

    client.dispose().await.expect("dispose");
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.heartbeats(DEST).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_failures_do_not_stop_heartbeat() {
    let (_client, transport) = open_client().await;

    transport.fail_send(true);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(transport.heartbeats(DEST).is_empty());

    transport.fail_send(false);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.heartbeats(DEST).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_does_not_flood_transport() {
    let mut config = ClientConfig::new();
    config.heartbeat.interval = Duration::ZERO;
    let (client, transport) = client_with(config);
    client.connect(&[("token", "abc")]).await.expect("connect");

    // at most one keep-alive per 100 ms
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(transport.heartbeats(DEST).len(), 10);
}
