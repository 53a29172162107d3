//! Full session against the in-memory transport: connect, subscribe,
//! receive, publish, unsubscribe, dispose.

mod common;

use common::{PriceUpdate, message, new_client, recv_within};
use stomp_ws::{ClientEvent, Command, ConnectionState};
use tokio::sync::mpsc;

#[tokio::test]
async fn price_feed_session() {
    let (client, transport) = new_client();
    let mut events = client.events();

    client.connect(&[("token", "abc")]).await.expect("connect");
    assert_eq!(events.recv().await.expect("event"), ClientEvent::Opened);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe("prices", &[], 1, move |_c, update: PriceUpdate| {
            tx.send(update)?;
            Ok(())
        })
        .await
        .expect("subscribe");

    transport
        .push_inbound("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0")
        .await;
    transport
        .push_inbound(&message("prices", "{\"value\":42}"))
        .await;
    transport
        .push_inbound(&message("prices", "{\"value\":43}"))
        .await;

    assert_eq!(recv_within(&mut rx).await, PriceUpdate { value: 42 });
    assert_eq!(recv_within(&mut rx).await, PriceUpdate { value: 43 });

    client
        .send(&serde_json::json!({"symbol": "ACME", "qty": 5}), "/app/order", &[])
        .await
        .expect("send");

    assert!(client.unsubscribe("prices").await);
    client.dispose().await.expect("dispose");
    assert_eq!(client.state(), ConnectionState::Closed);

    assert_eq!(
        transport.sent_commands(),
        vec![
            Command::Connect,
            Command::Subscribe,
            Command::Send,
            Command::Unsubscribe,
            Command::Disconnect,
        ]
    );
    let order = &transport.sent_frames()[2];
    let body: serde_json::Value = serde_json::from_str(&order.body).expect("json body");
    assert_eq!(body["symbol"], "ACME");
    assert_eq!(body["qty"], 5);
}
