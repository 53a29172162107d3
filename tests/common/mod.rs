#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use stomp_ws::{
    ClientConfig, Command, Frame, StompClient, Transport, TransportError, TransportEvent,
    deserialize,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceUpdate {
    pub value: i64,
}

#[derive(Default)]
struct MockState {
    sent: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
    closed: AtomicBool,
    connects: AtomicUsize,
}

/// In-memory `Transport` recording every outbound message and letting the
/// test inject inbound events.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send(&self, fail: bool) {
        self.state.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Raw wire text of everything sent so far.
    pub fn sent_raw(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    /// Everything sent so far, parsed back into frames.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent_raw()
            .iter()
            .map(|raw| deserialize(raw).expect("client sent an unparseable frame"))
            .collect()
    }

    pub fn sent_commands(&self) -> Vec<Command> {
        self.sent_frames().iter().map(|f| f.command).collect()
    }

    pub fn count_sent(&self, command: Command) -> usize {
        self.sent_commands().iter().filter(|c| **c == command).count()
    }

    /// Keep-alive frames: SENDs addressed to the heartbeat destination.
    pub fn heartbeats(&self, destination: &str) -> Vec<Frame> {
        self.sent_frames()
            .into_iter()
            .filter(|f| f.command == Command::Send && f.destination() == Some(destination))
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.sent.lock().unwrap().clear();
    }

    /// Deliver an inbound event as if it came off the wire.
    pub async fn emit(&self, event: TransportEvent) {
        let tx = self
            .state
            .events
            .lock()
            .unwrap()
            .clone()
            .expect("transport not connected");
        tx.send(event).await.expect("dispatch task gone");
    }

    pub async fn push_inbound(&self, text: &str) {
        self.emit(TransportEvent::Message(text.to_string())).await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.state.events.lock().unwrap() = Some(tx);
        self.state.closed.store(false, Ordering::SeqCst);
        Ok(rx)
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::Send("injected failure".to_string()));
        }
        self.state.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.events.lock().unwrap().take();
    }
}

pub fn client_with(config: ClientConfig) -> (StompClient, MockTransport) {
    let transport = MockTransport::new();
    let client = StompClient::new(transport.clone(), config);
    (client, transport)
}

pub fn new_client() -> (StompClient, MockTransport) {
    client_with(ClientConfig::default())
}

/// Client that is already open, connected with `token:abc`.
pub async fn open_client() -> (StompClient, MockTransport) {
    let (client, transport) = new_client();
    client
        .connect(&[("token", "abc")])
        .await
        .expect("connect failed");
    (client, transport)
}

pub fn message(destination: &str, body: &str) -> String {
    format!("MESSAGE\ndestination:{}\n\n{}\0", destination, body)
}

/// Wait for the next value on `rx`, failing the test after one second.
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for handler")
        .expect("channel closed")
}
