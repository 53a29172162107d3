use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::StompVersion;
use crate::error::TransportError;

/// Capacity of the inbound event channel handed out by `WsTransport`.
const EVENT_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Events delivered by a transport after `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text message (normally one STOMP frame or a heartbeat EOL)
    Message(String),
    /// The connection was closed, with the reason if the peer gave one
    Closed(String),
    /// The connection reported an error
    Error(String),
}

/// A full-duplex text transport carrying STOMP frames.
///
/// `connect` establishes the physical connection and returns the stream of
/// inbound events. The stream ends after a `TransportEvent::Closed` or when
/// the transport is closed locally.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish the connection and return its inbound events.
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Write one text message.
    async fn send(&self, text: String) -> Result<(), TransportError>;

    /// Close the connection. Calling `close` on a closed transport is a no-op.
    async fn close(&self);
}

/// `Transport` over a WebSocket connection (`ws://` or `wss://`).
pub struct WsTransport {
    url: String,
    version: StompVersion,
    sink: Mutex<Option<WsSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Create a transport for `url`, offering `version` as the WebSocket
    /// subprotocol.
    pub fn new(url: impl Into<String>, version: StompVersion) -> Self {
        Self {
            url: url.into(),
            version,
            sink: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(self.version.subprotocol()),
        );

        let (ws, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(url = %self.url, status = %response.status(), "websocket connected");

        let (sink, mut stream) = ws.split();
        *self.sink.lock().await = Some(sink);

        let (tx, rx) = mpsc::channel::<TransportEvent>(EVENT_CAPACITY);
        let handle = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.to_string()),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => {
                            tracing::warn!(len = bytes.len(), "dropping non-utf8 binary message");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        let _ = tx.send(TransportEvent::Closed(reason)).await;
                        return;
                    }
                    // ping/pong are answered by tungstenite itself
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                        let _ = tx.send(TransportEvent::Closed(e.to_string())).await;
                        return;
                    }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(TransportEvent::Closed("stream ended".to_string()))
                .await;
        });
        *self.reader.lock().await = Some(handle);

        Ok(rx)
    }

    async fn send(&self, text: String) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::Text(text.into())).await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed
            }
            other => TransportError::Send(other.to_string()),
        })
    }

    async fn close(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "websocket close");
            }
        }
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
    }
}
