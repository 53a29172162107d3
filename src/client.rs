use std::fmt;
use std::sync::{Arc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{deserialize, is_heartbeat, serialize};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::frame::{Command, Frame};
use crate::heartbeat::Heartbeat;
use crate::state::{ConnectionState, StateCell};
use crate::subscription::{HandlerResult, SubscriptionEntry, SubscriptionRegistry};
use crate::transport::{Transport, TransportEvent, WsTransport};

/// Notifications published by a `StompClient`.
///
/// Obtain a receiver with [`StompClient::events`]; dropping the receiver
/// unsubscribes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// CONNECT was written to an established transport
    Opened,
    /// The transport closed, or the client was disposed
    Closed(String),
    /// The transport reported an error
    Error(String),
    /// The broker sent an ERROR frame
    ServerError { message: String, body: String },
    /// A keep-alive frame was written
    HeartbeatSent,
}

/// Background tasks owned by an open session.
#[derive(Default)]
struct Tasks {
    heartbeat: Option<(JoinHandle<()>, CancellationToken)>,
    dispatch: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    state: Arc<StateCell>,
    registry: SubscriptionRegistry,
    /// Auth token captured from the CONNECT headers
    token: Arc<RwLock<Option<String>>>,
    tasks: Mutex<Tasks>,
    events: broadcast::Sender<ClientEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut();
        if let Some((_, cancel)) = tasks.heartbeat.take() {
            cancel.cancel();
        }
        if let Some(dispatch) = tasks.dispatch.take() {
            dispatch.abort();
        }
    }
}

/// STOMP client over a `Transport`.
///
/// The handle is cheap to clone; clones share the same session. Outbound
/// operations (`send`, `subscribe`) require the client to be open.
/// Inbound MESSAGE frames are routed by their `destination` header to the
/// handler registered for that topic.
///
/// ```no_run
/// use serde::Deserialize;
/// use stomp_ws::{ClientConfig, StompClient};
///
/// #[derive(Deserialize)]
/// struct PriceUpdate {
///     value: i64,
/// }
///
/// # async fn run() -> Result<(), stomp_ws::ClientError> {
/// let client = StompClient::websocket("ws://127.0.0.1:8080/stomp", ClientConfig::default());
/// client.connect(&[("token", "abc")]).await?;
/// client
///     .subscribe("prices", &[], 1, |_client, update: PriceUpdate| {
///         println!("price: {}", update.value);
///         Ok(())
///     })
///     .await?;
/// client.send(&serde_json::json!({"symbol": "ACME"}), "/app/quote", &[]).await?;
/// client.dispose().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StompClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for StompClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StompClient")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl StompClient {
    /// Create a closed client over `transport`.
    pub fn new(transport: impl Transport, config: ClientConfig) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Create a closed client over a shared transport handle.
    pub fn from_arc(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Arc::new(StateCell::new(ConnectionState::Closed)),
                registry: SubscriptionRegistry::new(),
                token: Arc::new(RwLock::new(None)),
                tasks: Mutex::new(Tasks::default()),
                events,
            }),
        }
    }

    /// Create a closed client over a WebSocket connection to `url`. The
    /// configured STOMP version is offered as the WebSocket subprotocol.
    pub fn websocket(url: impl Into<String>, config: ClientConfig) -> Self {
        let transport = WsTransport::new(url, config.accept_version);
        Self::new(transport, config)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Subscribe to client notifications.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// The auth token captured by the last `connect`, if any.
    pub async fn auth_token(&self) -> Option<String> {
        self.inner.token.read().await.clone()
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.registry.len().await
    }

    pub async fn is_subscribed(&self, topic: &str) -> bool {
        self.inner.registry.contains(topic).await
    }

    /// Open the transport and send CONNECT.
    ///
    /// `headers` are appended to the CONNECT frame after `accept-version`
    /// and `heart-beat`. If they contain the configured auth header its
    /// value is kept for the heartbeat loop.
    ///
    /// Fails with `InvalidState` unless the client is closed, and with
    /// `Transport` if the connection cannot be established; in both cases
    /// the client stays closed.
    pub async fn connect(&self, headers: &[(&str, &str)]) -> Result<(), ClientError> {
        let inner = &self.inner;
        inner
            .state
            .transition(ConnectionState::Closed, ConnectionState::Connecting)
            .map_err(|state| ClientError::InvalidState {
                operation: "connect",
                state,
            })?;

        let events = match inner.transport.connect().await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "transport connect failed");
                inner.state.store(ConnectionState::Closed);
                return Err(e.into());
            }
        };

        let dispatch = tokio::spawn(run_dispatch(Arc::downgrade(inner), events));

        let frame = Frame::new(Command::Connect)
            .header("accept-version", inner.config.accept_version.as_str())
            .header("heart-beat", inner.config.client_heartbeat.as_str())
            .headers(headers.iter().copied());

        if let Some(token) = frame.get_header(&inner.config.auth_header) {
            *inner.token.write().await = Some(token.to_string());
        }

        let cancel = CancellationToken::new();
        let heartbeat = Heartbeat {
            transport: inner.transport.clone(),
            state: inner.state.clone(),
            token: inner.token.clone(),
            auth_header: inner.config.auth_header.clone(),
            config: inner.config.heartbeat.clone(),
            events: inner.events.clone(),
        }
        .spawn(cancel.clone());
        {
            let mut tasks = inner.tasks.lock().await;
            tasks.heartbeat = Some((heartbeat, cancel));
            tasks.dispatch = Some(dispatch);
        }
        // only publish Open once dispose can find the task handles
        if let Err(state) = inner
            .state
            .transition(ConnectionState::Connecting, ConnectionState::Open)
        {
            tracing::warn!(state = %state, "state changed during connect");
            self.shutdown_session().await;
            return Err(ClientError::InvalidState {
                operation: "connect",
                state,
            });
        }

        if let Err(e) = self.write(&frame).await {
            tracing::warn!(error = %e, "CONNECT could not be sent");
            inner.state.store(ConnectionState::Closed);
            self.shutdown_session().await;
            return Err(e);
        }

        tracing::info!(version = %inner.config.accept_version, "stomp session open");
        let _ = inner.events.send(ClientEvent::Opened);
        Ok(())
    }

    /// Send `body` as JSON to `destination`.
    ///
    /// `headers` come first, followed by `destination`, `content-type` and
    /// `content-length`. Does not wait for any broker acknowledgement.
    pub async fn send<B>(
        &self,
        body: &B,
        destination: &str,
        headers: &[(&str, &str)],
    ) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.require_open("send")?;
        let json = serde_json::to_string(body)?;
        let frame = Frame::new(Command::Send)
            .headers(headers.iter().copied())
            .header("destination", destination)
            .header("content-type", self.inner.config.content_type.as_str())
            .header("content-length", json.len().to_string())
            .set_body(json);
        self.write(&frame).await
    }

    /// Register `handler` for `topic` and send SUBSCRIBE with
    /// `id: sub-{index}`.
    ///
    /// Inbound bodies for the topic are decoded as `T`. If the topic is
    /// already registered nothing happens: the first handler stays and no
    /// frame is sent. Only the state check is reported to the caller; a
    /// failed write is logged and the registration is rolled back.
    pub async fn subscribe<T, F>(
        &self,
        topic: &str,
        headers: &[(&str, &str)],
        index: u32,
        handler: F,
    ) -> Result<(), ClientError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(&StompClient, T) -> HandlerResult + Send + Sync + 'static,
    {
        self.require_open("subscribe")?;

        let id = format!("sub-{}", index);
        let entry = SubscriptionEntry::new::<T, F>(id.clone(), handler);
        if !self.inner.registry.insert_if_absent(topic, entry).await {
            tracing::debug!(topic, "already subscribed, keeping existing handler");
            return Ok(());
        }

        let frame = Frame::new(Command::Subscribe)
            .headers(headers.iter().copied())
            .header("id", id.as_str())
            .header("destination", topic);
        if let Err(e) = self.write(&frame).await {
            tracing::warn!(topic, error = %e, "subscribe failed");
            self.inner.registry.remove(topic).await;
        } else {
            tracing::debug!(topic, id = %id, payload_type = std::any::type_name::<T>(), "subscribed");
        }
        Ok(())
    }

    /// Remove the subscription for `topic`, sending UNSUBSCRIBE when open.
    ///
    /// Returns `true` if the topic was registered and the removal went
    /// through; `false` if it was unknown or the UNSUBSCRIBE write failed.
    pub async fn unsubscribe(&self, topic: &str) -> bool {
        let Some(entry) = self.inner.registry.remove(topic).await else {
            tracing::debug!(topic, "unsubscribe for unknown topic");
            return false;
        };

        if self.is_open() {
            let frame = Frame::new(Command::Unsubscribe).header("id", entry.id.as_str());
            if let Err(e) = self.write(&frame).await {
                tracing::warn!(topic, error = %e, "unsubscribe failed");
                return false;
            }
        }
        tracing::debug!(topic, id = %entry.id, "unsubscribed");
        true
    }

    /// Close the session: stop the heartbeat, send DISCONNECT, close the
    /// transport and drop every subscription.
    ///
    /// Fails with `InvalidState` unless the client is open. When two
    /// callers race, exactly one of them performs the teardown.
    pub async fn dispose(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        inner
            .state
            .transition(ConnectionState::Open, ConnectionState::Closed)
            .map_err(|state| ClientError::InvalidState {
                operation: "dispose",
                state,
            })?;

        if let Some((_, cancel)) = inner.tasks.lock().await.heartbeat.take() {
            cancel.cancel();
        }

        let disconnect = Frame::new(Command::Disconnect);
        if let Err(e) = inner.transport.send(serialize(&disconnect)).await {
            tracing::debug!(error = %e, "DISCONNECT not sent");
        }

        self.shutdown_session().await;
        let dropped = inner.registry.clear().await;

        tracing::info!(subscriptions = dropped, "stomp session closed");
        let _ = inner.events.send(ClientEvent::Closed("disposed".to_string()));
        Ok(())
    }

    /// Handle one inbound wire message.
    ///
    /// This is what the dispatch task runs for every transport message; it
    /// never fails. Heartbeats are ignored, unparseable text is logged and
    /// dropped, MESSAGE frames go to the handler registered for their
    /// destination, ERROR frames are published as
    /// `ClientEvent::ServerError`.
    pub async fn dispatch(&self, raw: &str) {
        if is_heartbeat(raw) {
            tracing::trace!("heartbeat received");
            return;
        }

        let frame = match deserialize(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, raw, "dropping unparseable frame");
                return;
            }
        };

        match frame.command {
            Command::Message => self.deliver(&frame, raw).await,
            Command::Connected => {
                tracing::debug!(version = frame.get_header("version"), "CONNECTED received");
            }
            Command::Error => {
                let message = frame.get_header("message").unwrap_or("unknown error").to_string();
                tracing::warn!(message = %message, body = %frame.body, "ERROR frame from broker");
                let _ = self.inner.events.send(ClientEvent::ServerError {
                    message,
                    body: frame.body,
                });
            }
            other => tracing::debug!(command = %other, "ignoring frame"),
        }
    }

    async fn deliver(&self, frame: &Frame, raw: &str) {
        let Some(destination) = frame.destination() else {
            tracing::warn!(raw, "MESSAGE without destination");
            return;
        };
        let Some(entry) = self.inner.registry.get(destination).await else {
            tracing::debug!(destination, "no subscription for destination");
            return;
        };
        if let Err(e) = entry.deliver(self, &frame.body) {
            tracing::warn!(
                destination,
                payload_type = entry.payload_type,
                error = %e,
                raw,
                "message dispatch failed"
            );
        }
    }

    fn require_open(&self, operation: &'static str) -> Result<(), ClientError> {
        match self.state() {
            ConnectionState::Open => Ok(()),
            state => Err(ClientError::InvalidState { operation, state }),
        }
    }

    async fn write(&self, frame: &Frame) -> Result<(), ClientError> {
        tracing::debug!(command = %frame.command, destination = frame.destination(), "sending frame");
        self.inner.transport.send(serialize(frame)).await?;
        Ok(())
    }

    /// Stop background tasks, close the transport and forget the token.
    async fn shutdown_session(&self) {
        let (heartbeat, dispatch) = {
            let mut tasks = self.inner.tasks.lock().await;
            (tasks.heartbeat.take(), tasks.dispatch.take())
        };
        if let Some((_, cancel)) = heartbeat {
            cancel.cancel();
        }
        self.inner.transport.close().await;
        if let Some(dispatch) = dispatch {
            dispatch.abort();
        }
        *self.inner.token.write().await = None;
    }
}

/// Forward transport events to the client until the transport stream ends
/// or the client is dropped.
async fn run_dispatch(inner: Weak<Inner>, mut events: mpsc::Receiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let client = StompClient { inner };
        match event {
            TransportEvent::Message(raw) => client.dispatch(&raw).await,
            TransportEvent::Closed(reason) => {
                tracing::info!(reason = %reason, "transport closed");
                let _ = client.inner.events.send(ClientEvent::Closed(reason));
            }
            TransportEvent::Error(reason) => {
                tracing::warn!(reason = %reason, "transport error");
                let _ = client.inner.events.send(ClientEvent::Error(reason));
            }
        }
    }
}
