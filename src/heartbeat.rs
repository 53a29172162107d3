use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ClientEvent;
use crate::codec::serialize;
use crate::config::{HeartbeatConfig, MIN_HEARTBEAT_INTERVAL};
use crate::error::TransportError;
use crate::frame::{Command, Frame};
use crate::state::{ConnectionState, StateCell};
use crate::transport::Transport;

/// Build the keep-alive SEND frame carrying the auth token.
pub fn keepalive_frame(auth_header: &str, token: &str, destination: &str) -> Frame {
    Frame::new(Command::Send)
        .header(auth_header, token)
        .header("destination", destination)
        .header("content-type", "text/plain")
}

/// Everything the heartbeat task reads. All fields are shared with the
/// owning client.
pub(crate) struct Heartbeat {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) token: Arc<RwLock<Option<String>>>,
    pub(crate) auth_header: String,
    pub(crate) config: HeartbeatConfig,
    pub(crate) events: broadcast::Sender<ClientEvent>,
}

impl Heartbeat {
    /// Run the loop on its own task until `cancel` fires or the client
    /// leaves the Open state.
    pub(crate) fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        // the field is public, so the builder clamp can be bypassed
        let interval = self.config.interval.max(MIN_HEARTBEAT_INTERVAL);
        tracing::debug!(interval_ms = interval.as_millis() as u64, "heartbeat started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            if self.state.load() != ConnectionState::Open {
                break;
            }

            let token = self.token.read().await.clone();
            let Some(token) = token else {
                tracing::trace!("no auth token yet, skipping heartbeat");
                continue;
            };

            let frame = keepalive_frame(&self.auth_header, &token, &self.config.destination);
            match self.transport.send(serialize(&frame)).await {
                Ok(()) => {
                    tracing::trace!("heartbeat sent");
                    let _ = self.events.send(ClientEvent::HeartbeatSent);
                }
                Err(TransportError::Closed | TransportError::NotConnected) => {
                    tracing::warn!("transport closed, stopping heartbeat");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "heartbeat send failed");
                }
            }
        }
        tracing::debug!("heartbeat stopped");
    }
}
