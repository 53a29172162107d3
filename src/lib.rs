//! Async STOMP client over WebSocket.
//!
//! [`StompClient`] speaks a subset of STOMP (CONNECT, SEND, SUBSCRIBE,
//! UNSUBSCRIBE, DISCONNECT) over any [`Transport`], decodes inbound MESSAGE
//! bodies as JSON into the type each subscription asked for, and keeps the
//! session alive with an application-level heartbeat.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod parser;
pub mod state;
pub mod subscription;
pub mod transport;

pub use client::{ClientEvent, StompClient};
pub use codec::{StompCodec, StompItem, deserialize, serialize};
pub use config::{ClientConfig, HeartbeatConfig, StompVersion};
pub use error::{ClientError, DispatchError, ParseError, TransportError};
pub use frame::{Command, Frame};
pub use state::ConnectionState;
pub use subscription::HandlerResult;
pub use transport::{Transport, TransportEvent, WsTransport};
