use std::io;

use thiserror::Error;

use crate::state::ConnectionState;

/// Errors returned by `StompClient` operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The operation requires a different connection state
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },
    /// The transport failed to connect or write
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The message body could not be encoded as JSON
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors produced while turning wire text into a `Frame`.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Empty command line
    #[error("missing command")]
    MissingCommand,
    /// Command line is not a known STOMP command
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// Header line without a ':' separator
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
    /// Input ended before the frame terminator
    #[error("no frame terminator found")]
    MissingTerminator,
    /// `content-length` present but not an unsigned integer
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
    /// Bytes after a `content-length` body were not NUL
    #[error("missing NUL terminator after content-length body")]
    MissingNulAfterBody,
    /// Unknown `\x` escape in a header
    #[error("invalid escape sequence: {0}")]
    InvalidEscape(String),
    /// Command, header or body is not valid UTF-8
    #[error("invalid utf8 in {0}")]
    InvalidUtf8(&'static str),
    /// Required by `tokio_util::codec::Decoder`
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by a `Transport`.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The physical connection could not be established
    #[error("connect failed: {0}")]
    Connect(String),
    /// The connection has been closed; no further writes are possible
    #[error("connection closed")]
    Closed,
    /// `send` was called before `connect`
    #[error("not connected")]
    NotConnected,
    /// Any other write failure
    #[error("send failed: {0}")]
    Send(String),
}

/// Errors caught while delivering an inbound MESSAGE to its handler.
///
/// These never reach the caller; the dispatcher logs them together with
/// the raw frame text and moves on.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The body did not deserialize into the subscription's payload type
    #[error("payload decode failed: {0}")]
    Payload(#[from] serde_json::Error),
    /// The handler returned an error
    #[error("handler failed: {0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
    /// The handler panicked
    #[error("handler panicked: {0}")]
    Panicked(String),
}
