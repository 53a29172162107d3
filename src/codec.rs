use bytes::{Buf, BytesMut};
use std::fmt::Write as _;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ParseError;
use crate::frame::{Command, Frame};
use crate::parser::{RawFrame, escape_header_value, leading_heartbeats, parse_frame_slice, unescape_header_value};

/// Items produced or consumed by the codec.
///
/// A `StompItem` is either a decoded `Frame` or a `Heartbeat` marker
/// representing a single EOL received on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A decoded STOMP frame (command + headers + body)
    Frame(Frame),
    /// A single heartbeat pulse (LF)
    Heartbeat,
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for the
/// STOMP wire protocol.
///
/// Responsibilities:
/// - Decode incoming bytes into `StompItem::Frame` or `StompItem::Heartbeat`.
/// - Support both NUL-terminated frames and frames using the `content-length`
///   header.
/// - Encode `StompItem` back into bytes, always emitting `content-length`
///   for a non-empty body.
#[derive(Debug, Default)]
pub struct StompCodec {}

impl StompCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = ParseError;

    /// Decode bytes from `src` into a `StompItem`.
    ///
    /// Returns `Ok(None)` and leaves `src` untouched when more bytes are
    /// required to decode a complete item.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // heartbeat: one EOL at a time
        let hb = leading_heartbeats(&src[..]);
        if hb > 0 {
            let step = if src[0] == b'\n' { 1 } else { 2 };
            src.advance(step);
            return Ok(Some(StompItem::Heartbeat));
        }

        match parse_frame_slice(&src[..])? {
            Some(raw) => {
                src.advance(raw.consumed);
                Ok(Some(StompItem::Frame(frame_from_raw(raw)?)))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = ParseError;

    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            StompItem::Heartbeat => dst.extend_from_slice(b"\n"),
            StompItem::Frame(frame) => dst.extend_from_slice(serialize(&frame).as_bytes()),
        }
        Ok(())
    }
}

fn frame_from_raw(raw: RawFrame) -> Result<Frame, ParseError> {
    let command = String::from_utf8(raw.command).map_err(|_| ParseError::InvalidUtf8("command"))?;
    let command: Command = command.parse()?;

    let mut frame = Frame::new(command);
    for (k, v) in raw.headers {
        let (k, v) = if command.escapes_headers() {
            (unescape_header_value(&k)?, unescape_header_value(&v)?)
        } else {
            (k, v)
        };
        let k = String::from_utf8(k).map_err(|_| ParseError::InvalidUtf8("header name"))?;
        let v = String::from_utf8(v).map_err(|_| ParseError::InvalidUtf8("header value"))?;
        // repeated header names: the first occurrence wins
        if frame.get_header(&k).is_none() {
            frame.headers.push((k, v));
        }
    }
    frame.body = String::from_utf8(raw.body).map_err(|_| ParseError::InvalidUtf8("body"))?;
    Ok(frame)
}

/// Serialize a frame into wire text.
///
/// Produces `COMMAND\n`, one `name:value\n` line per header in insertion
/// order, a blank line, the body and a NUL terminator. `content-length` is
/// (re)computed from the body whenever the body is non-empty or the header
/// was already present.
pub fn serialize(frame: &Frame) -> String {
    let escape = frame.command.escapes_headers();
    let mut out = String::with_capacity(frame.body.len() + 64);
    out.push_str(frame.command.as_str());
    out.push('\n');

    let mut wrote_cl = false;
    for (k, v) in &frame.headers {
        if k == "content-length" {
            wrote_cl = true;
            let _ = writeln!(out, "content-length:{}", frame.body.len());
            continue;
        }
        if escape {
            let _ = writeln!(out, "{}:{}", escape_header_value(k), escape_header_value(v));
        } else {
            let _ = writeln!(out, "{}:{}", k, v);
        }
    }
    if !wrote_cl && !frame.body.is_empty() {
        let _ = writeln!(out, "content-length:{}", frame.body.len());
    }

    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
    out
}

/// Parse one frame out of wire text.
///
/// Leading heartbeat EOLs are skipped. Text that holds only part of a
/// frame fails with `ParseError::MissingTerminator`.
pub fn deserialize(text: &str) -> Result<Frame, ParseError> {
    let mut buf = BytesMut::from(text.as_bytes());
    let mut codec = StompCodec::new();
    loop {
        match codec.decode(&mut buf)? {
            Some(StompItem::Frame(frame)) => return Ok(frame),
            Some(StompItem::Heartbeat) => continue,
            None if buf.is_empty() => return Err(ParseError::MissingCommand),
            None => return Err(ParseError::MissingTerminator),
        }
    }
}

/// True when `text` is a bare heartbeat (one or more EOLs, nothing else).
pub fn is_heartbeat(text: &str) -> bool {
    !text.is_empty() && leading_heartbeats(text.as_bytes()) == text.len()
}
