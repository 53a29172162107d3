use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// STOMP commands understood by the client.
///
/// Client-originated: `Connect`, `Disconnect`, `Subscribe`, `Unsubscribe`,
/// `Send`. Server-originated: `Connected`, `Message`, `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
    Send,
    Connected,
    Message,
    Error,
}

impl Command {
    /// Wire spelling of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Disconnect => "DISCONNECT",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Error => "ERROR",
        }
    }

    /// Header values of CONNECT and CONNECTED frames are not escaped on
    /// the wire (STOMP 1.2).
    pub(crate) fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" | "STOMP" => Ok(Command::Connect),
            "DISCONNECT" => Ok(Command::Disconnect),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "SEND" => Ok(Command::Send),
            "CONNECTED" => Ok(Command::Connected),
            "MESSAGE" => Ok(Command::Message),
            "ERROR" => Ok(Command::Error),
            "" => Err(ParseError::MissingCommand),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
///
/// `Frame` holds the command, an ordered list of headers with unique
/// (case-sensitive) names, and a text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command
    pub command: Command,
    /// Ordered headers as (name, value) pairs; names are unique
    pub headers: Vec<(String, String)>,
    /// Text body, possibly empty
    pub body: String,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Set a header (builder style).
    ///
    /// If a header with the same name already exists its value is replaced
    /// in place, so the last write wins while the original position is kept.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Add every header from `headers` in iteration order (builder style).
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.set_header(k, v);
        }
        self
    }

    /// Set the frame body (builder style).
    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header in place. See [`Frame::header`].
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
    }

    /// Get the value of a header by name (case-sensitive).
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a header by name, returning its value if it was present.
    pub fn remove_header(&mut self, key: &str) -> Option<String> {
        let pos = self.headers.iter().position(|(k, _)| k == key)?;
        Some(self.headers.remove(pos).1)
    }

    /// The `destination` header, if any.
    pub fn destination(&self) -> Option<&str> {
        self.get_header("destination")
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        writeln!(f, "Body ({} bytes)", self.body.len())
    }
}
