use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10_000);
const DEFAULT_HEARTBEAT_DESTINATION: &str = "/app/heartbeat";
const DEFAULT_AUTH_HEADER: &str = "token";
const DEFAULT_CONTENT_TYPE: &str = "application/json";
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Shortest keep-alive interval; smaller values are raised to this.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// STOMP protocol version offered to the broker.
///
/// Sent as `accept-version` on CONNECT and passed to the WebSocket
/// handshake as the `Sec-WebSocket-Protocol` (`v12.stomp` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StompVersion {
    V1_0,
    V1_1,
    #[default]
    V1_2,
}

impl StompVersion {
    /// Value for the `accept-version` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            StompVersion::V1_0 => "1.0",
            StompVersion::V1_1 => "1.1",
            StompVersion::V1_2 => "1.2",
        }
    }

    /// WebSocket subprotocol name.
    pub fn subprotocol(&self) -> &'static str {
        match self {
            StompVersion::V1_0 => "v10.stomp",
            StompVersion::V1_1 => "v11.stomp",
            StompVersion::V1_2 => "v12.stomp",
        }
    }
}

impl fmt::Display for StompVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StompVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.0" | "v10.stomp" => Ok(StompVersion::V1_0),
            "1.1" | "v11.stomp" => Ok(StompVersion::V1_1),
            "1.2" | "v12.stomp" => Ok(StompVersion::V1_2),
            other => Err(format!("unsupported STOMP version '{}'", other)),
        }
    }
}

/// Application-level keep-alive settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between two keep-alive frames
    pub interval: Duration,
    /// `destination` header of the keep-alive SEND frame
    pub destination: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            destination: DEFAULT_HEARTBEAT_DESTINATION.to_string(),
        }
    }
}

/// Settings for a `StompClient`.
///
/// Build with `ClientConfig::default()` and the builder methods:
///
/// ```
/// use std::time::Duration;
/// use stomp_ws::ClientConfig;
///
/// let config = ClientConfig::default()
///     .auth_header("X-Auth-Token")
///     .heartbeat_interval(Duration::from_secs(5));
/// assert_eq!(config.auth_header, "X-Auth-Token");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Version sent as `accept-version`
    pub accept_version: StompVersion,
    /// Value of the CONNECT `heart-beat` header. Protocol-level heartbeats
    /// are disabled by default since keep-alive is sent as SEND frames.
    pub client_heartbeat: String,
    /// Header that carries the auth token on CONNECT and on keep-alives
    pub auth_header: String,
    /// `content-type` header of frames produced by `send`
    pub content_type: String,
    /// Capacity of the `ClientEvent` broadcast channel
    pub event_capacity: usize,
    /// Keep-alive settings
    pub heartbeat: HeartbeatConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            accept_version: StompVersion::default(),
            client_heartbeat: "0,0".to_string(),
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_version(mut self, version: StompVersion) -> Self {
        self.accept_version = version;
        self
    }

    pub fn client_heartbeat(mut self, value: impl Into<String>) -> Self {
        self.client_heartbeat = value.into();
        self
    }

    pub fn auth_header(mut self, name: impl Into<String>) -> Self {
        self.auth_header = name.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Capacity of the event channel; zero is raised to one.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Keep-alive interval; values below `MIN_HEARTBEAT_INTERVAL` are raised
    /// to it.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat.interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        self
    }

    pub fn heartbeat_destination(mut self, destination: impl Into<String>) -> Self {
        self.heartbeat.destination = destination.into();
        self
    }
}
