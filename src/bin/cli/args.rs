use clap::Parser;
use stomp_ws::StompVersion;

#[derive(Parser)]
#[command(name = "stomp-ws")]
#[command(version)]
#[command(about = "Interactive STOMP-over-WebSocket client")]
pub struct Cli {
    /// WebSocket endpoint of the broker
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/stomp")]
    pub url: String,

    /// Auth token sent on CONNECT and with every keep-alive
    #[arg(short, long)]
    pub token: Option<String>,

    /// Topics to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Keep-alive interval in milliseconds (at least 100)
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(100..))]
    pub heartbeat_ms: u64,

    /// STOMP version offered to the broker (1.0, 1.1 or 1.2)
    #[arg(long, default_value = "1.2")]
    pub stomp_version: StompVersion,

    /// Show session summary on exit
    #[arg(long)]
    pub summary: bool,
}
