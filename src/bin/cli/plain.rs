use chrono::Local;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use stomp_ws::{ClientConfig, ClientError, ClientEvent, StompClient, TransportError};
use tokio::sync::mpsc;
use tokio::sync::broadcast::error::RecvError;

use super::args::Cli;
use super::commands::{CommandResult, Received, execute_command, print_help, subscribe_topic};
use super::exit_codes;
use super::state::{SharedState, new_shared_state};

/// Run the interactive CLI
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    println!("Connecting to {}...", cli.url);

    let config = ClientConfig::new()
        .accept_version(cli.stomp_version)
        .heartbeat_interval(Duration::from_millis(cli.heartbeat_ms));
    let client = StompClient::websocket(cli.url.clone(), config);
    let state = new_shared_state(cli.url.clone(), cli.heartbeat_ms);

    // Watch client events before connecting so nothing is missed
    spawn_event_printer(&client, state.clone());

    let token_header;
    let headers: &[(&str, &str)] = match &cli.token {
        Some(token) => {
            token_header = [(client.config().auth_header.as_str(), token.as_str())];
            &token_header
        }
        None => &[],
    };
    client
        .connect(headers)
        .await
        .map_err(|e| format_connection_error(&e, &cli.url))?;

    println!("Connected.");

    // Decoded payloads from every subscription end up here
    let (received_tx, received_rx) = mpsc::unbounded_channel::<Received>();
    spawn_payload_printer(received_rx, state.clone());

    for topic in &cli.subscribe {
        match subscribe_topic(&client, topic, state.clone(), &received_tx).await {
            Ok(msg) => println!("{}", msg),
            Err(msg) => return Err((msg, exit_codes::PROTOCOL_ERROR)),
        }
    }

    // Channel to receive user commands from stdin reader
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(16);

    // Spawn blocking stdin reader
    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(l) => {
                    if cmd_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!();
    print_help();
    println!();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let Some(line) = cmd_rx.recv().await else {
            break;
        };

        match execute_command(&line, &client, state.clone(), &received_tx).await {
            CommandResult::Ok => {}
            CommandResult::Quit => break,
            CommandResult::Info(msg) => println!("{}", msg),
            CommandResult::Error(msg) => eprintln!("{}", msg),
        }
    }

    println!("Disconnecting...");
    if cli.summary {
        println!("{}", state.lock().await.generate_summary());
    }
    if let Err(e) = client.dispose().await {
        tracing::debug!(error = %e, "dispose skipped");
    }
    Ok(())
}

/// Print payloads with a local timestamp and count them per topic
fn spawn_payload_printer(mut rx: mpsc::UnboundedReceiver<Received>, state: SharedState) {
    tokio::spawn(async move {
        while let Some((topic, payload)) = rx.recv().await {
            state.lock().await.record_message(&topic);
            let body = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            println!("\n{} [{}]", Local::now().format("%H:%M:%S%.3f"), topic);
            for line in body.lines() {
                println!("  {}", line);
            }
            print!("> ");
            let _ = io::stdout().flush();
        }
    });
}

/// Report broker errors and transport changes as they happen
fn spawn_event_printer(client: &StompClient, state: SharedState) {
    let mut events = client.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::HeartbeatSent) => state.lock().await.record_heartbeat(),
                Ok(ClientEvent::ServerError { message, body }) => {
                    state.lock().await.record_server_error();
                    eprintln!("\n[BROKER ERROR] {}", message);
                    if !body.is_empty() {
                        eprintln!("  {}", body);
                    }
                    print!("> ");
                    let _ = io::stdout().flush();
                }
                Ok(ClientEvent::Error(reason)) => eprintln!("\n[TRANSPORT ERROR] {}", reason),
                Ok(ClientEvent::Closed(reason)) => eprintln!("\n[CLOSED] {}", reason),
                Ok(ClientEvent::Opened) => {}
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Map a connect failure to a message and exit code
fn format_connection_error(err: &ClientError, url: &str) -> (String, u8) {
    match err {
        ClientError::Transport(TransportError::Connect(reason)) => (
            format!("Connection failed: {} ({})", url, reason),
            exit_codes::NETWORK_ERROR,
        ),
        ClientError::Transport(e) => (format!("Connection lost: {}", e), exit_codes::NETWORK_ERROR),
        other => (format!("Protocol error: {}", other), exit_codes::PROTOCOL_ERROR),
    }
}
