use serde_json::Value;
use stomp_ws::StompClient;
use tokio::sync::mpsc;

use super::state::SharedState;

/// A payload delivered to one of the CLI's subscriptions
pub type Received = (String, Value);

/// Result of executing a command
pub enum CommandResult {
    /// Command executed successfully
    Ok,
    /// Command requests exit
    Quit,
    /// Informational output for the user
    Info(String),
    /// Error executing command
    Error(String),
}

/// Parse and execute a command
pub async fn execute_command(
    line: &str,
    client: &StompClient,
    state: SharedState,
    received: &mpsc::UnboundedSender<Received>,
) -> CommandResult {
    let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
    if parts.is_empty() || parts[0].is_empty() {
        return CommandResult::Ok;
    }

    match parts[0] {
        "quit" | "exit" | "q" => CommandResult::Quit,

        "send" => {
            if parts.len() < 3 {
                return CommandResult::Error("Usage: send <destination> <json>".to_string());
            }
            let body: Value = match serde_json::from_str(parts[2]) {
                Ok(v) => v,
                Err(e) => return CommandResult::Error(format!("Invalid JSON: {}", e)),
            };
            match client.send(&body, parts[1], &[]).await {
                Ok(()) => CommandResult::Ok,
                Err(e) => CommandResult::Error(format!("Send error: {}", e)),
            }
        }

        "sub" | "subscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: sub <topic>".to_string());
            }
            match subscribe_topic(client, parts[1], state, received).await {
                Ok(msg) => CommandResult::Info(msg),
                Err(msg) => CommandResult::Error(msg),
            }
        }

        "unsub" | "unsubscribe" => {
            if parts.len() < 2 {
                return CommandResult::Error("Usage: unsub <topic>".to_string());
            }
            let topic = parts[1];
            state.lock().await.remove_subscription(topic);
            if client.unsubscribe(topic).await {
                CommandResult::Info(format!("Unsubscribed from: {}", topic))
            } else {
                CommandResult::Error(format!("Not subscribed to '{}'", topic))
            }
        }

        "help" | "?" => {
            print_help();
            CommandResult::Ok
        }

        _ => CommandResult::Error(format!("Unknown command: {}. Type 'help' for commands.", parts[0])),
    }
}

/// Subscribe to `topic`, forwarding every decoded payload to `received`.
pub async fn subscribe_topic(
    client: &StompClient,
    topic: &str,
    state: SharedState,
    received: &mpsc::UnboundedSender<Received>,
) -> Result<String, String> {
    let Some(index) = state.lock().await.register_subscription(topic) else {
        return Ok(format!("Already subscribed to: {}", topic));
    };

    let tx = received.clone();
    let name = topic.to_string();
    let result = client
        .subscribe(topic, &[], index, move |_client, payload: Value| {
            tx.send((name.clone(), payload))?;
            Ok(())
        })
        .await;

    if let Err(e) = result {
        state.lock().await.remove_subscription(topic);
        return Err(format!("Failed to subscribe to '{}': {}", topic, e));
    }
    if !client.is_subscribed(topic).await {
        state.lock().await.remove_subscription(topic);
        return Err(format!("Failed to subscribe to '{}': write failed", topic));
    }
    Ok(format!("Subscribed to: {} (sub-{})", topic, index))
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <json>  - Send a JSON message");
    println!("  sub <topic>                - Subscribe to a topic");
    println!("  unsub <topic>              - Unsubscribe from a topic");
    println!("  help                       - Show this help");
    println!("  quit                       - Disconnect and exit");
}
