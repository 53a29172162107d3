use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Statistics for a single subscribed topic
#[derive(Debug, Clone, Default)]
pub struct SubStats {
    /// Index used for the subscription id (`sub-{index}`)
    pub index: u32,
    /// Number of messages received on this topic
    pub message_count: u64,
}

/// Session state shared by the command loop and the printer tasks
pub struct AppState {
    /// Session start time
    pub start_time: DateTime<Local>,

    pub url: String,
    pub heartbeat_interval_ms: u64,

    /// Active subscriptions: topic -> stats
    pub subscriptions: HashMap<String, SubStats>,
    next_index: u32,

    /// Keep-alive frames written by the client
    pub heartbeat_count: u64,
    pub last_heartbeat: Option<DateTime<Local>>,

    /// ERROR frames received from the broker
    pub server_errors: u64,
}

impl AppState {
    pub fn new(url: String, heartbeat_interval_ms: u64) -> Self {
        Self {
            start_time: Local::now(),
            url,
            heartbeat_interval_ms,
            subscriptions: HashMap::new(),
            next_index: 1,
            heartbeat_count: 0,
            last_heartbeat: None,
            server_errors: 0,
        }
    }

    /// Reserve the index for a new subscription on `topic`.
    ///
    /// Returns `None` when the topic is already tracked.
    pub fn register_subscription(&mut self, topic: &str) -> Option<u32> {
        if self.subscriptions.contains_key(topic) {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.subscriptions.insert(
            topic.to_string(),
            SubStats {
                index,
                message_count: 0,
            },
        );
        Some(index)
    }

    pub fn remove_subscription(&mut self, topic: &str) -> bool {
        self.subscriptions.remove(topic).is_some()
    }

    pub fn record_message(&mut self, topic: &str) {
        if let Some(stats) = self.subscriptions.get_mut(topic) {
            stats.message_count += 1;
        }
    }

    pub fn record_heartbeat(&mut self) {
        self.heartbeat_count += 1;
        self.last_heartbeat = Some(Local::now());
    }

    pub fn record_server_error(&mut self) {
        self.server_errors += 1;
    }

    /// Get total message count across all subscriptions
    pub fn total_message_count(&self) -> u64 {
        self.subscriptions.values().map(|s| s.message_count).sum()
    }

    /// Generate session summary text
    pub fn generate_summary(&self) -> String {
        let end_time = Local::now();
        let total_secs = end_time.signed_duration_since(self.start_time).num_seconds();

        let mut lines = Vec::new();
        lines.push("═══════════════════════════════════════════════════════════════".to_string());
        lines.push("  stomp-ws Session Summary".to_string());
        lines.push("═══════════════════════════════════════════════════════════════".to_string());
        lines.push(format!("  Endpoint:   {}", self.url));
        lines.push(format!("  Started:    {}", self.start_time.format("%Y-%m-%d %H:%M:%S")));
        lines.push(format!("  Ended:      {}", end_time.format("%Y-%m-%d %H:%M:%S")));
        lines.push(format!("  Duration:   {}m {}s", total_secs / 60, total_secs % 60));
        lines.push(String::new());
        lines.push("  Subscriptions:".to_string());

        // busiest topics first
        let mut subs: Vec<_> = self.subscriptions.iter().collect();
        subs.sort_by(|a, b| b.1.message_count.cmp(&a.1.message_count));

        let width = subs.iter().map(|(t, _)| t.len()).max().unwrap_or(20).clamp(5, 40);
        for (topic, stats) in &subs {
            lines.push(format!("    {:width$} {:>6}", topic, stats.message_count, width = width));
        }
        lines.push(format!("    {:─>w$}", "", w = width + 7));
        lines.push(format!("    {:width$} {:>6}", "Total", self.total_message_count(), width = width));
        lines.push(String::new());
        lines.push(format!(
            "  Heartbeats sent:  {} (every {} ms)",
            self.heartbeat_count, self.heartbeat_interval_ms
        ));
        if let Some(last) = self.last_heartbeat {
            lines.push(format!("  Last heartbeat:   {}", last.format("%H:%M:%S")));
        }
        lines.push(format!("  Broker errors:    {}", self.server_errors));
        lines.push("═══════════════════════════════════════════════════════════════".to_string());

        lines.join("\n")
    }
}

/// Thread-safe shared state
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(url: String, heartbeat_interval_ms: u64) -> SharedState {
    Arc::new(Mutex::new(AppState::new(url, heartbeat_interval_ms)))
}
