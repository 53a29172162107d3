use std::any::type_name;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::client::StompClient;
use crate::error::DispatchError;

/// Return type of subscription handlers.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Handler with the payload type erased: takes the raw body, decodes it and
/// calls the typed handler.
type ErasedHandler = Arc<dyn Fn(&StompClient, &str) -> Result<(), DispatchError> + Send + Sync>;

/// One registered topic: the subscription id sent to the broker and the
/// typed handler behind a decoding closure.
#[derive(Clone)]
pub(crate) struct SubscriptionEntry {
    pub(crate) id: String,
    pub(crate) payload_type: &'static str,
    handler: ErasedHandler,
}

impl SubscriptionEntry {
    pub(crate) fn new<T, F>(id: String, handler: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&StompClient, T) -> HandlerResult + Send + Sync + 'static,
    {
        let erased = move |client: &StompClient, body: &str| -> Result<(), DispatchError> {
            // a JSON `null` body decodes to None and is not delivered
            let payload: Option<T> = serde_json::from_str(body)?;
            match payload {
                Some(payload) => handler(client, payload).map_err(DispatchError::Handler),
                None => Ok(()),
            }
        };
        Self {
            id,
            payload_type: type_name::<T>(),
            handler: Arc::new(erased),
        }
    }

    /// Decode `body` and run the handler. Panics inside the handler are
    /// caught and reported as `DispatchError::Panicked`.
    pub(crate) fn deliver(&self, client: &StompClient, body: &str) -> Result<(), DispatchError> {
        match catch_unwind(AssertUnwindSafe(|| (self.handler)(client, body))) {
            Ok(result) => result,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                Err(DispatchError::Panicked(msg))
            }
        }
    }
}

/// Topic -> subscription map shared by the caller and the dispatch task.
///
/// Every access goes through the mutex; `get` hands out a clone so
/// handlers run after the lock is released.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Mutex<HashMap<String, SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under `topic` unless the topic is already taken.
    /// Returns true if the entry was inserted.
    pub(crate) async fn insert_if_absent(&self, topic: &str, entry: SubscriptionEntry) -> bool {
        let mut map = self.entries.lock().await;
        if map.contains_key(topic) {
            return false;
        }
        map.insert(topic.to_string(), entry);
        true
    }

    pub(crate) async fn get(&self, topic: &str) -> Option<SubscriptionEntry> {
        self.entries.lock().await.get(topic).cloned()
    }

    pub(crate) async fn remove(&self, topic: &str) -> Option<SubscriptionEntry> {
        self.entries.lock().await.remove(topic)
    }

    /// Drop every subscription, returning how many there were.
    pub(crate) async fn clear(&self) -> usize {
        let mut map = self.entries.lock().await;
        let n = map.len();
        map.clear();
        n
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub(crate) async fn contains(&self, topic: &str) -> bool {
        self.entries.lock().await.contains_key(topic)
    }
}
