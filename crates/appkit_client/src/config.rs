use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Rounds to wait for a submitted group before giving up.
pub const DEFAULT_MAX_ROUNDS_TO_WAIT: u64 = 4;

/// Environment variable overriding [`DEFAULT_MAX_ROUNDS_TO_WAIT`].
pub const MAX_ROUNDS_TO_WAIT_ENV: &str = "APPKIT_MAX_ROUNDS_TO_WAIT";

/// Lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Emitted when an application's programs are compiled
    AppCompiled,
    /// Emitted when a read-only group is simulated instead of submitted
    TxnGroupSimulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppCompiledEventData {
    pub app_name: String,
    pub version: u8,
    pub approval_hash: String,
    pub clear_hash: String,
    pub approval_source_map: Option<serde_json::Value>,
    pub clear_source_map: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnGroupSimulatedEventData {
    pub simulate_response: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum EventData {
    AppCompiled(AppCompiledEventData),
    TxnGroupSimulated(TxnGroupSimulatedEventData),
}

/// Async event emitter using Tokio broadcast
#[derive(Clone)]
pub struct AsyncEventEmitter {
    sender: broadcast::Sender<(EventType, EventData)>,
}

impl AsyncEventEmitter {
    pub fn new(buffer: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(EventType, EventData)> {
        self.sender.subscribe()
    }

    pub async fn emit(&self, event_type: EventType, data: EventData) {
        // No subscribers is not an error
        let _ = self.sender.send((event_type, data));
    }
}

static DEBUG: AtomicBool = AtomicBool::new(false);
static MAX_ROUNDS_TO_WAIT: Lazy<AtomicU64> = Lazy::new(|| {
    let rounds = env::var(MAX_ROUNDS_TO_WAIT_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_MAX_ROUNDS_TO_WAIT);
    AtomicU64::new(rounds)
});
static EVENTS: Lazy<AsyncEventEmitter> = Lazy::new(|| AsyncEventEmitter::new(32));

/// Global runtime config singleton
pub struct Config;

impl Config {
    pub fn debug() -> bool {
        DEBUG.load(Ordering::Relaxed)
    }

    pub fn max_rounds_to_wait() -> u64 {
        MAX_ROUNDS_TO_WAIT.load(Ordering::Relaxed)
    }

    pub fn events() -> AsyncEventEmitter {
        EVENTS.clone()
    }

    pub fn configure(new_debug: Option<bool>, new_max_rounds_to_wait: Option<u64>) {
        if let Some(d) = new_debug {
            DEBUG.store(d, Ordering::Relaxed);
        }
        if let Some(rounds) = new_max_rounds_to_wait {
            MAX_ROUNDS_TO_WAIT.store(rounds, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_reach_subscribers() {
        let emitter = AsyncEventEmitter::new(4);
        let mut receiver = emitter.subscribe();

        emitter
            .emit(
                EventType::TxnGroupSimulated,
                EventData::TxnGroupSimulated(TxnGroupSimulatedEventData {
                    simulate_response: serde_json::json!({ "last-round": 12 }),
                }),
            )
            .await;

        let (event_type, data) = receiver.recv().await.unwrap();
        assert_eq!(event_type, EventType::TxnGroupSimulated);
        match data {
            EventData::TxnGroupSimulated(data) => {
                assert_eq!(data.simulate_response["last-round"], 12)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn emitting_without_subscribers_is_silent() {
        let emitter = AsyncEventEmitter::new(1);
        emitter
            .emit(
                EventType::AppCompiled,
                EventData::AppCompiled(AppCompiledEventData {
                    app_name: "counter".to_string(),
                    version: 8,
                    approval_hash: String::new(),
                    clear_hash: String::new(),
                    approval_source_map: None,
                    clear_source_map: None,
                }),
            )
            .await;
    }
}
