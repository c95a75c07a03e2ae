use std::time::Duration;

use sgai_core::config::ServerConfig;
use sgai_core::Event;
use tokio::sync::broadcast;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub events: broadcast::Sender<Event>,
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(capacity: usize, keep_alive: Duration) -> Self {
        // broadcast::channel panics on zero capacity; validation rejects it
        // but a hand-built config could still carry it.
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events, keep_alive }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.channel_capacity, config.keep_alive())
    }

    /// Fan `event` out to every open stream. Returns how many received it.
    pub fn publish(&self, event: Event) -> usize {
        let name = event.name.clone();
        match self.events.send(event) {
            Ok(n) => {
                tracing::debug!(event = %name, subscribers = n, "published");
                n
            }
            // No open streams; nothing to deliver to.
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}
