use tokio::sync::broadcast;

use sentinel_core::types::MonitorEvent;

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out matched events to all live subscribers (WebSocket connections).
///
/// Backed by a tokio broadcast channel: subscribing and sending are
/// concurrent-safe, and a slow consumer lags (skipping events on its own
/// receiver) instead of blocking anyone else.
pub struct EventBroadcaster {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Silently a no-op with no subscribers.
    pub fn send(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
