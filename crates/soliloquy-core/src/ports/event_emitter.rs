//! Event emitter trait for broadcasting application events.
//!
//! Implementations handle transport details (channels, UI bridges, logs).
//! Services only ever see `Arc<dyn AppEventEmitter>`.

use tokio::sync::broadcast;

use crate::events::AppEvent;

/// Trait for emitting application events.
///
/// `emit` must not block; implementations buffer or drop.
pub trait AppEventEmitter: Send + Sync {
    fn emit(&self, event: AppEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn AppEventEmitter>;
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl AppEventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {}

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

/// Fans events out to any number of subscribers over a tokio broadcast
/// channel. Slow subscribers observe `Lagged` rather than blocking emitters.
#[derive(Debug, Clone)]
pub struct BroadcastEmitter {
    sender: broadcast::Sender<AppEvent>,
}

impl BroadcastEmitter {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl AppEventEmitter for BroadcastEmitter {
    fn emit(&self, event: AppEvent) {
        // No subscribers is fine; events are fire-and-forget.
        if self.sender.send(event).is_err() {
            tracing::trace!(target: "soliloquy.events", "Event dropped, no subscribers");
        }
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
