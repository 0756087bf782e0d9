//! Event bus using tokio broadcast channel
//!
//! Lets business logic raise events without holding a dispatcher.
//! Slow subscribers will miss events rather than blocking senders.

use crate::events::BusinessEvent;
use tokio::sync::broadcast;

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for business events
///
/// Events are fire-and-forget; if no subscribers are listening, events are
/// simply dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusinessEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Emit an event to all subscribers
    ///
    /// Never blocks and never fails.
    pub fn emit(&self, event: BusinessEvent) {
        // Err only means there are no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber to event bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<BusinessEvent>,
}

impl EventSubscriber {
    /// Receive the next event
    ///
    /// Returns None once every sender has been dropped. Lagged events are
    /// skipped with a warning.
    pub async fn recv(&mut self) -> Option<BusinessEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event subscriber lagged by {} events", n);
                    continue;
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<BusinessEvent> {
        self.receiver.try_recv().ok()
    }
}
