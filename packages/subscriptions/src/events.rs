//! Typed broadcast bus for subscription outcomes.
//!
//! # Guarantees
//!
//! - **At-most-once delivery**: slow receivers may miss events
//! - **In-memory only**: events are not persisted
//! - **No replay**: lagged receivers get `RecvError::Lagged`

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default channel capacity for the bus.
const DEFAULT_CAPACITY: usize = 1024;

/// Facts published after a subscribe call completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Succeeded {
        email: String,
        list_id: String,
        order_id: u64,
        occurred_at: DateTime<Utc>,
    },
    Failed {
        email: String,
        list_id: String,
        order_id: u64,
        error_code: String,
        error_message: String,
        occurred_at: DateTime<Utc>,
    },
}

impl SubscriptionEvent {
    pub fn order_id(&self) -> u64 {
        match self {
            SubscriptionEvent::Succeeded { order_id, .. }
            | SubscriptionEvent::Failed { order_id, .. } => *order_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubscriptionEvent::Succeeded { .. })
    }
}

/// Broadcast bus carrying [`SubscriptionEvent`]s.
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct SubscriptionEventBus {
    sender: broadcast::Sender<SubscriptionEvent>,
}

impl SubscriptionEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// The capacity bounds how far a receiver may fall behind before lagging.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers (fire-and-forget).
    ///
    /// Returns the number of receivers that got the event.
    pub fn emit(&self, event: SubscriptionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SubscriptionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded(order_id: u64) -> SubscriptionEvent {
        SubscriptionEvent::Succeeded {
            email: "a@example.com".into(),
            list_id: "L1".into(),
            order_id,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = SubscriptionEventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(succeeded(42));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.order_id(), 42);
        assert!(event.is_success());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = SubscriptionEventBus::new();
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();

        assert_eq!(bus.emit(succeeded(1)), 2);

        assert_eq!(receiver1.recv().await.unwrap().order_id(), 1);
        assert_eq!(receiver2.recv().await.unwrap().order_id(), 1);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = SubscriptionEventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.emit(succeeded(1)), 0);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let event = SubscriptionEvent::Failed {
            email: "a@example.com".into(),
            list_id: "L1".into(),
            order_id: 3,
            error_code: "400".into(),
            error_message: "Invalid Resource".into(),
            occurred_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["error_message"], "Invalid Resource");
    }
}
