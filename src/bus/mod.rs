//! Event bus for connection and change notifications
//!
//! Uses tokio::sync::broadcast for pub/sub pattern.
//! Events are typed and can carry payloads.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event types that can be published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    /// Greeting accepted (and password, if any)
    Connected { endpoint: String, version: String },
    /// Connection dropped, either on request or after a stream failure
    Disconnected { endpoint: String, reason: String },
    /// One subsystem reported by `idle`
    SubsystemChanged { subsystem: String },
}

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BusEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pubsub() {
        let bus = create_bus();
        let mut rx = bus.subscribe();

        bus.publish(BusEvent::Connected {
            endpoint: "localhost:6600".to_string(),
            version: "0.23.5".to_string(),
        });

        let event = rx.recv().await.unwrap();
        match event {
            BusEvent::Connected { version, .. } => {
                assert_eq!(version, "0.23.5");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = create_bus();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(BusEvent::SubsystemChanged {
            subsystem: "mixer".to_string(),
        });

        assert!(matches!(rx1.recv().await.unwrap(), BusEvent::SubsystemChanged { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), BusEvent::SubsystemChanged { .. }));
    }

    #[test]
    fn test_events_serialize_tagged() {
        let event = BusEvent::SubsystemChanged {
            subsystem: "player".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "SubsystemChanged", "payload": { "subsystem": "player" } })
        );
    }
}
