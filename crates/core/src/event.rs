//! Domain event system — decoupled observability for the decision loop.
//!
//! Events are published when something interesting happens. Consumers
//! (activity feeds, diagnostics) register by subscribing to an injected bus;
//! there is no global emitter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A message entered a channel's history
    MessageIngested {
        channel: String,
        author: String,
        is_bot: bool,
        timestamp: DateTime<Utc>,
    },

    /// The decision engine classified a message
    DecisionMade {
        channel: String,
        action: String,
        confidence: f32,
        reasoning: String,
        timestamp: DateTime<Utc>,
    },

    /// A prompt was assembled for a model call
    PromptAssembled {
        channel: String,
        total_tokens: usize,
        messages_included: usize,
        timestamp: DateTime<Utc>,
    },

    /// A response was sent to a channel
    ResponseSent {
        channel: String,
        chars: usize,
        threaded: bool,
        timestamp: DateTime<Utc>,
    },

    /// A reaction was attached to a message
    ReactionAdded {
        channel: String,
        emoji: String,
        timestamp: DateTime<Utc>,
    },

    /// The bot's presence changed
    PresenceChanged {
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// An action was blocked before any side effect
    ActionBlocked {
        channel: String,
        action: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A model call failed
    ModelCallFailed {
        kind: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. The bus is
/// created by the embedding application and passed into each component's
/// constructor; components never reach for shared global state.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::DecisionMade {
            channel: "general".into(),
            action: "react".into(),
            confidence: 0.82,
            reasoning: "that was funny".into(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::DecisionMade { action, confidence, .. } => {
                assert_eq!(action, "react");
                assert!((confidence - 0.82).abs() < f32::EPSILON);
            }
            _ => panic!("Expected DecisionMade event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::ModelCallFailed {
            kind: "decision".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
