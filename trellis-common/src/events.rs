//! Lifecycle event types for the composition pipeline
//!
//! Provides the CompositionEvent definitions and the EventBus the composer
//! publishes them on. Events are optional observability: a composer with no
//! bus, or a bus with no subscribers, composes exactly the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// States of the composition state machine, in pipeline order
///
/// The pipeline only ever moves forward through these states. A call may
/// jump ahead (a composition with nothing to compose goes straight from
/// `Normalized` to `ViewResolved`) but never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStage {
    /// Instruction received, nothing resolved
    Raw,
    /// Instruction normalized into settings, binding context attached
    Normalized,
    /// Model identifier (if any) resolved into an instance
    ModelResolved,
    /// Strategy identifier (if any) resolved into a strategy
    StrategyResolved,
    /// Concrete view located
    ViewResolved,
    /// View bound to its model or context
    Bound,
    /// Container content swapped
    Transitioned,
    /// Lifecycle hooks fired on the model
    Activated,
    /// `after_compose` fired, composition finished
    Done,
}

impl CompositionStage {
    /// Stable lowercase name, as used in serialized events
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionStage::Raw => "raw",
            CompositionStage::Normalized => "normalized",
            CompositionStage::ModelResolved => "model_resolved",
            CompositionStage::StrategyResolved => "strategy_resolved",
            CompositionStage::ViewResolved => "view_resolved",
            CompositionStage::Bound => "bound",
            CompositionStage::Transitioned => "transitioned",
            CompositionStage::Activated => "activated",
            CompositionStage::Done => "done",
        }
    }
}

impl fmt::Display for CompositionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composition lifecycle events
///
/// Every event carries the id of the compose call that produced it and the
/// id of the container it targets, so interleaved calls can be told apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompositionEvent {
    /// A compose call started
    CompositionStarted {
        /// Compose call id
        composition_id: Uuid,
        /// Target container id
        container_id: Uuid,
        /// When the call started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The state machine entered a stage
    StageEntered {
        /// Compose call id
        composition_id: Uuid,
        /// Target container id
        container_id: Uuid,
        /// Stage entered
        stage: CompositionStage,
    },

    /// The instruction explicitly cleared its view; nothing was done
    CompositionSkipped {
        /// Compose call id
        composition_id: Uuid,
        /// Target container id
        container_id: Uuid,
    },

    /// The compose call ran to completion
    CompositionCompleted {
        /// Compose call id
        composition_id: Uuid,
        /// Target container id
        container_id: Uuid,
        /// When the call finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The compose call halted on an error
    CompositionFailed {
        /// Compose call id
        composition_id: Uuid,
        /// Target container id
        container_id: Uuid,
        /// Last stage reached before the failure
        stage: CompositionStage,
        /// Error description
        error: String,
    },
}

impl CompositionEvent {
    /// Compose call id this event belongs to
    pub fn composition_id(&self) -> Uuid {
        match self {
            CompositionEvent::CompositionStarted { composition_id, .. }
            | CompositionEvent::StageEntered { composition_id, .. }
            | CompositionEvent::CompositionSkipped { composition_id, .. }
            | CompositionEvent::CompositionCompleted { composition_id, .. }
            | CompositionEvent::CompositionFailed { composition_id, .. } => *composition_id,
        }
    }
}

/// Broadcast bus for composition lifecycle events
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the pipeline)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CompositionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CompositionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CompositionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
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

    #[test]
    fn test_stage_order() {
        assert!(CompositionStage::Raw < CompositionStage::Normalized);
        assert!(CompositionStage::Bound < CompositionStage::Transitioned);
        assert!(CompositionStage::Activated < CompositionStage::Done);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&CompositionStage::ModelResolved).unwrap();
        assert_eq!(json, "\"model_resolved\"");
        assert_eq!(CompositionStage::ViewResolved.to_string(), "view_resolved");
    }

    #[test]
    fn test_event_tagged_serialization() {
        let event = CompositionEvent::CompositionSkipped {
            composition_id: Uuid::nil(),
            container_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "CompositionSkipped");
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.capacity(), 10);

        let id = Uuid::new_v4();
        bus.emit_lossy(CompositionEvent::StageEntered {
            composition_id: id,
            container_id: Uuid::nil(),
            stage: CompositionStage::Bound,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.composition_id(), id);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit_lossy(CompositionEvent::CompositionSkipped {
            composition_id: Uuid::nil(),
            container_id: Uuid::nil(),
        });
        assert_eq!(bus.capacity(), 256);
    }
}
