//! Event bus abstraction for decoupled event emission.
//!
//! The audio engine emits playback notifications through this trait so it can
//! run under Tauri, inside tests, or headless without knowing which.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Trait for emitting events to subscribers.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `topic` - Event name (e.g., "playback-finished")
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

impl<'a> dyn EventBus + 'a {
    /// Serialize a typed event and emit it.
    ///
    /// Events that fail to serialize are dropped.
    pub fn emit_event<T: Serialize>(&self, topic: &str, event: &T) {
        if let Ok(payload) = serde_json::to_value(event) {
            self.emit(topic, payload);
        }
    }
}

/// In-memory event bus for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

/// A captured event from InMemoryEventBus.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EmittedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get all captured events in emission order.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.lock().clone()
    }

    /// Get events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.lock()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of captured events for a topic.
    pub fn count_for(&self, topic: &str) -> usize {
        self.lock().iter().filter(|e| e.topic == topic).count()
    }

    /// Topics of all captured events, in order.
    pub fn topics(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.topic.clone()).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.lock().push(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// No-op event bus that discards all events.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}
