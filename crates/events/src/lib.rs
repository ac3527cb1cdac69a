//! Shared event contracts for playback notifications.
//!
//! The audio engine and the host plugin agree on these DTOs and event names.
//! Using shared types keeps the listener payloads from drifting apart.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{EmittedEvent, EventBus, EventBusRef, InMemoryEventBus, NullEventBus};

use serde::{Deserialize, Serialize};

/// Event emitted once when every scheduled buffer of a playback session has
/// been played (or the queue drained).
///
/// Carries no payload; serializes as `{}`.
///
/// Producers: audio player
/// Consumers: host application listeners
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFinishedEvent {}

/// Event emitted once when the first buffer of a new session is scheduled.
///
/// Producers: audio player
/// Consumers: host application listeners
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStartedEvent {}

/// Event emitted when playback hit an error that was logged and swallowed.
///
/// A `PlaybackFinishedEvent` for the interrupted session always follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackErrorEvent {
    /// Human-readable error message.
    pub message: String,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Playback session finished.
    pub const PLAYBACK_FINISHED: &str = "playback-finished";
    /// Playback session started.
    pub const PLAYBACK_STARTED: &str = "playback-started";
    /// Playback error (logged and swallowed by the engine).
    pub const PLAYBACK_ERROR: &str = "playback-error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_event_is_empty_object() {
        let json = serde_json::to_string(&PlaybackFinishedEvent::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_finished_event_deserialize() {
        let event: PlaybackFinishedEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event, PlaybackFinishedEvent {});
    }

    #[test]
    fn test_error_event_serialize() {
        let event = PlaybackErrorEvent {
            message: "device lost".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, serde_json::json!({"message": "device lost"}));
    }
}
