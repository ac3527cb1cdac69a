//! Playback session completion tracking.
//!
//! A session opens when the first buffer is scheduled and closes when the
//! scheduled audio is exhausted. Two strategies decide "exhausted":
//!
//! - [`BufferCountTracker`] counts scheduled buffers and closes the session
//!   when the last outstanding buffer reports completion.
//! - [`DrainTracker`] ignores individual buffers and closes the session the
//!   first time the render callback finds the queue empty.
//!
//! Every method returns `true` exactly on the transition it reports, so the
//! caller emits one started and one finished notification per session.

use serde::{Deserialize, Serialize};

/// Strategy used to detect the end of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionMode {
    /// Reference-count scheduled buffers; the last completion ends the session.
    BufferCount,
    /// End the session when the pending queue drains.
    QueueDrain,
}

impl CompletionMode {
    /// Mode matching the native behaviour of the current target.
    pub fn platform_default() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            CompletionMode::BufferCount
        } else {
            CompletionMode::QueueDrain
        }
    }

    /// Build a fresh tracker for this mode.
    pub fn tracker(self) -> Box<dyn CompletionTracker> {
        match self {
            CompletionMode::BufferCount => Box::new(BufferCountTracker::default()),
            CompletionMode::QueueDrain => Box::new(DrainTracker::default()),
        }
    }
}

impl Default for CompletionMode {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Session state machine driven by the render queue.
///
/// All calls happen under the render queue's mutex.
pub trait CompletionTracker: Send {
    /// A buffer was scheduled. Returns true if this opened a session.
    fn on_scheduled(&mut self) -> bool;

    /// A buffer's last sample was rendered. Returns true if this closed the session.
    fn on_buffer_complete(&mut self) -> bool;

    /// The render callback found no queued audio. Returns true if this closed the session.
    fn on_queue_drained(&mut self) -> bool;

    /// Forcefully end the session. Returns true if one was open.
    fn reset(&mut self) -> bool;

    fn is_active(&self) -> bool;
}

/// Counts buffers in flight; last completion wins.
#[derive(Debug, Default)]
pub struct BufferCountTracker {
    scheduled: usize,
}

impl BufferCountTracker {
    /// Buffers scheduled but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.scheduled
    }
}

impl CompletionTracker for BufferCountTracker {
    fn on_scheduled(&mut self) -> bool {
        self.scheduled += 1;
        self.scheduled == 1
    }

    fn on_buffer_complete(&mut self) -> bool {
        if self.scheduled == 0 {
            tracing::warn!("buffer completion reported with no buffers outstanding");
            return false;
        }
        self.scheduled -= 1;
        self.scheduled == 0
    }

    fn on_queue_drained(&mut self) -> bool {
        false
    }

    fn reset(&mut self) -> bool {
        let was_active = self.scheduled > 0;
        self.scheduled = 0;
        was_active
    }

    fn is_active(&self) -> bool {
        self.scheduled > 0
    }
}

/// Tracks whether the queue has had audio since it last drained.
#[derive(Debug, Default)]
pub struct DrainTracker {
    active: bool,
}

impl CompletionTracker for DrainTracker {
    fn on_scheduled(&mut self) -> bool {
        !std::mem::replace(&mut self.active, true)
    }

    fn on_buffer_complete(&mut self) -> bool {
        false
    }

    fn on_queue_drained(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    fn reset(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_count_single_buffer() {
        let mut tracker = BufferCountTracker::default();
        assert!(tracker.on_scheduled());
        assert!(tracker.is_active());
        assert!(tracker.on_buffer_complete());
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_buffer_count_last_completion_wins() {
        let mut tracker = BufferCountTracker::default();
        assert!(tracker.on_scheduled());
        assert!(!tracker.on_scheduled());
        assert!(!tracker.on_scheduled());
        assert_eq!(tracker.outstanding(), 3);

        assert!(!tracker.on_buffer_complete());
        // enqueued mid-session: same session continues
        assert!(!tracker.on_scheduled());
        assert!(!tracker.on_buffer_complete());
        assert!(!tracker.on_buffer_complete());
        assert!(tracker.on_buffer_complete());
    }

    #[test]
    fn test_buffer_count_ignores_drain_and_spurious_completion() {
        let mut tracker = BufferCountTracker::default();
        assert!(!tracker.on_queue_drained());
        assert!(!tracker.on_buffer_complete());
        assert!(tracker.on_scheduled());
        assert!(!tracker.on_queue_drained());
        assert!(tracker.is_active());
    }

    #[test]
    fn test_drain_tracker_session() {
        let mut tracker = DrainTracker::default();
        assert!(!tracker.on_queue_drained());
        assert!(tracker.on_scheduled());
        assert!(!tracker.on_scheduled());
        assert!(!tracker.on_buffer_complete());
        assert!(tracker.on_queue_drained());
        assert!(!tracker.on_queue_drained());
        assert!(tracker.on_scheduled());
    }

    #[test]
    fn test_reset_reports_open_session_once() {
        for mode in [CompletionMode::BufferCount, CompletionMode::QueueDrain] {
            let mut tracker = mode.tracker();
            assert!(!tracker.reset(), "{mode:?}: idle reset");
            tracker.on_scheduled();
            tracker.on_scheduled();
            assert!(tracker.reset(), "{mode:?}: active reset");
            assert!(!tracker.reset(), "{mode:?}: second reset");
            assert!(tracker.on_scheduled(), "{mode:?}: new session after reset");
        }
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&CompletionMode::QueueDrain).unwrap();
        assert_eq!(json, "\"queueDrain\"");
        let mode: CompletionMode = serde_json::from_str("\"bufferCount\"").unwrap();
        assert_eq!(mode, CompletionMode::BufferCount);
    }
}
