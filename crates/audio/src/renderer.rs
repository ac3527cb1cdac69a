//! Render queue shared between the host-facing API and the audio callback.
//!
//! The queue, the completion tracker and the counters sit behind one mutex.
//! The callback takes the lock once per render call and never waits on
//! anything else; notifications leave through a channel so listeners never
//! run on the audio thread. They are sent with the lock held, so channel order
//! is transition order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;
use serde::Serialize;

use crate::tracker::{CompletionMode, CompletionTracker};
use crate::{AudioError, Result};

/// Session transitions reported by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Started,
    Finished,
    Error(String),
}

/// Snapshot of the playback queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    /// A session is open.
    pub playing: bool,
    pub queued_buffers: usize,
    pub queued_frames: u64,
    /// Frames rendered since the renderer was created.
    pub frames_played: u64,
    pub mode: CompletionMode,
}

struct ScheduledBuffer {
    samples: Vec<f32>,
    pos: usize,
}

impl ScheduledBuffer {
    fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }
}

struct RenderState {
    queue: VecDeque<ScheduledBuffer>,
    tracker: Box<dyn CompletionTracker>,
    queued_samples: usize,
    frames_played: u64,
    failed: bool,
}

pub struct Renderer {
    mode: CompletionMode,
    channels: usize,
    state: Mutex<RenderState>,
    notify: Sender<Notification>,
}

impl Renderer {
    /// `channels` is the interleaving of every scheduled buffer and render target.
    pub fn new(mode: CompletionMode, channels: u16, notify: Sender<Notification>) -> Self {
        Self {
            mode,
            channels: channels.max(1) as usize,
            state: Mutex::new(RenderState {
                queue: VecDeque::new(),
                tracker: mode.tracker(),
                queued_samples: 0,
                frames_played: 0,
                failed: false,
            }),
            notify,
        }
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    // A panic elsewhere must not stop cleanup from reaching listeners.
    fn lock(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, notification: Notification) {
        if self.notify.send(notification).is_err() {
            tracing::debug!("notification dropped: dispatcher gone");
        }
    }

    /// Append interleaved samples already in the output format.
    ///
    /// Empty buffers are ignored and never open a session. A trailing partial
    /// frame is discarded. Fails while the stream is marked failed.
    pub fn schedule(&self, mut samples: Vec<f32>) -> Result<()> {
        let partial = samples.len() % self.channels;
        if partial != 0 {
            tracing::warn!(partial, "dropping trailing partial frame");
            samples.truncate(samples.len() - partial);
        }
        if samples.is_empty() {
            tracing::debug!("ignoring empty buffer");
            return Ok(());
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.failed {
            return Err(AudioError::StreamError(
                "output stream failed; buffer dropped".to_string(),
            ));
        }

        state.queued_samples += samples.len();
        state.queue.push_back(ScheduledBuffer { samples, pos: 0 });
        tracing::trace!(queued = state.queue.len(), "buffer scheduled");

        if state.tracker.on_scheduled() {
            tracing::debug!("playback session started");
            self.send(Notification::Started);
        }
        Ok(())
    }

    /// Fill `out` with queued audio, padding with silence.
    pub fn render(&self, out: &mut [f32]) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.failed = false;

        let mut finished = false;
        let mut written = 0;
        while written < out.len() {
            let Some(front) = state.queue.front_mut() else {
                break;
            };
            let n = front.remaining().min(out.len() - written);
            out[written..written + n].copy_from_slice(&front.samples[front.pos..front.pos + n]);
            front.pos += n;
            written += n;
            state.queued_samples -= n;
            state.frames_played += (n / self.channels) as u64;

            if front.remaining() == 0 {
                state.queue.pop_front();
                finished |= state.tracker.on_buffer_complete();
            }
        }

        out[written..].fill(0.0);

        if state.queue.is_empty() {
            finished |= state.tracker.on_queue_drained();
        }

        if finished {
            tracing::debug!("playback session finished");
            self.send(Notification::Finished);
        }
    }

    /// Drop all queued audio. An open session is closed and reported.
    ///
    /// Returns true if a session was open.
    pub fn clear(&self) -> bool {
        let mut guard = self.lock();
        self.clear_locked(&mut guard)
    }

    fn clear_locked(&self, state: &mut RenderState) -> bool {
        let dropped = state.queue.len();
        state.queue.clear();
        state.queued_samples = 0;
        if dropped > 0 {
            tracing::debug!(dropped, "cleared queued buffers");
        }

        let was_active = state.tracker.reset();
        if was_active {
            self.send(Notification::Finished);
        }
        was_active
    }

    /// Log and report a playback error, then run the cleanup path.
    ///
    /// The stream counts as failed until the next `render` call.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(error = %message, "playback error");

        let mut guard = self.lock();
        guard.failed = true;
        self.send(Notification::Error(message));
        self.clear_locked(&mut guard);
    }

    pub fn is_active(&self) -> bool {
        self.lock().tracker.is_active()
    }

    pub fn status(&self) -> PlaybackStatus {
        let state = self.lock();
        PlaybackStatus {
            playing: state.tracker.is_active(),
            queued_buffers: state.queue.len(),
            queued_frames: (state.queued_samples / self.channels) as u64,
            frames_played: state.frames_played,
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn renderer(mode: CompletionMode, channels: u16) -> (Renderer, Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Renderer::new(mode, channels, tx), rx)
    }

    fn drain(rx: &Receiver<Notification>) -> Vec<Notification> {
        rx.try_iter().collect()
    }

    const MODES: [CompletionMode; 2] = [CompletionMode::BufferCount, CompletionMode::QueueDrain];

    #[test]
    fn test_render_copies_in_order_and_pads_silence() {
        let (r, _rx) = renderer(CompletionMode::BufferCount, 1);
        r.schedule(vec![0.1, 0.2]).unwrap();
        r.schedule(vec![0.3]).unwrap();

        let mut out = [9.0; 5];
        r.render(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_single_session_fires_once() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 2);
            r.schedule(vec![0.5; 8]).unwrap();
            r.schedule(vec![0.5; 8]).unwrap();
            assert_eq!(drain(&rx), vec![Notification::Started], "{mode:?}");

            let mut out = [0.0; 6];
            r.render(&mut out);
            assert!(drain(&rx).is_empty(), "{mode:?}: mid-session");
            r.render(&mut out);
            r.render(&mut out);
            assert_eq!(drain(&rx), vec![Notification::Finished], "{mode:?}");

            // idle callbacks stay quiet
            r.render(&mut out);
            assert!(drain(&rx).is_empty(), "{mode:?}: idle");
            assert!(!r.is_active());
        }
    }

    #[test]
    fn test_enqueue_during_playback_extends_session() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 1);
            r.schedule(vec![0.1; 4]).unwrap();
            let mut out = [0.0; 3];
            r.render(&mut out);
            r.schedule(vec![0.2; 4]).unwrap();
            r.render(&mut out);
            r.render(&mut out);
            assert_eq!(
                drain(&rx),
                vec![Notification::Started, Notification::Finished],
                "{mode:?}"
            );
        }
    }

    #[test]
    fn test_second_session_after_drain() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 1);
            let mut out = [0.0; 4];
            r.schedule(vec![0.1; 4]).unwrap();
            r.render(&mut out);
            r.schedule(vec![0.1; 2]).unwrap();
            r.render(&mut out);
            assert_eq!(
                drain(&rx),
                vec![
                    Notification::Started,
                    Notification::Finished,
                    Notification::Started,
                    Notification::Finished,
                ],
                "{mode:?}"
            );
        }
    }

    #[test]
    fn test_empty_buffer_never_opens_session() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 2);
            r.schedule(Vec::new()).unwrap();
            r.schedule(vec![0.5]).unwrap();
            let mut out = [0.0; 4];
            r.render(&mut out);
            assert!(drain(&rx).is_empty(), "{mode:?}");
            assert_eq!(r.status().queued_buffers, 0);
        }
    }

    #[test]
    fn test_clear_closes_open_session() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 1);
            assert!(!r.clear());
            r.schedule(vec![0.1; 100]).unwrap();
            assert!(r.clear());
            assert!(!r.clear());
            assert_eq!(
                drain(&rx),
                vec![Notification::Started, Notification::Finished],
                "{mode:?}"
            );
            assert_eq!(r.status().queued_frames, 0);
        }
    }

    #[test]
    fn test_fail_reports_error_then_finished() {
        let (r, rx) = renderer(CompletionMode::QueueDrain, 1);
        r.schedule(vec![0.1; 100]).unwrap();
        r.fail("device unplugged");
        assert_eq!(
            drain(&rx),
            vec![
                Notification::Started,
                Notification::Error("device unplugged".to_string()),
                Notification::Finished,
            ]
        );
    }

    #[test]
    fn test_schedule_after_fail_is_rejected_until_callback_runs() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 1);
            r.fail("device unplugged");

            let err = r.schedule(vec![0.1; 10]).unwrap_err();
            assert!(matches!(err, AudioError::StreamError(_)), "{mode:?}");
            assert!(!r.is_active(), "{mode:?}");
            assert_eq!(r.status().queued_buffers, 0);
            assert_eq!(
                drain(&rx),
                vec![Notification::Error("device unplugged".to_string())],
                "{mode:?}"
            );

            // a callback means the stream is alive again
            let mut out = [0.0; 4];
            r.render(&mut out);
            r.schedule(vec![0.1; 2]).unwrap();
            r.render(&mut out);
            assert_eq!(
                drain(&rx),
                vec![Notification::Started, Notification::Finished],
                "{mode:?}"
            );
        }
    }

    #[test]
    fn test_concurrent_schedule_and_render_alternate() {
        for mode in MODES {
            let (r, rx) = renderer(mode, 1);
            let r = Arc::new(r);
            let done = Arc::new(AtomicBool::new(false));

            let callback = {
                let r = Arc::clone(&r);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut out = [0.0; 4];
                    while !done.load(Ordering::Acquire) {
                        r.render(&mut out);
                    }
                })
            };

            for _ in 0..2_000 {
                r.schedule(vec![0.1]).unwrap();
                while r.is_active() {
                    thread::yield_now();
                }
            }
            done.store(true, Ordering::Release);
            callback.join().unwrap();

            let notifications = drain(&rx);
            assert_eq!(notifications.len(), 4_000, "{mode:?}");
            for pair in notifications.chunks(2) {
                assert_eq!(
                    pair,
                    &[Notification::Started, Notification::Finished][..],
                    "{mode:?}"
                );
            }
        }
    }

    #[test]
    fn test_clear_racing_schedule_keeps_order() {
        let (r, rx) = renderer(CompletionMode::BufferCount, 1);
        let r = Arc::new(r);

        let stopper = {
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    r.clear();
                }
            })
        };
        for _ in 0..2_000 {
            r.schedule(vec![0.1; 8]).unwrap();
        }
        stopper.join().unwrap();
        r.clear();

        let notifications = drain(&rx);
        assert!(!notifications.is_empty());
        for pair in notifications.chunks(2) {
            assert_eq!(pair, &[Notification::Started, Notification::Finished][..]);
        }
    }

    #[test]
    fn test_status_counts_frames() {
        let (r, _rx) = renderer(CompletionMode::BufferCount, 2);
        r.schedule(vec![0.0; 10]).unwrap();
        r.schedule(vec![0.0; 6]).unwrap();
        let status = r.status();
        assert!(status.playing);
        assert_eq!(status.queued_buffers, 2);
        assert_eq!(status.queued_frames, 8);

        let mut out = [0.0; 12];
        r.render(&mut out);
        let status = r.status();
        assert_eq!(status.queued_buffers, 1);
        assert_eq!(status.queued_frames, 2);
        assert_eq!(status.frames_played, 6);
    }

    #[test]
    fn test_dispatcher_gone_does_not_panic() {
        let (r, rx) = renderer(CompletionMode::BufferCount, 1);
        drop(rx);
        r.schedule(vec![0.1]).unwrap();
        let mut out = [0.0; 2];
        r.render(&mut out);
        assert!(!r.is_active());
    }
}
