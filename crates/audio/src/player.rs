//! Buffer player: cpal output stream plus notification dispatch.
//!
//! Three threads cooperate:
//! - the caller schedules buffers on the shared [`Renderer`],
//! - the output thread owns the cpal stream (streams are not `Send` on every
//!   platform) and its callback pulls from the renderer,
//! - the dispatcher thread turns renderer notifications into bus events, so
//!   listeners never run inside the audio callback.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream};
use crossbeam_channel::{Receiver, Sender};
use murmur_events::{
    event_names, EventBus, EventBusRef, PlaybackErrorEvent, PlaybackFinishedEvent,
    PlaybackStartedEvent,
};

use crate::config::PlayerConfig;
use crate::pcm::{OutputFormat, PcmBuffer, PcmEncoding};
use crate::renderer::{Notification, PlaybackStatus, Renderer};
use crate::tracker::CompletionMode;
use crate::{AudioError, Result};

pub struct Player {
    config: PlayerConfig,
    format: OutputFormat,
    renderer: Arc<Renderer>,
    output: Option<OutputThread>,
    dispatch_shutdown: Sender<()>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Player {
    /// Open the configured output device and start playing silence.
    pub fn new(config: PlayerConfig, bus: EventBusRef) -> Result<Self> {
        config.validate()?;
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        let (renderer, format, output) = OutputThread::spawn(config.clone(), notify_tx)?;
        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            mode = ?config.mode,
            "player ready"
        );
        Self::assemble(config, format, renderer, Some(output), notify_rx, bus)
    }

    /// Build a player without an output device.
    ///
    /// Audio is pulled through [`Player::render`] by whoever owns the real callback.
    pub fn detached(config: PlayerConfig, format: OutputFormat, bus: EventBusRef) -> Result<Self> {
        config.validate()?;
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(AudioError::InvalidConfig(format!(
                "unusable output format {format:?}"
            )));
        }
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        let renderer = Arc::new(Renderer::new(config.mode, format.channels, notify_tx));
        Self::assemble(config, format, renderer, None, notify_rx, bus)
    }

    fn assemble(
        config: PlayerConfig,
        format: OutputFormat,
        renderer: Arc<Renderer>,
        output: Option<OutputThread>,
        notify_rx: Receiver<Notification>,
        bus: EventBusRef,
    ) -> Result<Self> {
        let (dispatch_shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
        let dispatcher = spawn_dispatcher(notify_rx, shutdown_rx, bus)?;
        Ok(Self {
            config,
            format,
            renderer,
            output,
            dispatch_shutdown,
            dispatcher: Some(dispatcher),
        })
    }

    /// Convert a host buffer to the output format and schedule it.
    pub fn enqueue(&self, buffer: PcmBuffer) -> Result<()> {
        let frames = buffer.frames();
        let samples = buffer.into_output(self.format)?;
        tracing::trace!(frames, "enqueue buffer");
        self.renderer.schedule(samples)
    }

    /// Schedule samples in the configured input format.
    pub fn enqueue_samples(&self, samples: Vec<f32>) -> Result<()> {
        self.enqueue(PcmBuffer::new(
            samples,
            self.config.input_sample_rate,
            self.config.input_channels,
        ))
    }

    pub fn enqueue_pcm_bytes(
        &self,
        bytes: &[u8],
        encoding: PcmEncoding,
        sample_rate: u32,
        channels: u16,
    ) -> Result<()> {
        self.enqueue(PcmBuffer::from_bytes(bytes, encoding, sample_rate, channels)?)
    }

    /// Pull interleaved output frames. Meant for detached players.
    pub fn render(&self, out: &mut [f32]) {
        self.renderer.render(out);
    }

    /// Report an error from the stream driving a detached player.
    ///
    /// Emits `playback-error`, finishes an open session, and rejects new
    /// buffers until the next [`Player::render`].
    pub fn report_stream_error(&self, message: impl Into<String>) {
        self.renderer.fail(message);
    }

    /// Drop queued audio. Returns true if a session was open (and is now finished).
    pub fn stop(&self) -> bool {
        let was_active = self.renderer.clear();
        if was_active {
            tracing::info!("playback stopped");
        }
        was_active
    }

    pub fn is_playing(&self) -> bool {
        self.renderer.is_active()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.renderer.status()
    }

    pub fn output_format(&self) -> OutputFormat {
        self.format
    }

    pub fn mode(&self) -> CompletionMode {
        self.renderer.mode()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Some(output) = self.output.take() {
            output.shutdown();
        }

        if self.renderer.clear() {
            tracing::info!("player dropped mid-session; session finished");
        }

        let _ = self.dispatch_shutdown.send(());
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                tracing::error!("notification dispatcher panicked");
            }
        }
    }
}

fn spawn_dispatcher(
    notifications: Receiver<Notification>,
    shutdown: Receiver<()>,
    bus: EventBusRef,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("murmur-dispatch".to_string())
        .spawn(move || {
            loop {
                crossbeam_channel::select! {
                    recv(notifications) -> msg => match msg {
                        Ok(notification) => dispatch(&*bus, notification),
                        Err(_) => break,
                    },
                    recv(shutdown) -> _ => {
                        for notification in notifications.try_iter() {
                            dispatch(&*bus, notification);
                        }
                        break;
                    }
                }
            }
            tracing::debug!("notification dispatcher exiting");
        })?;
    Ok(handle)
}

fn dispatch(bus: &dyn EventBus, notification: Notification) {
    match notification {
        Notification::Started => {
            bus.emit_event(event_names::PLAYBACK_STARTED, &PlaybackStartedEvent {});
        }
        Notification::Finished => {
            tracing::info!("playback finished");
            bus.emit_event(event_names::PLAYBACK_FINISHED, &PlaybackFinishedEvent {});
        }
        Notification::Error(message) => {
            bus.emit_event(event_names::PLAYBACK_ERROR, &PlaybackErrorEvent { message });
        }
    }
}

/// Thread that owns the cpal output stream until shutdown.
struct OutputThread {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl OutputThread {
    fn spawn(
        config: PlayerConfig,
        notify: Sender<Notification>,
    ) -> Result<(Arc<Renderer>, OutputFormat, Self)> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("murmur-output".to_string())
            .spawn(move || {
                let stream = match open_stream(&config, notify) {
                    Ok((stream, renderer, format)) => {
                        let _ = ready_tx.send(Ok((renderer, format)));
                        stream
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to open output stream");
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Returns on shutdown or when the player is gone.
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::info!("output stream closed");
            })?;

        match ready_rx.recv() {
            Ok(Ok((renderer, format))) => Ok((
                renderer,
                format,
                Self {
                    shutdown: shutdown_tx,
                    handle,
                },
            )),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamError(
                    "output thread exited before the stream was ready".to_string(),
                ))
            }
        }
    }

    fn shutdown(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            tracing::error!("output thread panicked");
        }
    }
}

fn open_stream(
    config: &PlayerConfig,
    notify: Sender<Notification>,
) -> Result<(Stream, Arc<Renderer>, OutputFormat)> {
    let host = cpal::default_host();
    let device = crate::device::resolve_output_device(&host, config.device_id.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let supported = device.default_output_config()?;

    let format = OutputFormat {
        sample_rate: supported.sample_rate().0,
        channels: supported.channels(),
    };
    tracing::info!(
        device = %device_name,
        sample_rate = format.sample_rate,
        channels = format.channels,
        sample_format = ?supported.sample_format(),
        "opening output stream"
    );

    let renderer = Arc::new(Renderer::new(config.mode, format.channels, notify));
    let stream_config: cpal::StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_output::<f32>(&device, &stream_config, Arc::clone(&renderer))?,
        SampleFormat::I16 => build_output::<i16>(&device, &stream_config, Arc::clone(&renderer))?,
        SampleFormat::U16 => build_output::<u16>(&device, &stream_config, Arc::clone(&renderer))?,
        other => {
            return Err(AudioError::StreamError(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    };

    stream.play()?;
    Ok((stream, renderer, format))
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    renderer: Arc<Renderer>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let data_renderer = Arc::clone(&renderer);
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            data_renderer.render(&mut scratch);
            for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                *out = <T as cpal::Sample>::from_sample::<f32>(sample);
            }
        },
        move |err| renderer.fail(format!("output stream error: {err}")),
        None,
    )?;

    Ok(stream)
}
