use base64::Engine;
use murmur_audio::{OutputDevice, PcmBuffer, PcmEncoding, PlaybackStatus, Player};
use tauri::{command, State};

use crate::error::Result;
use crate::state::PlayerState;

/// Queue float samples in `[-1.0, 1.0]`.
#[command]
pub fn enqueue_samples(
    state: State<'_, PlayerState>,
    samples: Vec<f32>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
) -> Result<()> {
    queue_samples(&state, samples, sample_rate, channels)
}

/// Queue signed 16-bit samples.
#[command]
pub fn enqueue_pcm16(
    state: State<'_, PlayerState>,
    samples: Vec<i16>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
) -> Result<()> {
    state.with_player(|player| {
        let (rate, channels) = input_format(player, sample_rate, channels);
        Ok(player.enqueue(PcmBuffer::from_i16(&samples, rate, channels))?)
    })
}

/// Queue base64-encoded little-endian PCM (16-bit unless `encoding` says otherwise).
#[command]
pub fn enqueue_base64(
    state: State<'_, PlayerState>,
    data: String,
    encoding: Option<PcmEncoding>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
) -> Result<()> {
    queue_base64(&state, &data, encoding, sample_rate, channels)
}

/// Drop queued audio; an open session finishes immediately.
#[command]
pub fn stop_playback(state: State<'_, PlayerState>) -> Result<()> {
    state.with_player(|player| {
        player.stop();
        Ok(())
    })
}

#[command]
pub fn get_playback_status(state: State<'_, PlayerState>) -> Result<PlaybackStatus> {
    state.with_player(|player| Ok(player.status()))
}

#[command]
pub fn list_output_devices() -> Result<Vec<OutputDevice>> {
    Ok(murmur_audio::list_output_devices()?)
}

/// Fill in the configured input format for anything the caller left out.
fn input_format(player: &Player, sample_rate: Option<u32>, channels: Option<u16>) -> (u32, u16) {
    let config = player.config();
    (
        sample_rate.unwrap_or(config.input_sample_rate),
        channels.unwrap_or(config.input_channels),
    )
}

fn queue_samples(
    state: &PlayerState,
    samples: Vec<f32>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
) -> Result<()> {
    state.with_player(|player| {
        let (rate, channels) = input_format(player, sample_rate, channels);
        Ok(player.enqueue(PcmBuffer::new(samples, rate, channels))?)
    })
}

fn queue_base64(
    state: &PlayerState,
    data: &str,
    encoding: Option<PcmEncoding>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
) -> Result<()> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
    state.with_player(|player| {
        let (rate, channels) = input_format(player, sample_rate, channels);
        Ok(player.enqueue_pcm_bytes(&bytes, encoding.unwrap_or_default(), rate, channels)?)
    })
}
