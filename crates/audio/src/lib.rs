mod config;
mod device;
mod pcm;
mod player;
mod renderer;
mod tracker;

pub use config::{
    PlayerConfig, DEFAULT_INPUT_CHANNELS, DEFAULT_INPUT_SAMPLE_RATE, MAX_INPUT_SAMPLE_RATE,
    MIN_INPUT_SAMPLE_RATE,
};
pub use device::{default_output_device, find_output_device, list_output_devices, OutputDevice};
pub use pcm::{
    decode_pcm_bytes, i16_to_f32, remap_channels, resample_linear, OutputFormat, PcmBuffer,
    PcmEncoding,
};
pub use player::Player;
pub use renderer::{Notification, PlaybackStatus, Renderer};
pub use tracker::{BufferCountTracker, CompletionMode, CompletionTracker, DrainTracker};

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("stream error: {0}")]
    StreamError(String),
    #[error("invalid pcm: {0}")]
    InvalidPcm(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("device error: {0}")]
    DeviceError(#[from] cpal::DevicesError),
    #[error("default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),
    #[error("build stream error: {0}")]
    BuildStreamError(#[from] cpal::BuildStreamError),
    #[error("play stream error: {0}")]
    PlayStreamError(#[from] cpal::PlayStreamError),
    #[error("thread error: {0}")]
    Thread(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_output_devices() {
        // Hosts without audio hardware may have no backend at all.
        match list_output_devices() {
            Ok(devices) => {
                println!("Found {} output devices:", devices.len());
                for device in &devices {
                    println!("  - {} (default: {})", device.name, device.is_default);
                }
            }
            Err(e) => println!("No output devices: {e}"),
        }
    }

    #[test]
    fn test_error_messages() {
        let err = AudioError::InvalidPcm("odd byte count".to_string());
        assert_eq!(err.to_string(), "invalid pcm: odd byte count");
        let err = AudioError::DeviceNotFound("Speakers".to_string());
        assert_eq!(err.to_string(), "device not found: Speakers");
    }
}
