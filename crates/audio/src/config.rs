use serde::{Deserialize, Serialize};

use crate::tracker::CompletionMode;
use crate::{AudioError, Result};

/// Sample rate assumed for host buffers that do not state one.
pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 24_000;

/// Channel count assumed for host buffers that do not state one.
pub const DEFAULT_INPUT_CHANNELS: u16 = 1;

/// Lowest sample rate accepted for input buffers.
pub const MIN_INPUT_SAMPLE_RATE: u32 = 8_000;

/// Highest sample rate accepted for input buffers.
pub const MAX_INPUT_SAMPLE_RATE: u32 = 384_000;

/// Player configuration.
///
/// Deserialized from the host's plugin config; every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Session completion strategy.
    pub mode: CompletionMode,
    /// Output device name; `None` uses the host default.
    pub device_id: Option<String>,
    /// Default sample rate of submitted buffers.
    pub input_sample_rate: u32,
    /// Default channel count of submitted buffers.
    pub input_channels: u16,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mode: CompletionMode::platform_default(),
            device_id: None,
            input_sample_rate: DEFAULT_INPUT_SAMPLE_RATE,
            input_channels: DEFAULT_INPUT_CHANNELS,
        }
    }
}

pub(crate) fn input_rate_in_range(rate: u32) -> bool {
    (MIN_INPUT_SAMPLE_RATE..=MAX_INPUT_SAMPLE_RATE).contains(&rate)
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if !input_rate_in_range(self.input_sample_rate) {
            return Err(AudioError::InvalidConfig(format!(
                "input sample rate {} out of range",
                self.input_sample_rate
            )));
        }
        if self.input_channels == 0 {
            return Err(AudioError::InvalidConfig(
                "input channels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
