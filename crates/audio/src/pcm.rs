//! PCM buffer decoding and conversion to the output device format.

use serde::{Deserialize, Serialize};

use crate::config::{input_rate_in_range, MAX_INPUT_SAMPLE_RATE, MIN_INPUT_SAMPLE_RATE};
use crate::{AudioError, Result};

/// Sample encoding of raw PCM bytes (little-endian).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcmEncoding {
    #[default]
    I16,
    F32,
}

impl PcmEncoding {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            PcmEncoding::I16 => 2,
            PcmEncoding::F32 => 4,
        }
    }
}

/// Sample rate and channel count the renderer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One discrete chunk of interleaved PCM as submitted by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn from_i16(samples: &[i16], sample_rate: u32, channels: u16) -> Self {
        Self::new(i16_to_f32(samples), sample_rate, channels)
    }

    pub fn from_bytes(
        bytes: &[u8],
        encoding: PcmEncoding,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        Ok(Self::new(
            decode_pcm_bytes(bytes, encoding)?,
            sample_rate,
            channels,
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }

    /// Convert to interleaved samples in `format`: channel remap, then resample.
    ///
    /// The buffer's sample rate must lie within the accepted input range.
    pub fn into_output(self, format: OutputFormat) -> Result<Vec<f32>> {
        if self.channels == 0 {
            return Err(AudioError::InvalidPcm("buffer has zero channels".into()));
        }
        if !input_rate_in_range(self.sample_rate) {
            return Err(AudioError::InvalidPcm(format!(
                "sample rate {} outside {MIN_INPUT_SAMPLE_RATE}..={MAX_INPUT_SAMPLE_RATE}",
                self.sample_rate
            )));
        }
        if self.samples.len() % self.channels as usize != 0 {
            return Err(AudioError::InvalidPcm(format!(
                "{} samples do not divide into {} channels",
                self.samples.len(),
                self.channels
            )));
        }

        let out_channels = format.channels as usize;
        let remapped = if self.channels == format.channels {
            self.samples
        } else {
            remap_channels(&self.samples, self.channels as usize, out_channels)
        };

        if self.sample_rate == format.sample_rate {
            Ok(remapped)
        } else {
            Ok(resample_linear(
                &remapped,
                out_channels,
                self.sample_rate,
                format.sample_rate,
            ))
        }
    }
}

/// Scale signed 16-bit samples to `[-1.0, 1.0)`.
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Decode little-endian PCM bytes. A trailing partial sample is rejected.
pub fn decode_pcm_bytes(bytes: &[u8], encoding: PcmEncoding) -> Result<Vec<f32>> {
    let width = encoding.bytes_per_sample();
    if bytes.len() % width != 0 {
        return Err(AudioError::InvalidPcm(format!(
            "{} bytes is not a whole number of {:?} samples",
            bytes.len(),
            encoding
        )));
    }

    let samples = match encoding {
        PcmEncoding::I16 => bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect(),
        PcmEncoding::F32 => bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    };
    Ok(samples)
}

/// Map interleaved frames from `from` channels to `to` channels.
///
/// Mono fans out to every channel, anything folds down to mono by averaging,
/// other layouts copy the matching channel and repeat the last one.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);

    if to == 1 {
        let inv_channels = 1.0 / from as f32;
        for frame in samples.chunks_exact(from) {
            let sum: f32 = frame.iter().sum();
            output.push(sum * inv_channels);
        }
        return output;
    }

    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            output.push(frame[ch.min(from - 1)]);
        }
    }
    output
}

/// Stateless linear interpolation over interleaved frames.
///
/// Each buffer is resampled on its own so buffer boundaries stay intact for
/// completion tracking.
pub fn resample_linear(samples: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if channels == 0 || from_rate == to_rate || from_rate == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_frames = ((frames as f64 * ratio) as usize).max(1);
    let mut output = Vec::with_capacity(new_frames * channels);

    for i in 0..new_frames {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        for ch in 0..channels {
            let at = |frame: usize| samples[frame * channels + ch];
            let sample = if idx + 1 < frames {
                at(idx) * (1.0 - frac) + at(idx + 1) * frac
            } else {
                at(idx.min(frames - 1))
            };
            output.push(sample);
        }
    }
    output
}
