use std::fmt;

use serde::{Deserialize, Serialize};

use super::AudioError;

/// Bit depths the receiver accepts.
pub const SUPPORTED_BIT_DEPTHS: [u16; 3] = [16, 24, 32];

/// Format of an incoming PCM stream.
///
/// Equality is field-wise and doubles as the cache key deciding whether an
/// existing pipeline can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Samples per second per channel
    pub sample_rate: u32,
    /// Significant bits per sample
    pub bit_depth: u16,
    /// Interleaved channel count
    pub channels: u16,
}

impl PcmFormat {
    /// Creates a validated format.
    ///
    /// # Errors
    /// Returns `AudioError::InvalidFormat` when any field is zero or the bit
    /// depth is not one of 16, 24 or 32.
    pub fn new(sample_rate: u32, bit_depth: u16, channels: u16) -> Result<Self, AudioError> {
        let format = Self {
            sample_rate,
            bit_depth,
            channels,
        };
        if !format.is_valid() {
            return Err(AudioError::InvalidFormat(format));
        }
        Ok(format)
    }

    /// Whether every field holds a usable value.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0 && SUPPORTED_BIT_DEPTHS.contains(&self.bit_depth)
    }

    /// Bytes per sample for the nominal packing of this depth.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bit_depth / 8).max(1)
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz/{}-bit/{} ch",
            self.sample_rate, self.bit_depth, self.channels
        )
    }
}

/// A `(sample_rate, bit_depth)` pair an output device accepts.
///
/// Serialized as a two-element array to match the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u32, u16)", into = "(u32, u16)")]
pub struct SupportedFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Bits per sample
    pub bit_depth: u16,
}

impl SupportedFormat {
    /// Creates a new supported format entry.
    pub const fn new(sample_rate: u32, bit_depth: u16) -> Self {
        Self {
            sample_rate,
            bit_depth,
        }
    }
}

impl From<(u32, u16)> for SupportedFormat {
    fn from((sample_rate, bit_depth): (u32, u16)) -> Self {
        Self::new(sample_rate, bit_depth)
    }
}

impl From<SupportedFormat> for (u32, u16) {
    fn from(format: SupportedFormat) -> Self {
        (format.sample_rate, format.bit_depth)
    }
}

/// GStreamer raw sample format name for a bit depth.
///
/// A 24-bit stream carried in 4-byte containers maps to `S24_32LE`; unknown
/// depths fall back to `S16LE`.
pub fn gst_sample_format(bit_depth: u16, bytes_per_sample: Option<usize>) -> &'static str {
    match (bit_depth, bytes_per_sample) {
        (16, _) => "S16LE",
        (24, Some(4)) => "S24_32LE",
        (24, _) => "S24LE",
        (32, _) => "S32LE",
        _ => "S16LE",
    }
}

/// Interleaved raw audio caps string.
pub fn raw_caps(sample_format: &str, channels: u16, sample_rate: u32) -> String {
    format!(
        "audio/x-raw,format={sample_format},channels={channels},rate={sample_rate},layout=interleaved"
    )
}
