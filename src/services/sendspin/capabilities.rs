use std::collections::{BTreeSet, HashSet};

use ::sendspin::protocol::messages::AudioFormatSpec;

use super::PCM_CODEC;
use crate::services::audio::SupportedFormat;

/// Formats advertised when no device formats are known.
pub const FALLBACK_FORMATS: [SupportedFormat; 2] = [
    SupportedFormat::new(48000, 16),
    SupportedFormat::new(44100, 16),
];

/// Channel count advertised for every format.
pub const ADVERTISED_CHANNELS: u16 = 2;

/// Adds a 16-bit entry for every rate that only appears at higher depths.
///
/// Synthesized entries follow the originals in ascending rate order, so the
/// server always has a 16-bit fallback per rate.
pub fn formats_for_sendspin(formats: &[SupportedFormat]) -> Vec<SupportedFormat> {
    let with_16: HashSet<u32> = formats
        .iter()
        .filter(|format| format.bit_depth == 16)
        .map(|format| format.sample_rate)
        .collect();
    let rates: BTreeSet<u32> = formats.iter().map(|format| format.sample_rate).collect();

    let mut result = formats.to_vec();
    result.extend(
        rates
            .into_iter()
            .filter(|rate| !with_16.contains(rate))
            .map(|rate| SupportedFormat::new(rate, 16)),
    );
    result
}

/// Format list for the hello message.
///
/// Falls back to [`FALLBACK_FORMATS`] when `formats` is empty and drops
/// duplicates while preserving order. Formats the wire types cannot carry
/// are skipped.
pub fn advertised_formats(formats: &[SupportedFormat]) -> Vec<AudioFormatSpec> {
    let source = if formats.is_empty() {
        &FALLBACK_FORMATS[..]
    } else {
        formats
    };

    let mut seen = HashSet::new();
    source
        .iter()
        .filter(|format| seen.insert(**format))
        .filter_map(|format| {
            Some(AudioFormatSpec {
                codec: PCM_CODEC.to_string(),
                channels: ADVERTISED_CHANNELS.try_into().ok()?,
                sample_rate: format.sample_rate.try_into().ok()?,
                bit_depth: format.bit_depth.try_into().ok()?,
            })
        })
        .collect()
}
