//! Equalizer band validation and state.
//!
//! Band counts and gains are clamped to what the filter stage accepts.
//! Disabling the equalizer flattens every band instead of removing the stage.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Smallest accepted band count.
pub const MIN_BANDS: usize = 1;
/// Largest accepted band count.
pub const MAX_BANDS: usize = 64;
/// Band count used until configured.
pub const DEFAULT_BANDS: usize = 10;
/// Lowest gain applied to a band, in dB.
pub const MIN_GAIN_DB: f64 = -24.0;
/// Highest gain applied to a band, in dB.
pub const MAX_GAIN_DB: f64 = 12.0;

/// One parametric equalizer band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Center frequency in Hz
    pub freq: f64,
    /// Bandwidth in Hz
    pub bandwidth: f64,
    /// Gain in dB
    pub gain: f64,
}

/// Snapshot returned by `get_eq_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqState {
    /// Whether band gains are applied
    pub enabled: bool,
    /// Number of bands on the equalizer stage
    pub num_bands: usize,
    /// Validated band configuration
    pub band_configs: Vec<EqBand>,
}

impl Default for EqState {
    fn default() -> Self {
        Self {
            enabled: false,
            num_bands: DEFAULT_BANDS,
            band_configs: Vec::new(),
        }
    }
}

/// Change to apply to one band of the equalizer stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandUpdate {
    /// Set the band's gain to 0 dB, keeping frequency and width.
    Flatten {
        /// Band index
        index: usize,
    },
    /// Configure the band fully.
    Set {
        /// Band index
        index: usize,
        /// Band parameters
        band: EqBand,
    },
}

impl EqState {
    /// Replaces the band configuration.
    ///
    /// The band count is clamped to `1..=64`. Bands with a non-positive
    /// frequency or bandwidth are skipped, gains are clamped to
    /// `[-24, 12]` dB, and at most `num_bands` bands are kept.
    pub fn configure(&mut self, num_bands: i64, bands: &[EqBand]) {
        let min = MIN_BANDS as i64;
        let max = MAX_BANDS as i64;
        if !(min..=max).contains(&num_bands) {
            warn!("EQ band count out of range: {num_bands}");
        }
        let num_bands = num_bands.clamp(min, max) as usize;

        let mut validated = Vec::with_capacity(num_bands.min(bands.len()));
        for band in bands {
            if validated.len() >= num_bands {
                break;
            }
            if let Some(band) = validate_band(band) {
                validated.push(band);
            }
        }

        self.num_bands = num_bands;
        self.band_configs = validated;
    }

    /// Enables or flattens the equalizer.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Band updates reproducing this state on a freshly configured stage.
    ///
    /// Disabled equalizers flatten every band instead of being bypassed, so
    /// the graph never has to be relinked.
    pub fn band_updates(&self) -> Vec<BandUpdate> {
        let updates = if self.enabled {
            self.band_configs
                .iter()
                .take(self.num_bands)
                .enumerate()
                .map(|(index, band)| BandUpdate::Set { index, band: *band })
                .collect()
        } else {
            (0..self.num_bands)
                .map(|index| BandUpdate::Flatten { index })
                .collect()
        };
        debug!(
            "EQ configured: enabled={}, bands={}",
            self.enabled, self.num_bands
        );
        updates
    }
}

fn validate_band(band: &EqBand) -> Option<EqBand> {
    let usable = band.freq.is_finite()
        && band.bandwidth.is_finite()
        && band.freq > 0.0
        && band.bandwidth > 0.0
        && !band.gain.is_nan();
    if !usable {
        warn!("Invalid EQ band configuration: {band:?}");
        return None;
    }

    let mut gain = band.gain;
    if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain) {
        warn!("EQ band gain out of range: {gain}");
        gain = gain.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
    }

    Some(EqBand { gain, ..*band })
}
