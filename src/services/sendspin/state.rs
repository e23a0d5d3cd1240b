use crate::services::{audio::PcmFormat, common::Property};

/// Connection state of the receiver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected; waiting to retry or stopped
    #[default]
    Disconnected,
    /// Connect attempt in flight
    Connecting,
    /// Handshake sent
    Connected,
}

/// Watchable receiver state.
///
/// Volume and mute are soft state: they survive reconnects and are reported
/// to the server on every connect, heartbeat and command acknowledgment.
#[derive(Debug, Clone)]
pub struct ReceiverState {
    /// Connection state
    pub connection: Property<ConnectionState>,
    /// Format of the active stream, `None` between streams
    pub stream: Property<Option<PcmFormat>>,
    /// Volume, `0.0..=1.0`
    pub volume: Property<f64>,
    /// Mute flag
    pub muted: Property<bool>,
}

impl ReceiverState {
    /// State with the given starting volume.
    pub fn new(volume: f64) -> Self {
        Self {
            connection: Property::new(ConnectionState::Disconnected),
            stream: Property::new(None),
            volume: Property::new(clamp_unit(volume)),
            muted: Property::new(false),
        }
    }

    /// Whether the handshake has been sent on the current connection.
    pub fn is_connected(&self) -> bool {
        self.connection.get() == ConnectionState::Connected
    }

    /// Whether a stream is active.
    pub fn is_streaming(&self) -> bool {
        self.stream.get().is_some()
    }

    /// Volume rounded to percent.
    pub fn volume_percent(&self) -> u8 {
        (self.volume.get() * 100.0).round().clamp(0.0, 100.0) as u8
    }

    pub(crate) fn set_volume(&self, volume: f64) {
        self.volume.set(clamp_unit(volume));
    }

    pub(crate) fn set_volume_percent(&self, percent: i64) {
        let percent = percent.clamp(0, 100);
        self.set_volume(percent as f64 / 100.0);
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
