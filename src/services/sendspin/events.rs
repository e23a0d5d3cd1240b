use crate::services::audio::PcmFormat;

/// Lifecycle and stream events raised by the receiver.
///
/// Events are delivered on the receiver's background thread, in arrival
/// order. Listeners that touch UI state must marshal to their own thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Handshake sent; the server may start streaming
    Connected,
    /// Connection lost; raised once per connected period
    Disconnected,
    /// A PCM stream started
    StreamStart(PcmFormat),
    /// The stream ended
    StreamEnd,
    /// Discontinuity: queued audio must be flushed
    StreamClear,
    /// Audio for the active stream
    AudioChunk {
        /// Server timestamp in microseconds
        timestamp_us: i64,
        /// Interleaved little-endian PCM
        payload: Vec<u8>,
        /// Format of the active stream
        format: PcmFormat,
    },
    /// Server changed the volume, in percent
    VolumeChanged(u8),
    /// Server changed the mute flag
    MuteChanged(bool),
}

/// Consumer of receiver events.
pub trait ReceiverListener: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: ReceiverEvent);
}

impl<F> ReceiverListener for F
where
    F: Fn(ReceiverEvent) + Send + Sync,
{
    fn on_event(&self, event: ReceiverEvent) {
        self(event);
    }
}
