use tracing::{debug, info, warn};

use super::{AudioChunk, ReceiverEvent, ReceiverState, ServerMessage};

/// Outcome of handling one server message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Event for the listener, if any
    pub event: Option<ReceiverEvent>,
    /// The client must report its state back
    pub acknowledge: bool,
}

impl Dispatch {
    fn event(event: ReceiverEvent) -> Self {
        Self {
            event: Some(event),
            acknowledge: false,
        }
    }
}

/// Turns server messages into receiver events.
///
/// Holds the stream session flag only; the connection loop owns the
/// socket and the clock. Audio arriving outside a stream is ignored.
#[derive(Debug, Default)]
pub struct StreamDispatcher {
    chunks: u64,
}

impl StreamDispatcher {
    /// Creates a dispatcher with no active stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one text message, updating soft state in `state`.
    pub fn dispatch(&mut self, message: ServerMessage, state: &ReceiverState) -> Dispatch {
        match message {
            ServerMessage::Hello => {
                debug!("Sendspin server hello received");
                Dispatch::default()
            }
            ServerMessage::StreamStart(player) => {
                let Some(player) = player else {
                    return Dispatch::default();
                };
                match player.pcm_format() {
                    Ok(format) => {
                        self.chunks = 0;
                        state.stream.set(Some(format));
                        info!("Sendspin stream started: {format}");
                        Dispatch::event(ReceiverEvent::StreamStart(format))
                    }
                    Err(err) => {
                        warn!("{err}");
                        Dispatch::default()
                    }
                }
            }
            ServerMessage::StreamEnd => {
                state.stream.set(None);
                if self.chunks > 0 {
                    info!("Sendspin stream ended after {} chunks.", self.chunks);
                }
                Dispatch::event(ReceiverEvent::StreamEnd)
            }
            ServerMessage::StreamClear => Dispatch::event(ReceiverEvent::StreamClear),
            ServerMessage::Command(player) => {
                let Some(player) = player else {
                    return Dispatch::default();
                };
                let event = match player.command.as_str() {
                    "volume" => player.volume.map(|volume| {
                        state.set_volume_percent(volume);
                        ReceiverEvent::VolumeChanged(state.volume_percent())
                    }),
                    "mute" => player.mute.map(|muted| {
                        state.muted.set(muted);
                        ReceiverEvent::MuteChanged(muted)
                    }),
                    other => {
                        debug!("Ignoring Sendspin command {other}");
                        None
                    }
                };
                Dispatch {
                    event,
                    acknowledge: true,
                }
            }
            ServerMessage::Time(_) => Dispatch::default(),
            ServerMessage::Other(kind) => {
                debug!("Ignoring Sendspin message {kind}");
                Dispatch::default()
            }
        }
    }

    /// Handles one audio frame.
    ///
    /// Returns `None` when no stream is active.
    pub fn audio(&mut self, chunk: AudioChunk, state: &ReceiverState) -> Option<ReceiverEvent> {
        let format = state.stream.get()?;
        self.chunks += 1;
        if self.chunks == 1 {
            debug!(
                "Sendspin first audio chunk: {} bytes at {} us",
                chunk.payload.len(),
                chunk.timestamp_us
            );
        }
        Some(ReceiverEvent::AudioChunk {
            timestamp_us: chunk.timestamp_us,
            payload: chunk.payload,
            format,
        })
    }

    /// Ends any active stream after the connection dropped.
    pub fn reset(&mut self, state: &ReceiverState) {
        self.chunks = 0;
        state.stream.set(None);
    }

    /// Chunks forwarded in the current stream.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }
}
