//! Sendspin wire messages.
//!
//! Text frames carry the JSON messages of the `sendspin` crate. Binary
//! frames carry audio: one type byte, a big-endian signed microsecond
//! timestamp, then interleaved little-endian PCM.

use std::time::{SystemTime, UNIX_EPOCH};

use ::sendspin::protocol::messages::{
    ClientHello, ClientState, ClientTime, DeviceInfo, Message, PlayerState, PlayerSyncState,
    PlayerV1Support,
};
use serde_json::Value;
use tokio_tungstenite::tungstenite::http::Uri;

use super::{ClientIdentity, SendspinError, advertised_formats};
use crate::services::audio::{PcmFormat, SupportedFormat};

/// TCP port the Sendspin endpoint listens on.
pub const SENDSPIN_PORT: u16 = 8927;
/// Path of the Sendspin endpoint.
pub const SENDSPIN_PATH: &str = "/sendspin";
/// Role advertised in the hello message.
pub const PLAYER_ROLE: &str = "player@v1";
/// Bytes the server may buffer ahead.
pub const BUFFER_CAPACITY: u32 = 512 * 1024;
/// Manufacturer reported in the device info.
pub const MANUFACTURER: &str = "Music Assistant GTK";
/// Software version reported in the device info.
pub const SOFTWARE_VERSION: &str = "1.0";
/// Codec name of raw PCM streams.
pub const PCM_CODEC: &str = "pcm";
/// Remote commands the player role honors.
pub const SUPPORTED_COMMANDS: [&str; 2] = ["volume", "mute"];

const AUDIO_HEADER_LEN: usize = 9;

/// Sendspin websocket URL for a Music Assistant server URL.
///
/// The host is reused, the port and path are fixed, and `https` servers
/// get `wss`.
///
/// # Errors
/// Returns `SendspinError::InvalidUrl` when the URL cannot be parsed.
pub fn sendspin_url(server_url: &str) -> Result<String, SendspinError> {
    let uri: Uri = server_url
        .trim()
        .parse()
        .map_err(|_| SendspinError::InvalidUrl(server_url.to_string()))?;
    let host = uri.host().filter(|host| !host.is_empty()).unwrap_or("localhost");
    let scheme = if uri.scheme_str() == Some("https") {
        "wss"
    } else {
        "ws"
    };
    Ok(format!("{scheme}://{host}:{SENDSPIN_PORT}{SENDSPIN_PATH}"))
}

/// Checks a full Sendspin websocket URL given directly.
///
/// # Errors
/// Returns `SendspinError::InvalidUrl` unless the URL has a `ws` or `wss`
/// scheme and a host.
pub fn endpoint_url(url: &str) -> Result<String, SendspinError> {
    let url = url.trim();
    let uri: Uri = url
        .parse()
        .map_err(|_| SendspinError::InvalidUrl(url.to_string()))?;
    let websocket = matches!(uri.scheme_str(), Some("ws" | "wss"));
    if !websocket || uri.host().is_none_or(str::is_empty) {
        return Err(SendspinError::InvalidUrl(url.to_string()));
    }
    Ok(url.to_string())
}

/// `client/hello` announcing the player role and the formats it accepts.
pub fn client_hello(identity: &ClientIdentity, formats: &[SupportedFormat]) -> Message {
    Message::ClientHello(ClientHello {
        client_id: identity.client_id.clone(),
        name: identity.name.clone(),
        version: 1,
        supported_roles: vec![PLAYER_ROLE.to_string()],
        device_info: Some(DeviceInfo {
            product_name: Some(identity.name.clone()),
            manufacturer: Some(MANUFACTURER.to_string()),
            software_version: Some(SOFTWARE_VERSION.to_string()),
        }),
        player_v1_support: Some(PlayerV1Support {
            supported_formats: advertised_formats(formats),
            buffer_capacity: BUFFER_CAPACITY.into(),
            supported_commands: SUPPORTED_COMMANDS.iter().map(|c| (*c).to_string()).collect(),
        }),
        artwork_v1_support: None,
        visualizer_v1_support: None,
    })
}

/// `client/state` reporting volume and mute.
pub fn client_state(volume: u8, muted: bool) -> Message {
    Message::ClientState(ClientState {
        player: Some(PlayerState {
            state: PlayerSyncState::Synchronized,
            volume: Some(volume),
            muted: Some(muted),
        }),
    })
}

/// `client/time` stamped with `client_transmitted` microseconds.
pub fn client_time(client_transmitted: i64) -> Message {
    Message::ClientTime(ClientTime { client_transmitted })
}

/// JSON text frame for an outgoing message.
///
/// # Errors
/// Returns error if serialization fails.
pub fn encode(message: &Message) -> Result<String, SendspinError> {
    Ok(serde_json::to_string(message)?)
}

/// Wall clock in microseconds since the Unix epoch, the time base of
/// `client/time`.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Player part of `stream/start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    /// Codec name
    pub codec: String,
    /// Samples per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Bits per sample
    pub bit_depth: u16,
}

impl StreamFormat {
    /// Validated PCM format of the stream.
    ///
    /// # Errors
    /// Returns `UnsupportedCodec` for non-PCM streams and `InvalidFormat`
    /// when a field is zero or the depth is unsupported.
    pub fn pcm_format(&self) -> Result<PcmFormat, SendspinError> {
        if !self.codec.eq_ignore_ascii_case(PCM_CODEC) {
            return Err(SendspinError::UnsupportedCodec(self.codec.clone()));
        }
        PcmFormat::new(self.sample_rate, self.bit_depth, self.channels).map_err(|_| {
            SendspinError::InvalidFormat {
                sample_rate: self.sample_rate,
                bit_depth: self.bit_depth,
                channels: self.channels,
            }
        })
    }
}

/// Player part of `server/command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    /// Command name, `volume` or `mute`
    pub command: String,
    /// Requested volume in percent
    pub volume: Option<i64>,
    /// Requested mute flag
    pub mute: Option<bool>,
}

/// Timestamps of one `client/time` round trip, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSample {
    /// Client clock when the request left
    pub client_transmitted: i64,
    /// Server clock when the request arrived
    pub server_received: i64,
    /// Server clock when the reply left
    pub server_transmitted: i64,
}

/// Server messages the receiver acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Server greeting
    Hello,
    /// A stream begins; `None` when it carries nothing for the player role
    StreamStart(Option<StreamFormat>),
    /// The stream ended
    StreamEnd,
    /// Discontinuity within the stream
    StreamClear,
    /// Remote control command for the player role
    Command(Option<PlayerCommand>),
    /// Clock synchronization reply
    Time(TimeSample),
    /// Any other message type
    Other(String),
}

impl ServerMessage {
    /// Parses a JSON text frame.
    ///
    /// `stream/end` and `stream/clear` are accepted without a payload.
    /// Unknown message types are not errors.
    ///
    /// # Errors
    /// Returns `SendspinError::Protocol` when the frame is not JSON or a
    /// message the receiver acts on is malformed.
    pub fn parse(text: &str) -> Result<Self, SendspinError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| SendspinError::Protocol(err.to_string()))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match serde_json::from_value::<Message>(value) {
            Ok(message) => Ok(Self::from_message(message, kind)),
            Err(err) => match kind.as_str() {
                "stream/end" => Ok(Self::StreamEnd),
                "stream/clear" => Ok(Self::StreamClear),
                "server/hello" => Ok(Self::Hello),
                "stream/start" | "server/command" | "server/time" | "" => {
                    Err(SendspinError::Protocol(format!("{kind}: {err}")))
                }
                _ => Ok(Self::Other(kind)),
            },
        }
    }

    fn from_message(message: Message, kind: String) -> Self {
        match message {
            Message::StreamStart(start) => {
                Self::StreamStart(start.player.map(|player| StreamFormat {
                    codec: player.codec.to_string(),
                    sample_rate: u32::try_from(player.sample_rate).unwrap_or_default(),
                    channels: u16::try_from(player.channels).unwrap_or_default(),
                    bit_depth: u16::try_from(player.bit_depth).unwrap_or_default(),
                }))
            }
            Message::StreamEnd(_) => Self::StreamEnd,
            Message::StreamClear(_) => Self::StreamClear,
            Message::ServerCommand(command) => {
                Self::Command(command.player.map(|player| PlayerCommand {
                    command: player.command.to_string(),
                    volume: player.volume.map(i64::from),
                    mute: player.mute,
                }))
            }
            Message::ServerTime(time) => Self::Time(TimeSample {
                client_transmitted: time.client_transmitted,
                server_received: time.server_received,
                server_transmitted: time.server_transmitted,
            }),
            _ if kind == "server/hello" => Self::Hello,
            _ => Self::Other(kind),
        }
    }
}

/// One binary audio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Server timestamp in microseconds
    pub timestamp_us: i64,
    /// Interleaved little-endian PCM
    pub payload: Vec<u8>,
}

impl AudioChunk {
    /// Splits a binary frame into timestamp and payload.
    ///
    /// The leading type byte is not inspected.
    ///
    /// # Errors
    /// Returns `SendspinError::ShortFrame` when the header is incomplete.
    pub fn parse(frame: &[u8]) -> Result<Self, SendspinError> {
        let Some((header, payload)) = frame.split_at_checked(AUDIO_HEADER_LEN) else {
            return Err(SendspinError::ShortFrame(frame.len()));
        };
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&header[1..]);

        Ok(Self {
            timestamp_us: i64::from_be_bytes(timestamp),
            payload: payload.to_vec(),
        })
    }

    /// Encodes a binary frame with the given type byte.
    pub fn encode(&self, kind: u8) -> Vec<u8> {
        let mut frame = Vec::with_capacity(AUDIO_HEADER_LEN + self.payload.len());
        frame.push(kind);
        frame.extend_from_slice(&self.timestamp_us.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}
