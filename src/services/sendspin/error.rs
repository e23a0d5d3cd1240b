/// Errors that can occur while talking to a Sendspin server
#[derive(thiserror::Error, Debug)]
pub enum SendspinError {
    /// Server URL could not be turned into a Sendspin endpoint
    #[error("Invalid Sendspin server URL: {0}")]
    InvalidUrl(String),

    /// Websocket connect, read or write failed
    #[error("Sendspin connection failed: {0}")]
    Connection(String),

    /// Message did not match the wire format
    #[error("Malformed Sendspin message: {0}")]
    Protocol(String),

    /// Stream announced a codec other than PCM
    #[error("Sendspin stream uses unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Stream announced a zero or unsupported format field
    #[error("Invalid Sendspin stream format: {sample_rate} Hz/{bit_depth}-bit/{channels} ch")]
    InvalidFormat {
        /// Announced sample rate
        sample_rate: u32,
        /// Announced bit depth
        bit_depth: u16,
        /// Announced channel count
        channels: u16,
    },

    /// Binary frame shorter than its header
    #[error("Sendspin audio frame too short: {0} bytes")]
    ShortFrame(usize),

    /// Outgoing message could not be encoded
    #[error("Failed to encode Sendspin message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background receiver could not be started
    #[error("Failed to start Sendspin receiver: {0}")]
    StartFailed(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for SendspinError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
