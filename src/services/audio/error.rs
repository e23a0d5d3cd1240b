use super::{PcmFormat, StageKind};

/// Errors that can occur while rendering Sendspin audio locally
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// Stream format has a zero field or an unsupported bit depth
    #[error("Invalid PCM format: {0}")]
    InvalidFormat(PcmFormat),

    /// A stage the graph cannot run without could not be created
    #[error("Failed to initialize {0} stage")]
    MissingStage(StageKind),

    /// Two stages refused to link
    #[error("Failed to link {upstream} to {downstream}")]
    LinkFailed {
        /// Stage producing data
        upstream: StageKind,
        /// Stage consuming data
        downstream: StageKind,
    },

    /// Graph did not accept a state change
    #[error("Pipeline state change failed: {0}")]
    StateChange(String),

    /// Source refused a buffer
    #[error("Audio push failed: {0}")]
    PushFailed(String),

    /// Source queue is full; the buffer was dropped instead of waiting
    #[error("Audio source queue full, dropped {0} bytes")]
    SourceFull(usize),

    /// Chunk format differs from the format the pipeline was built for
    #[error("Chunk format {actual} does not match pipeline format {expected}")]
    FormatMismatch {
        /// Format of the active pipeline
        expected: PcmFormat,
        /// Format announced with the chunk
        actual: PcmFormat,
    },

    /// Media framework could not be initialized
    #[error("Failed to initialize audio backend: {0}")]
    InitializationFailed(String),

    /// Output devices could not be listed
    #[error("Failed to enumerate output devices: {0}")]
    DeviceEnumeration(String),
}
