/// Output device description and format negotiation
pub mod device;
/// Sink device enumeration and caching
pub mod discovery;
/// Equalizer band validation
pub mod equalizer;
/// Audio error types
pub mod error;
/// PCM stream formats and caps helpers
pub mod format;
/// Frame classification and timestamp reconciliation
pub mod framing;
/// Playback graph traits
pub mod graph;
/// GStreamer graph backend
pub mod gst_backend;
/// Sendspin playback pipeline
pub mod pipeline;
/// Sink backend routing
pub mod routing;
/// Ordered stage plan and assembly
pub mod stages;

pub use device::*;
pub use discovery::*;
pub use equalizer::*;
pub use error::*;
pub use format::*;
pub use framing::*;
pub use graph::*;
pub use gst_backend::*;
pub use pipeline::*;
pub use routing::*;
pub use stages::*;

#[cfg(test)]
mod tests;
