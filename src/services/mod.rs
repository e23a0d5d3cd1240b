/// Local audio output: devices, routing and the playback pipeline
pub mod audio;
/// Shared service building blocks
pub mod common;
/// Music Assistant control client
pub mod control;
/// This computer as a Music Assistant player
pub mod playback;
/// Sendspin stream receiver
pub mod sendspin;
