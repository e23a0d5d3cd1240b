/// Receiver event consumer driving the local pipeline
pub mod player;
/// Receiver and player wiring
pub mod service;
/// Output selection list
pub mod targets;

pub use player::*;
pub use service::*;
pub use targets::*;
