/// Advertised format negotiation
pub mod capabilities;
/// Server message dispatch
pub mod dispatch;
/// Sendspin error types
pub mod error;
/// Receiver events and listeners
pub mod events;
/// Client identity
pub mod identity;
/// Wire messages
pub mod protocol;
/// Connection loop
pub mod receiver;
/// Watchable receiver state
pub mod state;

pub use capabilities::*;
pub use dispatch::*;
pub use error::*;
pub use events::*;
pub use identity::*;
pub use protocol::*;
pub use receiver::*;
pub use state::*;

#[cfg(test)]
mod tests;
