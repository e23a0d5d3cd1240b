/// Music Assistant websocket client
pub mod client;
/// Player and queue commands
pub mod commands;
/// Connection seams
pub mod connection;
/// Control error types
pub mod error;
/// Server data models
pub mod models;
/// Serialized connection owner
pub mod session;

pub use client::*;
pub use commands::*;
pub use connection::*;
pub use error::*;
pub use models::*;
pub use session::*;
