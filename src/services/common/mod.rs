//! Common building blocks shared by the services

/// Watchable state values
pub mod property;

pub use property::Property;
