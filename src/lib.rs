//! madesk - Music Assistant desktop audio core.
//!
//! Turns this computer into a Music Assistant player and controls the others:
//!
//! - Sendspin receiver: connects to the server, negotiates PCM formats the
//!   local output accepts, and frames incoming audio
//! - GStreamer playback pipeline with volume, mute and a ten-band equalizer
//! - Local output discovery and routing through PipeWire, PulseAudio or ALSA
//! - Music Assistant control client with a single serialized connection
//! - CLI for listing outputs and players and for transport control
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use madesk::{config::SettingsStore, service_manager::Services};
//!
//! let store = SettingsStore::open_default()?;
//! let mut settings = store.load();
//! settings.ensure_client_id();
//!
//! let services = Services::new(settings)?;
//! services.playback.start("http://music-assistant.local:8095")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Persisted settings and paths.
pub mod config;

/// Core error types and result aliases.
pub mod core;

/// Command-line interface.
pub mod cli;

/// Receiver, playback and control services.
pub mod services;

/// Simple service instance manager.
pub mod service_manager;

/// Logging setup.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use core::{MadeskError, Result};
