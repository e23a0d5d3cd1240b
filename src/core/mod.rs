use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::services::{audio::AudioError, control::ControlError, sendspin::SendspinError};

/// Error types for the madesk application.
///
/// Aggregates the per-service errors together with the settings and
/// filesystem failures that can occur while bootstrapping the player.
#[derive(Error, Debug)]
pub enum MadeskError {
    /// Settings value missing or invalid
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting {
        /// The setting that is invalid
        field: String,
        /// Reason why the setting is invalid
        reason: String,
    },

    /// I/O operation error
    #[error("I/O error on '{path}': {details}")]
    IoError {
        /// Path where I/O error occurred
        path: PathBuf,
        /// I/O error details
        details: String,
    },

    /// Standard I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error with location context
    #[error("failed to process JSON at '{location}': {details}")]
    JsonError {
        /// File path or "string"
        location: String,
        /// Parse error details
        details: String,
    },

    /// Music Assistant control-plane error
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Sendspin receiver error
    #[error(transparent)]
    Sendspin(#[from] SendspinError),

    /// Local audio output error
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// A specialized `Result` type for madesk operations.
pub type Result<T> = std::result::Result<T, MadeskError>;

impl MadeskError {
    /// Creates a JSON error with optional file path context.
    ///
    /// # Arguments
    ///
    /// * `error` - The underlying serde error
    /// * `path` - Optional path to the file being processed
    pub fn json(error: impl std::fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => p.to_string_lossy().to_string(),
            None => "string".to_string(),
        };

        MadeskError::JsonError {
            location,
            details: error.to_string(),
        }
    }

    /// Creates an I/O error carrying the path that failed.
    pub fn io_at(error: &std::io::Error, path: &Path) -> Self {
        MadeskError::IoError {
            path: path.to_path_buf(),
            details: error.to_string(),
        }
    }

    /// Short, human-readable description suitable for status lines.
    ///
    /// Control-plane errors use their own phrasing so that missing and
    /// rejected credentials read differently.
    pub fn user_message(&self) -> String {
        match self {
            MadeskError::Control(err) => err.user_message(),
            MadeskError::Sendspin(err) => err.to_string(),
            MadeskError::Audio(err) => err.to_string(),
            MadeskError::InvalidSetting { field, .. } => format!("Setting '{field}' is invalid"),
            MadeskError::IoError { path, .. } => format!("Unable to access {}", path.display()),
            MadeskError::Io(err) => err.to_string(),
            MadeskError::JsonError { location, .. } => format!("Unable to read {location}"),
        }
    }
}
