use thiserror::Error;

use crate::{core::MadeskError, services::control::ControlError};

/// Errors that can occur during CLI command execution.
///
/// Service failures keep their own short messages so the user sees the
/// same wording the desktop front-end shows.
#[derive(Error, Debug)]
pub enum CliError {
    /// An argument value could not be used.
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A service could not be created or failed while running.
    #[error("{service} error: {details}")]
    ServiceError {
        /// Service that failed
        service: String,
        /// User-facing description
        details: String,
    },

    /// Settings could not be read or written.
    #[error("Settings error: {0}")]
    Settings(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ControlError> for CliError {
    fn from(err: ControlError) -> Self {
        CliError::ServiceError {
            service: "Music Assistant".to_string(),
            details: err.user_message(),
        }
    }
}

impl From<MadeskError> for CliError {
    fn from(err: MadeskError) -> Self {
        match err {
            MadeskError::Control(err) => err.into(),
            MadeskError::Sendspin(err) => CliError::ServiceError {
                service: "Sendspin".to_string(),
                details: err.to_string(),
            },
            MadeskError::Audio(err) => CliError::ServiceError {
                service: "Audio".to_string(),
                details: err.to_string(),
            },
            other => CliError::Settings(other.user_message()),
        }
    }
}

/// Type alias for command execution results.
///
/// Commands return their output as a string; printing is left to `main`.
pub type CommandResult = Result<String, CliError>;
