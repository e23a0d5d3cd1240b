use tokio_tungstenite::tungstenite;

/// Message fragments that mark a failure as a dropped or unreachable server.
const CONNECTION_MARKERS: [&str; 5] = [
    "not connected",
    "connection closed",
    "connection lost",
    "disconnected",
    "cannot connect",
];

/// Music Assistant control-plane errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// No server URL has been configured
    #[error("Server URL not configured")]
    NotConfigured,

    /// The server requires a token and none was supplied
    #[error("authentication required")]
    AuthenticationRequired,

    /// The server rejected the supplied token
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Socket could not be opened or was lost
    #[error("connection error: {0}")]
    Connection(String),

    /// Server answered a command with an error
    #[error("command failed ({code}): {details}")]
    Command {
        /// Server error code
        code: i64,
        /// Server supplied description
        details: String,
    },

    /// Unexpected or malformed server message
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server speaks an API schema this client cannot use
    #[error("{0}")]
    InvalidServerVersion(String),

    /// The session thread could not be started
    #[error("session runtime unavailable: {0}")]
    Runtime(String),

    /// The session was stopped before the work completed
    #[error("client session stopped")]
    SessionStopped,
}

impl ControlError {
    /// Whether this failure means the connection should be dropped.
    ///
    /// Connection variants always qualify. Other variants qualify when their
    /// message mentions a lost or refused connection.
    pub fn is_connection_error(&self) -> bool {
        match self {
            ControlError::Connection(_) => true,
            ControlError::NotConfigured
            | ControlError::AuthenticationRequired
            | ControlError::AuthenticationFailed(_)
            | ControlError::InvalidServerVersion(_)
            | ControlError::Runtime(_)
            | ControlError::SessionStopped => false,
            ControlError::Command { details: message, .. } | ControlError::Protocol(message) => {
                let message = message.to_lowercase();
                CONNECTION_MARKERS
                    .iter()
                    .any(|marker| message.contains(marker))
            }
        }
    }

    /// Short description for status lines.
    pub fn user_message(&self) -> String {
        match self {
            ControlError::NotConfigured => "Server URL not configured.".to_string(),
            ControlError::AuthenticationRequired => {
                "Authentication required. Add an access token in Settings.".to_string()
            }
            ControlError::AuthenticationFailed(_) => {
                "Authentication failed. Check your access token.".to_string()
            }
            ControlError::Connection(details) => format!("Unable to reach server: {details}"),
            ControlError::Command { details, .. } => details.clone(),
            ControlError::InvalidServerVersion(details) => details.clone(),
            other => other.to_string(),
        }
    }
}

impl From<tungstenite::Error> for ControlError {
    fn from(err: tungstenite::Error) -> Self {
        ControlError::Connection(err.to_string())
    }
}
