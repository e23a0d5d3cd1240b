use async_trait::async_trait;

use super::ControlError;

/// Server URL and access token a connection is made with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    server_url: String,
    token: String,
}

impl Endpoint {
    /// Creates an endpoint, trimming both values.
    pub fn new(server_url: &str, token: &str) -> Self {
        Self {
            server_url: server_url.trim().to_string(),
            token: token.trim().to_string(),
        }
    }

    /// Server base URL, empty when unset.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Access token, `None` when the server needs none.
    pub fn token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }

    /// Whether a server URL is set.
    pub fn is_configured(&self) -> bool {
        !self.server_url.is_empty()
    }
}

/// Opens control connections
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection handle produced by this connector
    type Connection: ControlConnection;

    /// Open and authenticate a connection to `endpoint`
    ///
    /// # Errors
    /// Returns error if the server is unreachable, rejects the credentials,
    /// or speaks an incompatible schema
    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Connection, ControlError>;
}

/// An open control connection
///
/// Handles are cheap clones sharing one socket.
#[async_trait]
pub trait ControlConnection: Clone + Send + Sync + 'static {
    /// Whether the socket is still usable
    fn is_connected(&self) -> bool;

    /// Close the socket, failing any request still in flight
    async fn close(&self);
}
