use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde_json::{Value, json};
use tokio::{
    net::TcpStream,
    sync::{Mutex as AsyncMutex, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, http::Uri},
};
use tracing::{debug, info, instrument, warn};

use super::{
    ControlConnection, ControlError, Connector, Endpoint, PlaybackCommand, Player, PlayerAction,
    PlayerControl, PlayerQueue, ServerInfo, usable_players,
};

/// Client API schema this implementation speaks.
pub const CLIENT_SCHEMA_VERSION: u32 = 28;
/// Oldest server schema still understood.
pub const MIN_SERVER_SCHEMA_VERSION: u32 = 24;
/// Server error code for a missing token.
pub const AUTH_REQUIRED_CODE: i64 = 20;
/// Server error code for a rejected token.
pub const AUTH_FAILED_CODE: i64 = 21;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket URL for a server base URL: `ws(s)://host[:port][/prefix]/ws`.
///
/// # Errors
/// Returns [`ControlError::NotConfigured`] for an empty URL and
/// [`ControlError::Connection`] when no host can be parsed.
pub fn control_url(server_url: &str) -> Result<String, ControlError> {
    let server_url = server_url.trim();
    if server_url.is_empty() {
        return Err(ControlError::NotConfigured);
    }
    let uri: Uri = server_url
        .parse()
        .map_err(|_| ControlError::Connection(format!("cannot connect to {server_url}: invalid URL")))?;
    let Some(authority) = uri.authority().filter(|authority| !authority.host().is_empty()) else {
        return Err(ControlError::Connection(format!(
            "cannot connect to {server_url}: missing host"
        )));
    };
    let scheme = match uri.scheme_str() {
        Some("https") | Some("wss") => "wss",
        _ => "ws",
    };
    let prefix = uri.path().trim_end_matches('/');
    Ok(format!("{scheme}://{authority}{prefix}/ws"))
}

/// Maps a server error reply to the matching error variant.
pub fn command_error(code: i64, details: String) -> ControlError {
    match code {
        AUTH_REQUIRED_CODE => ControlError::AuthenticationRequired,
        AUTH_FAILED_CODE => ControlError::AuthenticationFailed(details),
        _ => ControlError::Command { code, details },
    }
}

fn check_schema(info: &ServerInfo) -> Result<(), ControlError> {
    if info.min_supported_schema_version > CLIENT_SCHEMA_VERSION {
        return Err(ControlError::InvalidServerVersion(format!(
            "Server {} requires schema {} but this client supports {}",
            info.server_version, info.min_supported_schema_version, CLIENT_SCHEMA_VERSION
        )));
    }
    if info.schema_version < MIN_SERVER_SCHEMA_VERSION {
        return Err(ControlError::InvalidServerVersion(format!(
            "Server {} uses schema {}, at least {} is required",
            info.server_version, info.schema_version, MIN_SERVER_SCHEMA_VERSION
        )));
    }
    Ok(())
}

struct Pending {
    reply: oneshot::Sender<Result<Value, ControlError>>,
    partial: Vec<Value>,
}

struct ClientInner {
    sink: AsyncMutex<SplitSink<WsStream, Message>>,
    pending: Mutex<HashMap<String, Pending>>,
    connected: AtomicBool,
    next_id: AtomicU64,
    server_info: ServerInfo,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    fn route(&self, message: Value) {
        let Some(message_id) = message.get("message_id").and_then(message_id_text) else {
            if let Some(event) = message.get("event").and_then(Value::as_str) {
                debug!("Music Assistant event {event}");
            }
            return;
        };

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = pending.get_mut(&message_id) else {
            debug!("Reply for unknown message {message_id}");
            return;
        };

        if let Some(code) = message.get("error_code").and_then(Value::as_i64) {
            let details = message
                .get("details")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(entry) = pending.remove(&message_id) {
                let _ = entry.reply.send(Err(command_error(code, details)));
            }
            return;
        }

        let result = message.get("result").cloned().unwrap_or(Value::Null);
        if message.get("partial").and_then(Value::as_bool) == Some(true) {
            match result {
                Value::Array(items) => entry.partial.extend(items),
                other => entry.partial.push(other),
            }
            return;
        }

        if let Some(entry) = pending.remove(&message_id) {
            let result = if entry.partial.is_empty() {
                result
            } else {
                let mut items = entry.partial;
                match result {
                    Value::Array(rest) => items.extend(rest),
                    Value::Null => {}
                    other => items.push(other),
                }
                Value::Array(items)
            };
            let _ = entry.reply.send(Ok(result));
        }
    }

    fn fail_pending(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        let drained: Vec<Pending> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, pending)| pending)
            .collect();
        for pending in drained {
            let _ = pending
                .reply
                .send(Err(ControlError::Connection(reason.to_string())));
        }
    }
}

fn message_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

async fn read_loop(inner: Weak<ClientInner>, mut stream: SplitStream<WsStream>) {
    let reason = loop {
        let frame = stream.next().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(text.as_str()) {
                Ok(message) => inner.route(message),
                Err(err) => warn!("Ignoring malformed Music Assistant message: {err}"),
            },
            Some(Ok(Message::Close(_))) | None => break "connection closed",
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!("Music Assistant socket error: {err}");
                break "connection lost";
            }
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.fail_pending(reason);
        info!("Music Assistant {reason}");
    }
}

async fn read_server_info(stream: &mut SplitStream<WsStream>) -> Result<ServerInfo, ControlError> {
    let greeting = async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<ServerInfo>(text.as_str())
                        .map_err(|err| ControlError::Protocol(format!("invalid server info: {err}")));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(ControlError::Connection(
                        "connection closed before server info".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            }
        }
    };

    tokio::time::timeout(HANDSHAKE_TIMEOUT, greeting)
        .await
        .map_err(|_| ControlError::Connection("timed out waiting for server info".to_string()))?
}

/// Minimal Music Assistant websocket client.
///
/// Commands are JSON messages correlated by `message_id`. A reader task
/// routes replies and marks the client disconnected once the socket closes.
/// Must be created inside a Tokio runtime.
#[derive(Clone)]
pub struct MusicAssistantClient {
    inner: Arc<ClientInner>,
}

impl MusicAssistantClient {
    /// Connects, validates the server schema and authenticates.
    ///
    /// # Errors
    /// Returns [`ControlError::Connection`] when the server is unreachable,
    /// [`ControlError::InvalidServerVersion`] on a schema mismatch, and the
    /// authentication variants when the token is missing or rejected.
    #[instrument(skip(endpoint), fields(server = endpoint.server_url()))]
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, ControlError> {
        let url = control_url(endpoint.server_url())?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ControlError::Connection(format!("cannot connect to {url}: {err}")))?;
        let (sink, mut stream) = socket.split();

        let server_info = read_server_info(&mut stream).await?;
        check_schema(&server_info)?;

        let inner = Arc::new(ClientInner {
            sink: AsyncMutex::new(sink),
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            server_info,
            reader: Mutex::new(None),
        });
        let reader = tokio::spawn(read_loop(Arc::downgrade(&inner), stream));
        *inner.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(reader);

        let client = Self { inner };
        if let Some(token) = endpoint.token() {
            let auth = client.send_command("auth", json!({ "token": token })).await;
            if let Err(err) = auth {
                client.close().await;
                return Err(match err {
                    ControlError::Command { details, .. } => {
                        ControlError::AuthenticationFailed(details)
                    }
                    other => other,
                });
            }
        }

        info!(
            "Connected to Music Assistant {} (schema {})",
            client.inner.server_info.server_version, client.inner.server_info.schema_version
        );
        Ok(client)
    }

    /// Greeting received on connect.
    pub fn server_info(&self) -> &ServerInfo {
        &self.inner.server_info
    }

    /// Sends one command and waits for its result.
    ///
    /// Partial replies are concatenated into one array.
    ///
    /// # Errors
    /// Returns [`ControlError::Command`] for server errors and
    /// [`ControlError::Connection`] when the socket is gone.
    pub async fn send_command(&self, command: &str, args: Value) -> Result<Value, ControlError> {
        if !self.is_connected() {
            return Err(ControlError::Connection("not connected".to_string()));
        }

        let message_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let mut message = json!({ "message_id": message_id, "command": command });
        if !args.is_null() {
            message["args"] = args;
        }

        let (reply, response) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                message_id.clone(),
                Pending {
                    reply,
                    partial: Vec::new(),
                },
            );

        let sent = self
            .inner
            .sink
            .lock()
            .await
            .send(Message::text(message.to_string()))
            .await;
        if let Err(err) = sent {
            self.forget(&message_id);
            self.inner.connected.store(false, Ordering::SeqCst);
            return Err(err.into());
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ControlError::Connection("connection closed".to_string())),
            Err(_) => {
                self.forget(&message_id);
                Err(ControlError::Command {
                    code: 0,
                    details: format!("{command} timed out"),
                })
            }
        }
    }

    fn forget(&self, message_id: &str) {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(message_id);
    }

    /// Sends a transport command to a player.
    ///
    /// # Errors
    /// Returns error if the command fails.
    pub async fn player_command(
        &self,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<(), ControlError> {
        self.send_command(
            &format!("players/cmd/{action}"),
            json!({ "player_id": player_id }),
        )
        .await
        .map(drop)
    }

    /// Seeks the player to `seconds`.
    ///
    /// # Errors
    /// Returns error if the command fails.
    pub async fn seek(&self, player_id: &str, seconds: u32) -> Result<(), ControlError> {
        self.send_command(
            "players/cmd/seek",
            json!({ "player_id": player_id, "position": seconds }),
        )
        .await
        .map(drop)
    }
}

#[async_trait]
impl ControlConnection for MusicAssistantClient {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        let _ = self.inner.sink.lock().await.close().await;
        let reader = self
            .inner
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reader) = reader {
            reader.abort();
        }
        self.inner.fail_pending("connection closed");
    }
}

#[async_trait]
impl PlayerControl for MusicAssistantClient {
    async fn fetch_players(&self) -> Result<Vec<Player>, ControlError> {
        let raw = self.send_command("players/all", Value::Null).await?;
        let players: Vec<Player> = serde_json::from_value(raw)
            .map_err(|err| ControlError::Protocol(format!("invalid player list: {err}")))?;
        Ok(usable_players(players))
    }

    async fn active_queue(&self, player_id: &str) -> Result<Option<PlayerQueue>, ControlError> {
        let raw = self
            .send_command(
                "player_queues/get_active_queue",
                json!({ "player_id": player_id }),
            )
            .await?;
        if raw.is_null() {
            return Ok(None);
        }
        serde_json::from_value(raw)
            .map(Some)
            .map_err(|err| ControlError::Protocol(format!("invalid queue: {err}")))
    }

    async fn queue_command(
        &self,
        queue_id: &str,
        command: PlaybackCommand,
    ) -> Result<(), ControlError> {
        let args = match command {
            PlaybackCommand::Seek(position) => json!({ "queue_id": queue_id, "position": position }),
            _ => json!({ "queue_id": queue_id }),
        };
        self.send_command(command.command(), args).await.map(drop)
    }

    async fn set_player_volume(&self, player_id: &str, volume: u8) -> Result<(), ControlError> {
        self.send_command(
            "players/cmd/volume_set",
            json!({ "player_id": player_id, "volume_level": volume.min(100) }),
        )
        .await
        .map(drop)
    }
}

/// Connector producing [`MusicAssistantClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    type Connection = MusicAssistantClient;

    async fn connect(&self, endpoint: &Endpoint) -> Result<MusicAssistantClient, ControlError> {
        MusicAssistantClient::connect(endpoint).await
    }
}
