use std::fmt;

use serde::{Deserialize, Serialize};

/// Greeting the server sends right after the socket opens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    /// Unique server id
    pub server_id: String,
    /// Server release
    pub server_version: String,
    /// API schema the server speaks
    pub schema_version: u32,
    /// Oldest client schema the server still accepts
    pub min_supported_schema_version: u32,
    /// Base URL the server advertises for itself
    pub base_url: String,
}

/// A Music Assistant player.
///
/// Only the fields playback glue needs are decoded; the rest of the server
/// model is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player id
    pub player_id: String,
    /// Provider-assigned name
    #[serde(default)]
    pub name: String,
    /// User-facing name, when the server sends one
    #[serde(default)]
    pub display_name: Option<String>,
    /// Whether the player is reachable
    #[serde(default = "default_true")]
    pub available: bool,
    /// Whether the user has the player enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider domain, for example `sendspin`
    #[serde(default)]
    pub provider: String,
    /// Volume 0-100 when the player reports one
    #[serde(default)]
    pub volume_level: Option<u8>,
}

fn default_true() -> bool {
    true
}

impl Player {
    /// Name shown to the user.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ if !self.name.is_empty() => &self.name,
            _ => &self.player_id,
        }
    }

    /// Whether the player can receive commands.
    pub fn is_usable(&self) -> bool {
        self.available && self.enabled
    }
}

/// The queue currently feeding a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerQueue {
    /// Queue id
    pub queue_id: String,
    /// Queue state as reported, for example `playing`
    #[serde(default)]
    pub state: String,
    /// Whether the queue is active on the player
    #[serde(default)]
    pub active: bool,
}

/// Player-level transport commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    /// Start playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle between play and pause
    PlayPause,
    /// Stop playback
    Stop,
    /// Skip to the next item
    Next,
    /// Go back to the previous item
    Previous,
}

impl PlayerAction {
    /// Command path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerAction::Play => "play",
            PlayerAction::Pause => "pause",
            PlayerAction::PlayPause => "play_pause",
            PlayerAction::Stop => "stop",
            PlayerAction::Next => "next",
            PlayerAction::Previous => "previous",
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-level transport commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Pause the queue
    Pause,
    /// Resume the queue
    Resume,
    /// Skip to the next track
    Next,
    /// Go back to the previous track
    Previous,
    /// Jump to a position in seconds
    Seek(u32),
}

impl PlaybackCommand {
    /// Queue command name.
    pub fn command(self) -> &'static str {
        match self {
            PlaybackCommand::Pause => "player_queues/pause",
            PlaybackCommand::Resume => "player_queues/resume",
            PlaybackCommand::Next => "player_queues/next",
            PlaybackCommand::Previous => "player_queues/previous",
            PlaybackCommand::Seek(_) => "player_queues/seek",
        }
    }
}
