use async_trait::async_trait;
use tracing::info;

use super::{
    ClientSession, ControlError, Connector, Endpoint, PlaybackCommand, Player, PlayerQueue,
};
use crate::tracing_config::verbose_diagnostics;

/// Player and queue operations the playback glue relies on
#[async_trait]
pub trait PlayerControl: Send + Sync {
    /// Available and enabled players, sorted by name ignoring case
    ///
    /// # Errors
    /// Returns error if the player list cannot be fetched
    async fn fetch_players(&self) -> Result<Vec<Player>, ControlError>;

    /// The queue currently feeding `player_id`
    ///
    /// # Errors
    /// Returns error if the lookup fails
    async fn active_queue(&self, player_id: &str) -> Result<Option<PlayerQueue>, ControlError>;

    /// Issue a transport command to a queue
    ///
    /// # Errors
    /// Returns error if the server rejects the command
    async fn queue_command(
        &self,
        queue_id: &str,
        command: PlaybackCommand,
    ) -> Result<(), ControlError>;

    /// Set a player's volume, 0-100
    ///
    /// # Errors
    /// Returns error if the server rejects the command
    async fn set_player_volume(&self, player_id: &str, volume: u8) -> Result<(), ControlError>;
}

/// Keeps usable players and sorts them by name ignoring case.
pub fn usable_players(players: Vec<Player>) -> Vec<Player> {
    let mut players: Vec<Player> = players.into_iter().filter(Player::is_usable).collect();
    players.sort_by_cached_key(|player| player.label().to_lowercase());
    players
}

/// The preferred player when present, otherwise the first one.
///
/// # Errors
/// Returns a command error when `players` is empty.
pub fn pick_player<'a>(
    players: &'a [Player],
    preferred: Option<&str>,
) -> Result<&'a Player, ControlError> {
    let first = players.first().ok_or_else(|| ControlError::Command {
        code: 0,
        details: "No available players".to_string(),
    })?;
    let Some(preferred) = preferred else {
        return Ok(first);
    };

    match players.iter().find(|player| player.player_id == preferred) {
        Some(player) => Ok(player),
        None => {
            if verbose_diagnostics() {
                info!(
                    "Preferred output unavailable; using {} instead.",
                    first.player_id
                );
            }
            Ok(first)
        }
    }
}

/// Fetches players and picks the preferred one.
///
/// # Errors
/// Returns error if no player is available or the fetch fails.
pub async fn resolve_player<P>(api: &P, preferred: Option<&str>) -> Result<Player, ControlError>
where
    P: PlayerControl + ?Sized,
{
    let players = api.fetch_players().await?;
    pick_player(&players, preferred).cloned()
}

/// Resolves the target player and the queue feeding it.
///
/// Falls back to the player id when the player has no active queue.
///
/// # Errors
/// Returns error if no player is available or a lookup fails.
pub async fn resolve_player_and_queue<P>(
    api: &P,
    preferred: Option<&str>,
) -> Result<(String, String), ControlError>
where
    P: PlayerControl + ?Sized,
{
    let player = resolve_player(api, preferred).await?;
    let queue_id = api
        .active_queue(&player.player_id)
        .await?
        .map(|queue| queue.queue_id)
        .unwrap_or_else(|| player.player_id.clone());

    if verbose_diagnostics() {
        info!(
            "Resolved playback target: player={} queue={}",
            player.player_id, queue_id
        );
    }
    Ok((player.player_id, queue_id))
}

/// Sends a queue command to the resolved player through `session`.
///
/// # Errors
/// Returns error if resolution or the command fails.
pub fn send_playback_command<C>(
    session: &ClientSession<C>,
    endpoint: &Endpoint,
    command: PlaybackCommand,
    preferred_player: Option<&str>,
) -> Result<(), ControlError>
where
    C: Connector,
    C::Connection: PlayerControl,
{
    let preferred = preferred_player.map(str::to_string);
    session.run(endpoint, move |client| {
        let preferred = preferred.clone();
        async move {
            let (_, queue_id) = resolve_player_and_queue(&client, preferred.as_deref()).await?;
            client.queue_command(&queue_id, command).await
        }
    })
}

/// Sets a player's volume through `session`.
///
/// # Errors
/// Returns error if the command fails.
pub fn set_player_volume<C>(
    session: &ClientSession<C>,
    endpoint: &Endpoint,
    player_id: &str,
    volume: u8,
) -> Result<(), ControlError>
where
    C: Connector,
    C::Connection: PlayerControl,
{
    let player_id = player_id.to_string();
    session.run(endpoint, move |client| {
        let player_id = player_id.clone();
        async move { client.set_player_volume(&player_id, volume).await }
    })
}

/// Lists usable players through `session`.
///
/// # Errors
/// Returns error if the fetch fails.
pub fn list_players<C>(
    session: &ClientSession<C>,
    endpoint: &Endpoint,
) -> Result<Vec<Player>, ControlError>
where
    C: Connector,
    C::Connection: PlayerControl,
{
    session.run(endpoint, |client| async move { client.fetch_players().await })
}
