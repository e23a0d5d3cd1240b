use crate::{
    cli::{CliError, CommandResult, ControlAction},
    service_manager::Services,
    services::control::{PlaybackCommand, resolve_player, send_playback_command, set_player_volume},
};

/// Parses a seek position given as seconds, `mm:ss` or `h:mm:ss`.
///
/// # Errors
/// Returns `CliError::InvalidArgument` for anything else.
///
/// # Examples
///
/// ```
/// use madesk::cli::parse_position;
///
/// assert_eq!(parse_position("95").unwrap(), 95);
/// assert_eq!(parse_position("1:35").unwrap(), 95);
/// assert_eq!(parse_position("1:00:05").unwrap(), 3605);
/// assert!(parse_position("1:75").is_err());
/// ```
pub fn parse_position(value: &str) -> Result<u32, CliError> {
    let invalid = || CliError::InvalidArgument {
        arg: "position".to_string(),
        reason: format!("'{value}' is not seconds, mm:ss or h:mm:ss"),
    };

    let parts = value
        .trim()
        .split(':')
        .map(|part| part.parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    match parts.as_slice() {
        [seconds] => Ok(*seconds),
        [minutes, seconds] if *seconds < 60 => Ok(minutes * 60 + seconds),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => {
            Ok(hours * 3600 + minutes * 60 + seconds)
        }
        _ => Err(invalid()),
    }
}

/// Runs a transport action against the saved or given player.
///
/// # Errors
/// Returns error if the server is not configured, no player is available,
/// or the server rejects the command.
pub fn execute(services: &Services, action: &ControlAction, player: Option<&str>) -> CommandResult {
    let endpoint = services.endpoint()?;
    let preferred = player.or(services.settings.output_player_id.as_deref());

    let command = match action {
        ControlAction::Pause => PlaybackCommand::Pause,
        ControlAction::Resume => PlaybackCommand::Resume,
        ControlAction::Next => PlaybackCommand::Next,
        ControlAction::Previous => PlaybackCommand::Previous,
        ControlAction::Seek { position } => PlaybackCommand::Seek(parse_position(position)?),
        ControlAction::Volume { percent } => {
            let preferred = preferred.map(str::to_string);
            let target = services.session.run(&endpoint, move |client| {
                let preferred = preferred.clone();
                async move { resolve_player(&client, preferred.as_deref()).await }
            })?;
            set_player_volume(&services.session, &endpoint, &target.player_id, *percent)?;
            return Ok(format!("Volume of {} set to {percent}%", target.label()));
        }
    };

    send_playback_command(&services.session, &endpoint, command, preferred)?;
    Ok(format!("Sent {}", describe(action)))
}

fn describe(action: &ControlAction) -> String {
    match action {
        ControlAction::Pause => "pause".to_string(),
        ControlAction::Resume => "resume".to_string(),
        ControlAction::Next => "next".to_string(),
        ControlAction::Previous => "previous".to_string(),
        ControlAction::Seek { position } => format!("seek to {position}"),
        ControlAction::Volume { percent } => format!("volume {percent}%"),
    }
}
