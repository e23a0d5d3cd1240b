use tracing::warn;

use crate::{
    cli::{
        CommandResult,
        formatting::{format_description, format_header, format_target},
    },
    service_manager::Services,
    services::{
        control::{Player, list_players},
        playback::OutputTargets,
    },
};

/// Lists output targets: remote players plus this computer's local outputs.
///
/// # Errors
/// Returns error if the server is not configured or the player list cannot
/// be fetched.
pub fn execute(services: &Services) -> CommandResult {
    let endpoint = services.endpoint()?;
    let players = list_players(&services.session, &endpoint)?;

    if let Err(err) = services.outputs.refresh() {
        warn!("Failed to list local outputs: {err}");
    }
    let targets = services.output_targets(&players);

    Ok(render(&targets, &players))
}

/// Renders the selection list with the selected row marked.
pub fn render(targets: &OutputTargets, players: &[Player]) -> String {
    if targets.rows().is_empty() {
        return "No available players".to_string();
    }

    let selected = targets.selected().map(|target| target.key());
    let mut output = format_header("Output targets:");
    output.push('\n');

    for target in targets.rows() {
        let player = players
            .iter()
            .find(|player| player.player_id == target.player_id);
        let is_selected = selected.as_ref() == Some(&target.key());
        output.push_str(&format_target(target, is_selected, player));
        output.push('\n');
    }

    if targets.selected().is_none() {
        output.push_str(&format_description("No output selected"));
    }

    output.trim_end().to_string()
}
