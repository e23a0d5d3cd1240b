use std::pin::pin;

use futures::StreamExt;
use tracing::{info, instrument, warn};

use crate::{
    cli::{CliError, CommandResult},
    service_manager::Services,
    services::sendspin::ConnectionState,
};

/// Runs the receiver until Ctrl-C.
///
/// # Errors
/// Returns error if no server is configured or the receiver cannot start.
#[instrument(skip(services))]
pub fn execute(services: &Services) -> CommandResult {
    let server_url = services.settings.server_url.trim();
    if server_url.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "server".to_string(),
            reason: "no Music Assistant server configured".to_string(),
        });
    }

    services
        .playback
        .start(server_url)
        .map_err(|err| CliError::ServiceError {
            service: "Sendspin".to_string(),
            details: err.to_string(),
        })?;
    info!(
        player = %services.playback.receiver().identity().name,
        "Receiver started, press Ctrl-C to stop"
    );

    let outcome = wait_for_interrupt(services);
    services.shutdown();
    outcome?;

    Ok("Receiver stopped".to_string())
}

fn wait_for_interrupt(services: &Services) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let state = services.playback.state().clone();
    runtime.block_on(async move {
        let mut interrupt = pin!(tokio::signal::ctrl_c());
        let mut connection = pin!(state.connection.watch());

        loop {
            tokio::select! {
                result = &mut interrupt => {
                    if let Err(err) = result {
                        warn!("Failed to listen for Ctrl-C: {err}");
                    }
                    info!("Interrupted, stopping receiver");
                    return Ok(());
                }
                Some(change) = connection.next() => match change {
                    ConnectionState::Connected => info!("Connected to Music Assistant"),
                    ConnectionState::Connecting => info!("Connecting to Music Assistant"),
                    ConnectionState::Disconnected => info!("Disconnected, retrying"),
                },
            }
        }
    })
}
