use tracing::{debug, info, warn};

use super::{CliError, CommandResult, Commands, commands};
use crate::{
    config::{Settings, SettingsStore, normalize_server_url},
    service_manager::Services,
};

/// Runs parsed commands against the saved settings.
///
/// Command-line overrides apply to the current run only. Two values are
/// written back: a freshly generated client id, so this computer keeps the
/// same Sendspin player across runs, and the formats last probed for the
/// preferred output.
pub struct CliService {
    store: SettingsStore,
}

impl CliService {
    /// Creates a CLI service reading settings from `store`.
    pub fn new(store: SettingsStore) -> Self {
        Self { store }
    }

    /// Executes a command and returns its output.
    ///
    /// # Errors
    /// Returns error if an override is invalid, the services cannot be
    /// created, or the command itself fails.
    pub fn execute(&self, command: Commands) -> CommandResult {
        match command {
            Commands::Outputs => {
                let services = self.services(None, None)?;
                let result = commands::outputs::execute(&services.outputs, &services.settings);
                self.remember_formats(&services);
                result
            }
            Commands::Players { server } => {
                let services = self.services(server.as_deref(), None)?;
                let result = commands::players::execute(&services);
                services.shutdown();
                result
            }
            Commands::Control {
                action,
                player,
                server,
            } => {
                let services = self.services(server.as_deref(), None)?;
                let result = commands::control::execute(&services, &action, player.as_deref());
                services.shutdown();
                result
            }
            Commands::Play { server, output } => {
                let services = self.services(server.as_deref(), output.as_deref())?;
                self.remember_formats(&services);
                commands::play::execute(&services)
            }
        }
    }

    fn services(&self, server: Option<&str>, output: Option<&str>) -> Result<Services, CliError> {
        let settings = self.settings(server, output)?;
        Ok(Services::new(settings)?)
    }

    /// Saves the formats the preferred output was probed with, so the next
    /// run can advertise them before the device shows up.
    fn remember_formats(&self, services: &Services) {
        let formats = services.playback.player().device_formats();
        let mut stored = self.store.load();
        if !stored.record_pcm_support(&formats) {
            return;
        }
        debug!(count = formats.len(), "Saving negotiated PCM formats");
        if let Err(err) = self.store.save(&stored) {
            warn!("Failed to save PCM formats: {err}");
        }
    }

    fn settings(&self, server: Option<&str>, output: Option<&str>) -> Result<Settings, CliError> {
        let mut settings = self.store.load();

        if let Some(server) = server {
            let url = normalize_server_url(server);
            if url.is_empty() {
                return Err(CliError::InvalidArgument {
                    arg: "server".to_string(),
                    reason: format!("'{server}' is not a valid server URL"),
                });
            }
            settings.server_url = url;
        }

        if let Some(output) = output.map(str::trim).filter(|id| !id.is_empty()) {
            settings.output_local_output_id = Some(output.to_string());
        }

        if settings.ensure_client_id() {
            info!("Generated Sendspin client id");
            let mut stored = self.store.load();
            stored.sendspin_client_id.clone_from(&settings.sendspin_client_id);
            if let Err(err) = self.store.save(&stored) {
                warn!("Failed to save client id: {err}");
            }
        }

        Ok(settings)
    }
}
