use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{
    config::Settings,
    core::Result,
    services::{
        audio::{GstBackend, GstDeviceProbe, OutputRegistry},
        control::{ClientSession, ControlError, Endpoint, Player, WebSocketConnector},
        playback::{LocalPlayer, OutputTargets, PlaybackService},
        sendspin::ClientIdentity,
    },
};

/// Local player backed by GStreamer.
pub type GstPlayer = LocalPlayer<GstDeviceProbe, GstBackend>;

/// Container for all application services
///
/// Services are created once from the loaded settings and shared via `Arc`
/// references.
pub struct Services {
    /// Settings the services were built from
    pub settings: Settings,
    /// Serialized Music Assistant connection
    pub session: Arc<ClientSession<WebSocketConnector>>,
    /// Local output devices
    pub outputs: Arc<OutputRegistry<GstDeviceProbe>>,
    /// This computer as a Sendspin player
    pub playback: Arc<PlaybackService<GstDeviceProbe, GstBackend>>,
}

impl Services {
    /// Create all application services
    ///
    /// Initializes GStreamer, restores the preferred local output with its
    /// last negotiated formats and the equalizer switch, and prepares (but
    /// does not start) the receiver.
    ///
    /// # Arguments
    /// * `settings` - Loaded settings; must already carry a client id
    ///
    /// # Errors
    /// Returns error if GStreamer cannot be initialized
    #[instrument(skip(settings))]
    pub fn new(settings: Settings) -> Result<Self> {
        let backend = GstBackend::new()?;
        let outputs = Arc::new(OutputRegistry::new(GstDeviceProbe::new()));

        let player = Arc::new(GstPlayer::new(
            backend,
            Arc::clone(&outputs),
            settings.output_routing(),
        ));
        player.set_preferred_output(settings.output_local_output_id.as_deref());
        player.remember_formats(settings.sendspin_pcm_support.clone());
        player.pipeline().set_eq_enabled(settings.eq_enabled);

        let identity = ClientIdentity::new(settings.sendspin_client_id.as_deref().unwrap_or_default());
        debug!(client_id = %identity.client_id, "Sendspin identity");
        let playback = Arc::new(PlaybackService::new(identity, player));

        Ok(Self {
            settings,
            session: Arc::new(ClientSession::new(WebSocketConnector)),
            outputs,
            playback,
        })
    }

    /// Control endpoint from the settings.
    ///
    /// # Errors
    /// Returns [`ControlError::NotConfigured`] when no server URL is set
    pub fn endpoint(&self) -> std::result::Result<Endpoint, ControlError> {
        self.settings.endpoint().ok_or(ControlError::NotConfigured)
    }

    /// Output selection list for `players` and the cached local outputs.
    pub fn output_targets(&self, players: &[Player]) -> OutputTargets {
        let identity = self.playback.receiver().identity().clone();
        let mut targets = OutputTargets::new(identity).with_preference(
            self.settings.output_player_id.clone(),
            self.settings.output_local_output_id.clone(),
        );
        targets.populate(players, &self.outputs.outputs());
        targets
    }

    /// Stops the receiver and closes the control connection.
    pub fn shutdown(&self) {
        self.playback.stop();
        self.session.stop();
    }
}
