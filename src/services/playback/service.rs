use std::sync::Arc;

use tracing::{info, instrument};

use super::LocalPlayer;
use crate::services::{
    audio::{DeviceProbe, GraphBackend},
    sendspin::{ClientIdentity, ReceiverListener, ReceiverState, SendspinError, SendspinReceiver},
};

/// This computer as a Music Assistant player.
///
/// Wires a [`SendspinReceiver`] to a [`LocalPlayer`] and keeps user volume,
/// mute and output changes consistent between the two.
pub struct PlaybackService<P, B>
where
    P: DeviceProbe + 'static,
    B: GraphBackend<Sink = P::Sink> + 'static,
{
    receiver: SendspinReceiver,
    player: Arc<LocalPlayer<P, B>>,
}

impl<P, B> PlaybackService<P, B>
where
    P: DeviceProbe + 'static,
    B: GraphBackend<Sink = P::Sink> + 'static,
{
    /// Creates a stopped service playing through `player`.
    pub fn new(identity: ClientIdentity, player: Arc<LocalPlayer<P, B>>) -> Self {
        let listener: Arc<dyn ReceiverListener> = player.clone();
        let receiver = SendspinReceiver::new(identity, listener);
        Self::with_receiver(receiver, player)
    }

    /// Uses a preconfigured receiver whose listener is `player`.
    pub fn with_receiver(receiver: SendspinReceiver, player: Arc<LocalPlayer<P, B>>) -> Self {
        receiver.set_format_source(player.format_source());
        Self { receiver, player }
    }

    /// The Sendspin receiver.
    pub fn receiver(&self) -> &SendspinReceiver {
        &self.receiver
    }

    /// The local player.
    pub fn player(&self) -> &Arc<LocalPlayer<P, B>> {
        &self.player
    }

    /// Receiver soft state.
    pub fn state(&self) -> &ReceiverState {
        self.receiver.state()
    }

    /// Starts receiving from `server_url`.
    ///
    /// # Errors
    /// Returns error when the URL is invalid or the receiver cannot start.
    pub fn start(&self, server_url: &str) -> Result<(), SendspinError> {
        self.receiver.start(server_url)
    }

    /// Stops receiving and releases the output device.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        self.receiver.stop();
        self.player.pipeline().destroy_pipeline();
    }

    /// Sets the volume in percent, reporting it to the server.
    pub fn set_volume_percent(&self, percent: i64) {
        self.receiver.set_volume_percent(percent);
        self.player.set_volume(self.receiver.state().volume.get());
    }

    /// Mutes or unmutes, reporting it to the server.
    pub fn set_muted(&self, muted: bool) {
        self.receiver.set_muted(muted);
        self.player.set_muted(muted);
    }

    /// Routes playback to another local output.
    ///
    /// On change the pipeline is torn down and a running receiver restarts
    /// so the server sees the new device's formats. Returns whether the
    /// output changed.
    ///
    /// # Errors
    /// Returns error when the receiver cannot be restarted.
    pub fn select_local_output(&self, output_id: Option<&str>) -> Result<bool, SendspinError> {
        if !self.player.set_preferred_output(output_id) {
            return Ok(false);
        }
        if self.receiver.is_running() {
            info!("Restarting Sendspin receiver for the new output");
            self.receiver.restart()?;
        }
        Ok(true)
    }
}

impl<P, B> Drop for PlaybackService<P, B>
where
    P: DeviceProbe + 'static,
    B: GraphBackend<Sink = P::Sink> + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}
