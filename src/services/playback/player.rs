use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, info, instrument, warn};

use crate::{
    services::{
        audio::{
            AudioPipeline, DeviceProbe, EqBand, GraphBackend, OutputRegistry, OutputRouting,
            PcmFormat, SinkTarget, SupportedFormat,
        },
        sendspin::{FormatSource, ReceiverEvent, ReceiverListener, formats_for_sendspin},
    },
    tracing_config::verbose_diagnostics,
};

/// Plays Sendspin streams on a local output.
///
/// Consumes receiver events on the receiver thread and owns the pipeline
/// behind a mutex. The sink is resolved from the preferred local output on
/// every stream start; `None` plays through the system default.
pub struct LocalPlayer<P, B>
where
    P: DeviceProbe,
    B: GraphBackend<Sink = P::Sink>,
{
    pipeline: Mutex<AudioPipeline<B>>,
    registry: Arc<OutputRegistry<P>>,
    routing: OutputRouting,
    preferred_output: RwLock<Option<String>>,
    remembered_formats: RwLock<Vec<SupportedFormat>>,
}

impl<P, B> LocalPlayer<P, B>
where
    P: DeviceProbe,
    B: GraphBackend<Sink = P::Sink>,
{
    /// Creates an idle player.
    pub fn new(backend: B, registry: Arc<OutputRegistry<P>>, routing: OutputRouting) -> Self {
        Self {
            pipeline: Mutex::new(AudioPipeline::new(backend)),
            registry,
            routing,
            preferred_output: RwLock::new(None),
            remembered_formats: RwLock::new(Vec::new()),
        }
    }

    /// Output registry used for sink lookups.
    pub fn registry(&self) -> &Arc<OutputRegistry<P>> {
        &self.registry
    }

    /// Local output id streams are routed to.
    pub fn preferred_output(&self) -> Option<String> {
        self.preferred_output
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Changes the local output.
    ///
    /// Returns `true` when the id changed, in which case the active graph is
    /// torn down and the next stream builds one for the new device.
    pub fn set_preferred_output(&self, output_id: Option<&str>) -> bool {
        let output_id = output_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        {
            let mut preferred = self
                .preferred_output
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *preferred == output_id {
                return false;
            }
            preferred.clone_from(&output_id);
        }
        self.remembered_formats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.pipeline().destroy_pipeline();
        info!(
            "Local output set to {}",
            output_id.as_deref().unwrap_or("system default")
        );
        true
    }

    /// Formats last negotiated for the preferred output, used while the
    /// device cannot be probed.
    ///
    /// Forgotten when the output changes.
    pub fn remember_formats(&self, formats: Vec<SupportedFormat>) {
        *self
            .remembered_formats
            .write()
            .unwrap_or_else(PoisonError::into_inner) = formats;
    }

    /// Formats the preferred output accepts, as probed.
    ///
    /// Empty when no output is preferred or the device is unknown.
    pub fn device_formats(&self) -> Vec<SupportedFormat> {
        match self.preferred_output() {
            Some(id) => self.registry.supported_formats(&id),
            None => Vec::new(),
        }
    }

    /// Formats to advertise for the preferred output.
    ///
    /// Uses the probed formats, then the remembered ones. Empty when neither
    /// is known, so the receiver falls back to its defaults.
    pub fn supported_formats(&self) -> Vec<SupportedFormat> {
        let mut formats = self.device_formats();
        if formats.is_empty() && self.preferred_output().is_some() {
            formats = self
                .remembered_formats
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
        }
        formats_for_sendspin(&formats)
    }

    /// Locks the pipeline for inspection or direct control.
    pub fn pipeline(&self) -> MutexGuard<'_, AudioPipeline<B>> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the local volume, `0.0..=1.0`.
    pub fn set_volume(&self, volume: f64) {
        self.pipeline().set_volume(volume);
    }

    /// Mutes or unmutes local playback.
    pub fn set_muted(&self, muted: bool) {
        self.pipeline().set_muted(muted);
    }

    /// Applies an equalizer configuration.
    pub fn configure_equalizer(&self, enabled: bool, bands: &[EqBand]) {
        let mut pipeline = self.pipeline();
        pipeline.configure_eq_bands(bands.len() as i64, bands);
        pipeline.set_eq_enabled(enabled);
    }

    #[instrument(skip(self))]
    fn start_stream(&self, format: PcmFormat) {
        let target = self.sink_target();
        let mut pipeline = self.pipeline();
        let (volume, muted) = (pipeline.volume(), pipeline.muted());
        if let Err(err) = pipeline.create_pipeline(format, target, volume, muted) {
            warn!("Failed to start Sendspin playback: {err}");
            return;
        }
        if verbose_diagnostics() {
            info!(
                "Sendspin playback for {format} via {:?}",
                pipeline.output_format()
            );
        }
    }

    fn sink_target(&self) -> Option<SinkTarget<P::Sink>> {
        let output_id = self.preferred_output()?;
        let routing = self.routing.resolve_from_env();
        self.registry.sink_target(&output_id, &routing)
    }

    fn play_chunk(&self, timestamp_us: i64, payload: &[u8], format: PcmFormat) {
        if !self.pipeline().is_active() {
            debug!("Audio before stream start, building pipeline for {format}");
            self.start_stream(format);
        }
        self.pipeline().push_audio(timestamp_us, payload, format);
    }
}

impl<P, B> LocalPlayer<P, B>
where
    P: DeviceProbe + 'static,
    B: GraphBackend<Sink = P::Sink> + 'static,
{
    /// Format source for the receiver, following the preferred output.
    pub fn format_source(self: &Arc<Self>) -> FormatSource {
        let player = Arc::clone(self);
        Arc::new(move || player.supported_formats())
    }
}

impl<P, B> ReceiverListener for LocalPlayer<P, B>
where
    P: DeviceProbe,
    B: GraphBackend<Sink = P::Sink>,
{
    fn on_event(&self, event: ReceiverEvent) {
        match event {
            ReceiverEvent::Connected => debug!("Sendspin receiver connected"),
            ReceiverEvent::Disconnected => self.pipeline().flush(),
            ReceiverEvent::StreamStart(format) => self.start_stream(format),
            ReceiverEvent::StreamEnd => self.pipeline().destroy_pipeline(),
            ReceiverEvent::StreamClear => self.pipeline().flush(),
            ReceiverEvent::AudioChunk {
                timestamp_us,
                payload,
                format,
            } => self.play_chunk(timestamp_us, &payload, format),
            ReceiverEvent::VolumeChanged(percent) => {
                self.set_volume(f64::from(percent) / 100.0)
            }
            ReceiverEvent::MuteChanged(muted) => self.set_muted(muted),
        }
    }
}
