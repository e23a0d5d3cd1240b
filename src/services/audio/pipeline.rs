use tracing::{debug, info, instrument, warn};

use super::{
    AudioError, AudioGraph, BuiltStages, EqBand, EqState, GraphBackend, PcmFormat, StageKind,
    StagePlan, StreamSession, SupportedFormat, assemble, pick_output_format,
};
use crate::tracing_config::verbose_diagnostics;

/// Volume applied until the receiver reports otherwise.
pub const DEFAULT_VOLUME: f64 = 0.65;

/// Device sink plus the formats it was probed to accept.
pub struct SinkTarget<S> {
    /// Sink element or handle for the device
    pub sink: S,
    /// Formats the device accepts; empty when unknown
    pub supported_formats: Vec<SupportedFormat>,
}

struct ActivePipeline<G> {
    graph: G,
    session: StreamSession,
    stages: BuiltStages,
    output_format: Option<SupportedFormat>,
}

/// Local playback graph for one Sendspin stream format.
///
/// The graph survives stream boundaries: a stream starting with the format
/// already being played only resumes playback, so back-to-back tracks never
/// hear a rebuild gap.
pub struct AudioPipeline<B: GraphBackend> {
    backend: B,
    active: Option<ActivePipeline<B::Graph>>,
    volume: f64,
    muted: bool,
    eq: EqState,
}

impl<B: GraphBackend> AudioPipeline<B> {
    /// Creates an inactive pipeline over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            active: None,
            volume: DEFAULT_VOLUME,
            muted: false,
            eq: EqState::default(),
        }
    }

    /// Whether a graph is currently built.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Stream format of the active graph.
    pub fn format(&self) -> Option<PcmFormat> {
        self.active.as_ref().map(|active| active.session.format())
    }

    /// Output format negotiated for the active graph.
    pub fn output_format(&self) -> Option<SupportedFormat> {
        self.active.as_ref().and_then(|active| active.output_format)
    }

    /// Stages of the active graph in link order.
    pub fn stages(&self) -> Option<&BuiltStages> {
        self.active.as_ref().map(|active| &active.stages)
    }

    /// Current volume, `0.0..=1.0`.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Current mute flag.
    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Builds or reuses a graph for `format`.
    ///
    /// A graph already built for an equal format is reused: it is flushed,
    /// set playing and receives the new volume and mute, while framing and
    /// timestamps start over for the new stream. Any other graph is torn
    /// down first. On failure the pipeline is left inactive.
    ///
    /// # Errors
    /// Returns error when the format is invalid, a required stage is missing
    /// or the graph cannot be started.
    #[instrument(skip(self, target))]
    pub fn create_pipeline(
        &mut self,
        format: PcmFormat,
        target: Option<SinkTarget<B::Sink>>,
        volume: f64,
        muted: bool,
    ) -> Result<(), AudioError> {
        if !format.is_valid() {
            return Err(AudioError::InvalidFormat(format));
        }

        self.volume = clamp_volume(volume);
        self.muted = muted;

        if let Some(active) = self.active.as_mut() {
            if active.session.format() == format {
                let session = StreamSession::new(format);
                if active.session.classifier().bytes_per_sample_override().is_some() {
                    active.graph.set_source_caps(&session.caps())?;
                }
                if let Err(err) = active.graph.flush() {
                    debug!("Flush before stream restart failed: {err}");
                }
                active.session = session;
                active.graph.play()?;
                active.graph.set_volume(self.volume, self.muted);
                debug!("Reusing Sendspin pipeline for {format}");
                return Ok(());
            }
        }
        self.destroy_pipeline();

        let (sink, output_format) = match target {
            Some(target) => {
                let output = pick_output_format(&format, &target.supported_formats);
                (Some(target.sink), output)
            }
            None => (None, None),
        };

        let session = StreamSession::new(format);
        let plan = StagePlan::new(&format, session.caps(), output_format);
        let mut graph = self.backend.new_graph(sink)?;

        let stages = match assemble(&plan, &mut graph) {
            Ok(stages) => stages,
            Err(err) => {
                graph.teardown();
                return Err(err);
            }
        };
        if let Err(err) = graph.play() {
            warn!("Failed to start Sendspin pipeline: {err}");
            graph.teardown();
            return Err(err);
        }

        if !graph.set_volume(self.volume, self.muted) {
            debug!("Sendspin pipeline has no volume stage");
        }
        if stages.iter().any(|(kind, _)| *kind == StageKind::Equalizer) {
            graph.configure_equalizer(self.eq.num_bands, &self.eq.band_updates());
        }

        let sink_name = graph.sink_name();
        let summary = match output_format {
            Some(out) => format!(
                "Sendspin pipeline ready: {format} -> {} Hz/{}-bit (resample={}) via {sink_name}",
                out.sample_rate,
                out.bit_depth,
                plan.resamples()
            ),
            None => format!("Sendspin pipeline ready: {format} via {sink_name}"),
        };
        if verbose_diagnostics() {
            info!("{summary}");
        } else {
            debug!("{summary}");
        }

        self.active = Some(ActivePipeline {
            graph,
            session,
            stages,
            output_format,
        });
        Ok(())
    }

    /// Frames, timestamps and pushes one chunk.
    ///
    /// Silently does nothing without an active graph. Chunks in another
    /// format or with an unusable size are dropped with a warning.
    pub fn push_audio(&mut self, timestamp_us: i64, data: &[u8], format: PcmFormat) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let expected = active.session.format();
        if expected != format {
            warn!(
                "{}",
                AudioError::FormatMismatch {
                    expected,
                    actual: format,
                }
            );
            return;
        }

        let Some(chunk) = active.session.prepare(timestamp_us, data.len()) else {
            return;
        };

        if let Some(caps) = chunk.caps_update {
            if let Err(err) = active.graph.set_source_caps(&caps) {
                warn!("Failed to update Sendspin caps: {err}");
            }
        }

        match active.graph.push(data, chunk.pts_ns, chunk.duration_ns) {
            Ok(()) => {}
            Err(err @ AudioError::SourceFull(_)) => debug!("{err}"),
            Err(err) => warn!("Sendspin audio push failed: {err}"),
        }
    }

    /// Drops queued audio and restarts the presentation clock.
    pub fn flush(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if let Err(err) = active.graph.flush() {
            warn!("Failed to flush Sendspin pipeline: {err}");
        }
        active.session.flush();
    }

    /// Tears down the graph and releases the device. Idempotent.
    pub fn destroy_pipeline(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.graph.teardown();
            debug!("Sendspin pipeline destroyed");
        }
    }

    /// Sets the volume, clamped to `0.0..=1.0`.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = clamp_volume(volume);
        self.apply_volume();
    }

    /// Mutes or unmutes playback.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    /// Replaces the equalizer band configuration.
    pub fn configure_eq_bands(&mut self, num_bands: i64, bands: &[EqBand]) {
        self.eq.configure(num_bands, bands);
        self.apply_eq();
    }

    /// Enables the equalizer or flattens every band.
    pub fn set_eq_enabled(&mut self, enabled: bool) {
        self.eq.set_enabled(enabled);
        self.apply_eq();
    }

    /// Snapshot of the equalizer configuration.
    pub fn eq_state(&self) -> EqState {
        self.eq.clone()
    }

    fn apply_volume(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.graph.set_volume(self.volume, self.muted);
        }
    }

    fn apply_eq(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active
                .graph
                .configure_equalizer(self.eq.num_bands, &self.eq.band_updates());
        }
    }
}

impl<B: GraphBackend> Drop for AudioPipeline<B> {
    fn drop(&mut self) {
        self.destroy_pipeline();
    }
}

fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}
