use gst::prelude::*;
use tracing::{debug, warn};

use super::{AudioError, AudioGraph, BandUpdate, GraphBackend, QUEUE_MAX_TIME_NS, StageId, StageKind, StageSpec};

const SOURCE_NAME: &str = "sendspin-src";
/// Bytes the source queues before further chunks are dropped.
const SOURCE_MAX_BYTES: u64 = 2 * 1024 * 1024;

/// GStreamer implementation of [`GraphBackend`].
#[derive(Debug)]
pub struct GstBackend;

impl GstBackend {
    /// Initializes GStreamer.
    ///
    /// # Errors
    /// Returns `AudioError::InitializationFailed` when GStreamer cannot start.
    pub fn new() -> Result<Self, AudioError> {
        gst::init().map_err(|err| AudioError::InitializationFailed(err.to_string()))?;
        Ok(Self)
    }
}

impl GraphBackend for GstBackend {
    type Sink = gst::Element;
    type Graph = GstGraph;

    fn new_graph(&mut self, sink: Option<gst::Element>) -> Result<GstGraph, AudioError> {
        let pipeline = gst::Pipeline::with_name("sendspin-pipeline");

        if let Some(bus) = pipeline.bus() {
            bus.set_sync_handler(|_, message| {
                let source = message
                    .src()
                    .map(|src| src.path_string().to_string())
                    .unwrap_or_default();
                match message.view() {
                    gst::MessageView::Error(err) => {
                        warn!(
                            "Sendspin GStreamer error from {source}: {} ({:?})",
                            err.error(),
                            err.debug()
                        );
                    }
                    gst::MessageView::Warning(warning) => {
                        warn!(
                            "Sendspin GStreamer warning from {source}: {} ({:?})",
                            warning.error(),
                            warning.debug()
                        );
                    }
                    _ => {}
                }
                gst::BusSyncReply::Drop
            });
        }

        Ok(GstGraph {
            pipeline,
            pending_sink: sink,
            stages: Vec::new(),
            source: None,
            volume: None,
            equalizer: None,
            torn_down: false,
        })
    }
}

/// A GStreamer pipeline assembled from a stage plan.
#[derive(Debug)]
pub struct GstGraph {
    pipeline: gst::Pipeline,
    pending_sink: Option<gst::Element>,
    stages: Vec<(StageKind, gst::Element)>,
    source: Option<gst_app::AppSrc>,
    volume: Option<gst::Element>,
    equalizer: Option<gst::Element>,
    torn_down: bool,
}

impl GstGraph {
    fn make_element(&mut self, stage: &StageSpec) -> Result<gst::Element, AudioError> {
        let missing = |_| AudioError::MissingStage(stage.kind);

        let element = match stage.kind {
            StageKind::Source => {
                let caps = parse_caps(stage.caps.as_deref().unwrap_or_default())?;
                let appsrc = gst_app::AppSrc::builder()
                    .name(SOURCE_NAME)
                    .caps(&caps)
                    .format(gst::Format::Time)
                    .is_live(true)
                    .do_timestamp(false)
                    .block(false)
                    .max_bytes(SOURCE_MAX_BYTES)
                    .build();
                self.source = Some(appsrc.clone());
                appsrc.upcast()
            }
            StageKind::Queue => gst::ElementFactory::make(stage.kind.factory())
                .property("max-size-time", QUEUE_MAX_TIME_NS)
                .property("max-size-bytes", 0u32)
                .property("max-size-buffers", 0u32)
                .build()
                .map_err(missing)?,
            StageKind::CapsFilter => {
                let caps = parse_caps(stage.caps.as_deref().unwrap_or_default())?;
                gst::ElementFactory::make(stage.kind.factory())
                    .property("caps", &caps)
                    .build()
                    .map_err(missing)?
            }
            StageKind::Sink => match self.pending_sink.take() {
                Some(sink) => sink,
                None => gst::ElementFactory::make(stage.kind.factory())
                    .build()
                    .map_err(missing)?,
            },
            _ => gst::ElementFactory::make(stage.kind.factory())
                .build()
                .map_err(missing)?,
        };

        match stage.kind {
            StageKind::Volume => self.volume = Some(element.clone()),
            StageKind::Equalizer => self.equalizer = Some(element.clone()),
            _ => {}
        }
        Ok(element)
    }

    fn element(&self, id: StageId) -> Result<&(StageKind, gst::Element), AudioError> {
        self.stages
            .get(id)
            .ok_or_else(|| AudioError::StateChange(format!("unknown stage {id}")))
    }
}

impl AudioGraph for GstGraph {
    fn add_stage(&mut self, stage: &StageSpec) -> Result<StageId, AudioError> {
        let element = self.make_element(stage)?;
        self.pipeline
            .add(&element)
            .map_err(|_| AudioError::MissingStage(stage.kind))?;
        self.stages.push((stage.kind, element));
        Ok(self.stages.len() - 1)
    }

    fn link(&mut self, upstream: StageId, downstream: StageId) -> Result<(), AudioError> {
        let (up_kind, up) = self.element(upstream)?;
        let (down_kind, down) = self.element(downstream)?;
        up.link(down).map_err(|_| AudioError::LinkFailed {
            upstream: *up_kind,
            downstream: *down_kind,
        })
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|err| AudioError::StateChange(err.to_string()))
    }

    fn set_source_caps(&mut self, caps: &str) -> Result<(), AudioError> {
        let caps = parse_caps(caps)?;
        if let Some(source) = &self.source {
            source.set_caps(Some(&caps));
        }
        Ok(())
    }

    fn push(&mut self, data: &[u8], pts_ns: u64, duration_ns: u64) -> Result<(), AudioError> {
        let Some(source) = &self.source else {
            return Err(AudioError::PushFailed("no source stage".to_string()));
        };
        if source.current_level_bytes() >= source.max_bytes() {
            return Err(AudioError::SourceFull(data.len()));
        }

        let mut buffer = gst::Buffer::from_slice(data.to_vec());
        if let Some(buffer) = buffer.get_mut() {
            let pts = gst::ClockTime::from_nseconds(pts_ns);
            buffer.set_pts(pts);
            buffer.set_dts(pts);
            buffer.set_duration(gst::ClockTime::from_nseconds(duration_ns));
        }

        source
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|flow| AudioError::PushFailed(format!("{flow:?}")))
    }

    fn flush(&mut self) -> Result<(), AudioError> {
        if !self.pipeline.send_event(gst::event::FlushStart::new()) {
            return Err(AudioError::StateChange("flush-start rejected".to_string()));
        }
        if !self.pipeline.send_event(gst::event::FlushStop::new(true)) {
            return Err(AudioError::StateChange("flush-stop rejected".to_string()));
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: f64, muted: bool) -> bool {
        let Some(element) = &self.volume else {
            return false;
        };
        element.set_property("volume", volume);
        element.set_property("mute", muted);
        true
    }

    fn configure_equalizer(&mut self, num_bands: usize, updates: &[BandUpdate]) -> bool {
        let Some(element) = &self.equalizer else {
            return false;
        };
        let Ok(num_bands) = u32::try_from(num_bands) else {
            return false;
        };
        element.set_property("num-bands", num_bands);

        let Some(proxy) = element.dynamic_cast_ref::<gst::ChildProxy>() else {
            warn!("Equalizer does not expose its bands");
            return false;
        };

        for update in updates {
            let index = match update {
                BandUpdate::Flatten { index } | BandUpdate::Set { index, .. } => *index,
            };
            let Some(band) = u32::try_from(index).ok().and_then(|i| proxy.child_by_index(i))
            else {
                debug!("Equalizer band {index} not available");
                continue;
            };
            match update {
                BandUpdate::Flatten { .. } => band.set_property("gain", 0.0f64),
                BandUpdate::Set { band: config, .. } => {
                    band.set_property("freq", config.freq);
                    band.set_property("bandwidth", config.bandwidth);
                    band.set_property("gain", config.gain);
                }
            }
        }
        true
    }

    fn sink_name(&self) -> String {
        self.stages
            .iter()
            .find(|(kind, _)| *kind == StageKind::Sink)
            .map(|(_, element)| {
                element
                    .factory()
                    .map(|factory| factory.name().to_string())
                    .unwrap_or_else(|| element.name().to_string())
            })
            .unwrap_or_else(|| "none".to_string())
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop Sendspin pipeline: {err}");
        }
        self.source = None;
        self.volume = None;
        self.equalizer = None;
        self.stages.clear();
    }
}

impl Drop for GstGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn parse_caps(caps: &str) -> Result<gst::Caps, AudioError> {
    caps.parse::<gst::Caps>()
        .map_err(|_| AudioError::PushFailed(format!("invalid caps: {caps}")))
}
