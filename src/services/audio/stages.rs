//! Ordered stage plan for the playback graph.
//!
//! A plan lists every stage the graph may contain, in link order, each
//! tagged with how essential it is. Assembly walks the list once, adds
//! whatever can be created and links consecutive stages, so optional stages
//! never need special cases at link or teardown time.

use std::fmt;

use tracing::warn;

use super::{AudioError, AudioGraph, PcmFormat, StageId, SupportedFormat, gst_sample_format, raw_caps};

/// Queue depth, bounded by time rather than bytes.
pub const QUEUE_MAX_TIME_NS: u64 = 200_000_000;

/// Role of a stage in the playback graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Push source fed by the receiver
    Source,
    /// Time-bounded buffering
    Queue,
    /// Sample format conversion
    Convert,
    /// Volume and mute control
    Volume,
    /// Multi-band parametric equalizer
    Equalizer,
    /// Conversion back to the negotiated output depth after the equalizer
    PostConvert,
    /// Sample rate conversion
    Resample,
    /// Output format constraint
    CapsFilter,
    /// Device or default audio sink
    Sink,
}

impl StageKind {
    /// Element factory used to create the stage.
    pub fn factory(self) -> &'static str {
        match self {
            StageKind::Source => "appsrc",
            StageKind::Queue => "queue",
            StageKind::Convert | StageKind::PostConvert => "audioconvert",
            StageKind::Volume => "volume",
            StageKind::Equalizer => "equalizer-nbands",
            StageKind::Resample => "audioresample",
            StageKind::CapsFilter => "capsfilter",
            StageKind::Sink => "autoaudiosink",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Source => "source",
            StageKind::Queue => "queue",
            StageKind::Convert => "converter",
            StageKind::Volume => "volume control",
            StageKind::Equalizer => "equalizer",
            StageKind::PostConvert => "post-EQ converter",
            StageKind::Resample => "resampler",
            StageKind::CapsFilter => "caps filter",
            StageKind::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// How a missing stage affects construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Construction aborts without it.
    Required,
    /// Skipped with a warning.
    Optional,
    /// Only built when the given stage was built; otherwise optional.
    After(StageKind),
}

/// One entry in a stage plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Stage role
    pub kind: StageKind,
    /// Whether the stage is essential
    pub presence: Presence,
    /// Caps for the source or caps filter
    pub caps: Option<String>,
}

impl StageSpec {
    fn new(kind: StageKind, presence: Presence) -> Self {
        Self {
            kind,
            presence,
            caps: None,
        }
    }

    fn with_caps(mut self, caps: String) -> Self {
        self.caps = Some(caps);
        self
    }
}

/// Ordered list of stages for one stream format and output target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<StageSpec>,
    output_format: Option<SupportedFormat>,
    resample: bool,
}

impl StagePlan {
    /// Plans a graph for `format`.
    ///
    /// When an output format was negotiated, the plan converts back after
    /// the equalizer, resamples if the rates differ and pins the sink caps.
    pub fn new(format: &PcmFormat, source_caps: String, output_format: Option<SupportedFormat>) -> Self {
        let target_rate = output_format.map_or(format.sample_rate, |out| out.sample_rate);
        let resample = target_rate != format.sample_rate;

        let mut stages = vec![
            StageSpec::new(StageKind::Source, Presence::Required).with_caps(source_caps),
            StageSpec::new(StageKind::Queue, Presence::Optional),
            StageSpec::new(StageKind::Convert, Presence::Required),
            StageSpec::new(StageKind::Volume, Presence::Optional),
            StageSpec::new(StageKind::Equalizer, Presence::Optional),
        ];
        if output_format.is_some() {
            stages.push(StageSpec::new(
                StageKind::PostConvert,
                Presence::After(StageKind::Equalizer),
            ));
        }
        if resample {
            stages.push(StageSpec::new(StageKind::Resample, Presence::Required));
        }
        if let Some(out) = output_format {
            let caps = raw_caps(
                gst_sample_format(out.bit_depth, None),
                format.channels,
                out.sample_rate,
            );
            stages.push(StageSpec::new(StageKind::CapsFilter, Presence::Required).with_caps(caps));
        }
        stages.push(StageSpec::new(StageKind::Sink, Presence::Required));

        Self {
            stages,
            output_format,
            resample,
        }
    }

    /// Stages in link order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Negotiated output format, if any.
    pub fn output_format(&self) -> Option<SupportedFormat> {
        self.output_format
    }

    /// Whether a resampler is part of the plan.
    pub fn resamples(&self) -> bool {
        self.resample
    }
}

/// Stages that made it into a graph, in link order.
pub type BuiltStages = Vec<(StageKind, StageId)>;

/// Adds every buildable stage of `plan` to `graph` and links them in order.
///
/// # Errors
/// Returns `AudioError::MissingStage` when a required stage cannot be
/// created, or the link error when two stages refuse to connect.
pub fn assemble<G: AudioGraph>(plan: &StagePlan, graph: &mut G) -> Result<BuiltStages, AudioError> {
    let mut built: BuiltStages = Vec::with_capacity(plan.stages().len());

    for spec in plan.stages() {
        if let Presence::After(dependency) = spec.presence {
            if !built.iter().any(|(kind, _)| *kind == dependency) {
                continue;
            }
        }

        match graph.add_stage(spec) {
            Ok(id) => built.push((spec.kind, id)),
            Err(err) if spec.presence == Presence::Required => {
                warn!("Failed to initialize GStreamer pipeline for Sendspin audio: {err}");
                return Err(err);
            }
            Err(_) => warn!("Failed to initialize {} for Sendspin audio", spec.kind),
        }
    }

    for pair in built.windows(2) {
        let (upstream_kind, upstream) = pair[0];
        let (downstream_kind, downstream) = pair[1];
        graph.link(upstream, downstream).map_err(|err| {
            warn!("Failed to link {upstream_kind} to {downstream_kind}: {err}");
            err
        })?;
    }

    Ok(built)
}
