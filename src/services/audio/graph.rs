use super::{AudioError, BandUpdate, StageSpec};

/// Handle to a stage inside one graph instance.
pub type StageId = usize;

/// A playback graph under construction or running.
///
/// Implementations own the media framework objects; the pipeline only talks
/// to them through stage ids.
pub trait AudioGraph: Send {
    /// Creates the element described by `stage` and adds it to the graph.
    ///
    /// # Errors
    /// Returns `AudioError::MissingStage` when the element cannot be created.
    fn add_stage(&mut self, stage: &StageSpec) -> Result<StageId, AudioError>;

    /// Links two previously added stages.
    ///
    /// # Errors
    /// Returns `AudioError::LinkFailed` when the stages cannot negotiate.
    fn link(&mut self, upstream: StageId, downstream: StageId) -> Result<(), AudioError>;

    /// Moves the graph into the playing state.
    ///
    /// # Errors
    /// Returns `AudioError::StateChange` when the graph refuses.
    fn play(&mut self) -> Result<(), AudioError>;

    /// Re-announces the caps of the source stage.
    ///
    /// # Errors
    /// Returns error when the caps string cannot be parsed.
    fn set_source_caps(&mut self, caps: &str) -> Result<(), AudioError>;

    /// Pushes one timestamped buffer into the source stage.
    ///
    /// Never blocks: callers hold the pipeline lock while pushing.
    ///
    /// # Errors
    /// Returns `AudioError::SourceFull` when the source queue has no room
    /// and `AudioError::PushFailed` when the source rejects the buffer.
    fn push(&mut self, data: &[u8], pts_ns: u64, duration_ns: u64) -> Result<(), AudioError>;

    /// Sends a flush-start/flush-stop pair through the graph.
    ///
    /// # Errors
    /// Returns error when either event is rejected.
    fn flush(&mut self) -> Result<(), AudioError>;

    /// Applies volume and mute; `false` when the graph has no volume stage.
    fn set_volume(&mut self, volume: f64, muted: bool) -> bool;

    /// Applies equalizer bands; `false` when the graph has no equalizer stage.
    fn configure_equalizer(&mut self, num_bands: usize, updates: &[BandUpdate]) -> bool;

    /// Name of the sink element, for diagnostics.
    fn sink_name(&self) -> String;

    /// Stops the graph and releases every stage. Safe to call repeatedly.
    fn teardown(&mut self);
}

/// Factory for playback graphs.
pub trait GraphBackend: Send {
    /// Device-specific sink handed in by the output registry.
    type Sink: Send;
    /// Graph type produced by this backend.
    type Graph: AudioGraph;

    /// Creates an empty graph, optionally bound to a device sink.
    ///
    /// # Errors
    /// Returns error when the media framework cannot create a pipeline.
    fn new_graph(&mut self, sink: Option<Self::Sink>) -> Result<Self::Graph, AudioError>;
}
