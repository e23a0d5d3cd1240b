//! Unit tests for audio module
//!
//! Tests pipeline assembly, reuse and teardown against a recording graph
//! backend, plus output negotiation, device heuristics and sink routing.
//! No media framework or audio hardware is touched.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::services::audio::*;

#[derive(Debug, Default)]
struct Recorder {
    next_id: StageId,
    graphs: usize,
    sinks: Vec<Option<String>>,
    stages: Vec<(StageId, StageKind, Option<String>)>,
    links: Vec<(StageId, StageId)>,
    plays: usize,
    pushes: Vec<(usize, u64, u64)>,
    caps_updates: Vec<String>,
    flushes: usize,
    volumes: Vec<(f64, bool)>,
    eq_calls: Vec<(usize, Vec<BandUpdate>)>,
    teardowns: usize,
    source_full: bool,
}

type Log = Arc<Mutex<Recorder>>;

struct FakeBackend {
    log: Log,
    unavailable: Vec<StageKind>,
}

impl FakeBackend {
    fn new() -> (Self, Log) {
        Self::without(&[])
    }

    fn without(unavailable: &[StageKind]) -> (Self, Log) {
        let log = Log::default();
        let backend = Self {
            log: log.clone(),
            unavailable: unavailable.to_vec(),
        };
        (backend, log)
    }
}

impl GraphBackend for FakeBackend {
    type Sink = String;
    type Graph = FakeGraph;

    fn new_graph(&mut self, sink: Option<String>) -> Result<FakeGraph, AudioError> {
        let mut log = self.log.lock().unwrap();
        log.graphs += 1;
        log.sinks.push(sink);
        Ok(FakeGraph {
            log: self.log.clone(),
            unavailable: self.unavailable.clone(),
            kinds: Vec::new(),
        })
    }
}

struct FakeGraph {
    log: Log,
    unavailable: Vec<StageKind>,
    kinds: Vec<(StageId, StageKind)>,
}

impl FakeGraph {
    fn has(&self, kind: StageKind) -> bool {
        self.kinds.iter().any(|(_, k)| *k == kind)
    }
}

impl AudioGraph for FakeGraph {
    fn add_stage(&mut self, stage: &StageSpec) -> Result<StageId, AudioError> {
        if self.unavailable.contains(&stage.kind) {
            return Err(AudioError::MissingStage(stage.kind));
        }
        let mut log = self.log.lock().unwrap();
        let id = log.next_id;
        log.next_id += 1;
        log.stages.push((id, stage.kind, stage.caps.clone()));
        self.kinds.push((id, stage.kind));
        Ok(id)
    }

    fn link(&mut self, upstream: StageId, downstream: StageId) -> Result<(), AudioError> {
        self.log.lock().unwrap().links.push((upstream, downstream));
        Ok(())
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.log.lock().unwrap().plays += 1;
        Ok(())
    }

    fn set_source_caps(&mut self, caps: &str) -> Result<(), AudioError> {
        self.log.lock().unwrap().caps_updates.push(caps.to_string());
        Ok(())
    }

    fn push(&mut self, data: &[u8], pts_ns: u64, duration_ns: u64) -> Result<(), AudioError> {
        let mut log = self.log.lock().unwrap();
        if log.source_full {
            return Err(AudioError::SourceFull(data.len()));
        }
        log.pushes.push((data.len(), pts_ns, duration_ns));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AudioError> {
        self.log.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn set_volume(&mut self, volume: f64, muted: bool) -> bool {
        if !self.has(StageKind::Volume) {
            return false;
        }
        self.log.lock().unwrap().volumes.push((volume, muted));
        true
    }

    fn configure_equalizer(&mut self, num_bands: usize, updates: &[BandUpdate]) -> bool {
        if !self.has(StageKind::Equalizer) {
            return false;
        }
        self.log
            .lock()
            .unwrap()
            .eq_calls
            .push((num_bands, updates.to_vec()));
        true
    }

    fn sink_name(&self) -> String {
        "fakesink".to_string()
    }

    fn teardown(&mut self) {
        self.log.lock().unwrap().teardowns += 1;
    }
}

fn cd() -> PcmFormat {
    PcmFormat::new(44100, 16, 2).unwrap()
}

fn hires() -> PcmFormat {
    PcmFormat::new(96000, 24, 2).unwrap()
}

fn kinds(pipeline: &AudioPipeline<FakeBackend>) -> Vec<StageKind> {
    pipeline
        .stages()
        .unwrap()
        .iter()
        .map(|(kind, _)| *kind)
        .collect()
}

fn target(formats: &[(u32, u16)]) -> SinkTarget<String> {
    SinkTarget {
        sink: "usb-dac".to_string(),
        supported_formats: formats.iter().copied().map(SupportedFormat::from).collect(),
    }
}

mod pipeline_lifecycle {
    use super::*;

    #[test]
    fn default_graph_links_every_stage_in_order() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        assert_eq!(
            kinds(&pipeline),
            vec![
                StageKind::Source,
                StageKind::Queue,
                StageKind::Convert,
                StageKind::Volume,
                StageKind::Equalizer,
                StageKind::Sink,
            ]
        );
        let log = log.lock().unwrap();
        assert_eq!(log.links.len(), 5);
        assert_eq!(log.plays, 1);
        assert_eq!(log.volumes, vec![(0.5, false)]);
        assert_eq!(
            log.stages[0].2.as_deref(),
            Some("audio/x-raw,format=S16LE,channels=2,rate=44100,layout=interleaved")
        );
    }

    #[test]
    fn same_format_reuses_stage_instances() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        let first = pipeline.stages().unwrap().clone();
        pipeline.create_pipeline(cd(), None, 0.8, true).unwrap();

        assert_eq!(pipeline.stages().unwrap(), &first);
        let log = log.lock().unwrap();
        assert_eq!(log.graphs, 1);
        assert_eq!(log.teardowns, 0);
        assert_eq!(log.plays, 2);
        assert_eq!(log.volumes.last(), Some(&(0.8, true)));
    }

    #[test]
    fn reused_graph_restarts_stream_timing() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        pipeline.push_audio(1_000_000, &[0; 4096], cd());
        pipeline.push_audio(1_023_220, &[0; 4096], cd());
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        pipeline.push_audio(9_000_000, &[0; 4096], cd());

        let log = log.lock().unwrap();
        assert_eq!(log.graphs, 1);
        assert_eq!(log.flushes, 1);
        let pts: Vec<u64> = log.pushes.iter().map(|(_, pts, _)| *pts).collect();
        assert_eq!(pts.len(), 3);
        assert!(pts[1] > 0);
        assert_eq!(pts[2], 0);
    }

    #[test]
    fn reused_graph_returns_to_packed_layout() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(hires(), None, 0.5, false).unwrap();
        pipeline.push_audio(0, &[0; 8], hires());
        pipeline.create_pipeline(hires(), None, 0.5, false).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.caps_updates.len(), 2);
        assert!(log.caps_updates[0].contains("S24_32LE"));
        assert!(log.caps_updates[1].contains("format=S24LE"));
    }

    #[test]
    fn new_format_rebuilds_the_graph() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        let first = pipeline.stages().unwrap().clone();
        pipeline.create_pipeline(hires(), None, 0.5, false).unwrap();

        assert_ne!(pipeline.stages().unwrap(), &first);
        assert_eq!(pipeline.format(), Some(hires()));
        let log = log.lock().unwrap();
        assert_eq!(log.graphs, 2);
        assert_eq!(log.teardowns, 1);
    }

    #[test]
    fn missing_required_stage_leaves_no_pipeline() {
        let (backend, log) = FakeBackend::without(&[StageKind::Convert]);
        let mut pipeline = AudioPipeline::new(backend);

        let result = pipeline.create_pipeline(cd(), None, 0.5, false);

        assert!(matches!(
            result,
            Err(AudioError::MissingStage(StageKind::Convert))
        ));
        assert!(!pipeline.is_active());
        assert_eq!(log.lock().unwrap().teardowns, 1);
    }

    #[test]
    fn missing_optional_stages_are_skipped() {
        let (backend, _log) = FakeBackend::without(&[StageKind::Queue, StageKind::Equalizer]);
        let mut pipeline = AudioPipeline::new(backend);

        pipeline
            .create_pipeline(cd(), Some(target(&[(44100, 16)])), 0.5, false)
            .unwrap();

        assert_eq!(
            kinds(&pipeline),
            vec![
                StageKind::Source,
                StageKind::Convert,
                StageKind::Volume,
                StageKind::CapsFilter,
                StageKind::Sink,
            ]
        );
    }

    #[test]
    fn missing_volume_stage_is_not_fatal() {
        let (backend, log) = FakeBackend::without(&[StageKind::Volume]);
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        pipeline.set_volume(0.2);
        pipeline.set_muted(true);

        assert!(pipeline.is_active());
        assert!(log.lock().unwrap().volumes.is_empty());
        assert!(pipeline.muted());
    }

    #[test]
    fn device_target_negotiates_output_format() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline
            .create_pipeline(
                cd(),
                Some(target(&[(48000, 16), (48000, 24), (96000, 32)])),
                0.5,
                false,
            )
            .unwrap();

        assert_eq!(
            pipeline.output_format(),
            Some(SupportedFormat::new(48000, 24))
        );
        assert_eq!(
            kinds(&pipeline),
            vec![
                StageKind::Source,
                StageKind::Queue,
                StageKind::Convert,
                StageKind::Volume,
                StageKind::Equalizer,
                StageKind::PostConvert,
                StageKind::Resample,
                StageKind::CapsFilter,
                StageKind::Sink,
            ]
        );
        let log = log.lock().unwrap();
        assert_eq!(log.sinks, vec![Some("usb-dac".to_string())]);
        let filter_caps = log
            .stages
            .iter()
            .find(|(_, kind, _)| *kind == StageKind::CapsFilter)
            .and_then(|(_, _, caps)| caps.clone());
        assert_eq!(
            filter_caps.as_deref(),
            Some("audio/x-raw,format=S24LE,channels=2,rate=48000,layout=interleaved")
        );
    }

    #[test]
    fn matching_rate_skips_resampler() {
        let (backend, _log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline
            .create_pipeline(cd(), Some(target(&[(44100, 32)])), 0.5, false)
            .unwrap();

        assert!(!kinds(&pipeline).contains(&StageKind::Resample));
        assert!(kinds(&pipeline).contains(&StageKind::CapsFilter));
    }

    #[test]
    fn destroy_is_idempotent() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        pipeline.destroy_pipeline();
        pipeline.destroy_pipeline();

        assert!(!pipeline.is_active());
        assert_eq!(log.lock().unwrap().teardowns, 1);
    }

    #[test]
    fn invalid_format_is_rejected() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        let format = PcmFormat {
            sample_rate: 0,
            bit_depth: 16,
            channels: 2,
        };

        assert!(matches!(
            pipeline.create_pipeline(format, None, 0.5, false),
            Err(AudioError::InvalidFormat(_))
        ));
        assert_eq!(log.lock().unwrap().graphs, 0);
    }
}

mod pushing {
    use super::*;

    #[test]
    fn push_without_pipeline_is_a_no_op() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        pipeline.push_audio(1000, &[0; 4096], cd());

        assert!(log.lock().unwrap().pushes.is_empty());
    }

    #[test]
    fn jittery_chunks_get_monotonic_timestamps() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        for timestamp in [1000, 1000, 3000, 2000] {
            pipeline.push_audio(timestamp, &[0; 4096], cd());
        }

        let log = log.lock().unwrap();
        let pts: Vec<u64> = log.pushes.iter().map(|(_, pts, _)| *pts).collect();
        assert_eq!(pts, vec![0, 23_219_954, 46_439_908, 69_659_862]);
        assert!(log.pushes.iter().all(|(len, _, dur)| *len == 4096 && *dur == 23_219_954));
    }

    #[test]
    fn mismatched_format_is_dropped() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        pipeline.push_audio(0, &[0; 4096], hires());

        assert!(log.lock().unwrap().pushes.is_empty());
    }

    #[test]
    fn misaligned_chunk_is_dropped() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        pipeline.push_audio(0, &[0; 4095], cd());
        pipeline.push_audio(0, &[0; 4096], cd());

        assert_eq!(log.lock().unwrap().pushes.len(), 1);
    }

    #[test]
    fn padded_twenty_four_bit_updates_source_caps() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(hires(), None, 0.5, false).unwrap();

        pipeline.push_audio(0, &[0; 8], hires());

        let log = log.lock().unwrap();
        assert_eq!(log.pushes.len(), 1);
        assert_eq!(log.caps_updates.len(), 1);
        assert!(log.caps_updates[0].contains("S24_32LE"));
    }

    #[test]
    fn full_source_drops_chunks_and_recovers() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        pipeline.push_audio(0, &[0; 4096], cd());
        log.lock().unwrap().source_full = true;
        pipeline.push_audio(23_220, &[0; 4096], cd());
        pipeline.push_audio(46_440, &[0; 4096], cd());
        log.lock().unwrap().source_full = false;
        pipeline.push_audio(69_660, &[0; 4096], cd());

        assert!(pipeline.is_active());
        let log = log.lock().unwrap();
        let pts: Vec<u64> = log.pushes.iter().map(|(_, pts, _)| *pts).collect();
        assert_eq!(pts, vec![0, 69_660_000]);
    }

    #[test]
    fn flush_restarts_presentation_clock() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        pipeline.push_audio(5_000, &[0; 4096], cd());
        pipeline.push_audio(50_000, &[0; 4096], cd());
        pipeline.flush();
        pipeline.push_audio(90_000, &[0; 4096], cd());

        let log = log.lock().unwrap();
        assert_eq!(log.flushes, 1);
        assert_eq!(log.pushes.last().map(|(_, pts, _)| *pts), Some(0));
    }
}

mod controls {
    use super::*;

    #[test]
    fn volume_is_clamped() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();

        pipeline.set_volume(1.7);
        assert_eq!(pipeline.volume(), 1.0);
        pipeline.set_volume(-0.3);
        assert_eq!(pipeline.volume(), 0.0);
        pipeline.set_volume(f64::NAN);
        assert_eq!(pipeline.volume(), 0.0);

        let log = log.lock().unwrap();
        assert_eq!(log.volumes.len(), 4);
    }

    #[test]
    fn volume_before_pipeline_is_applied_at_build() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        assert_eq!(pipeline.volume(), DEFAULT_VOLUME);

        pipeline.create_pipeline(cd(), None, 0.3, true).unwrap();

        assert_eq!(log.lock().unwrap().volumes, vec![(0.3, true)]);
    }

    #[test]
    fn eq_gains_and_band_count_are_clamped() {
        let (backend, _log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);

        let bands = [
            EqBand {
                freq: 60.0,
                bandwidth: 30.0,
                gain: 40.0,
            },
            EqBand {
                freq: 250.0,
                bandwidth: 100.0,
                gain: -50.0,
            },
        ];
        pipeline.configure_eq_bands(500, &bands);

        let state = pipeline.eq_state();
        assert_eq!(state.num_bands, MAX_BANDS);
        assert_eq!(state.band_configs[0].gain, MAX_GAIN_DB);
        assert_eq!(state.band_configs[1].gain, MIN_GAIN_DB);

        pipeline.configure_eq_bands(0, &bands);
        assert_eq!(pipeline.eq_state().num_bands, MIN_BANDS);
        assert_eq!(pipeline.eq_state().band_configs.len(), 1);
    }

    #[test]
    fn invalid_bands_are_skipped() {
        let mut state = EqState::default();
        state.configure(
            3,
            &[
                EqBand {
                    freq: 0.0,
                    bandwidth: 10.0,
                    gain: 1.0,
                },
                EqBand {
                    freq: 100.0,
                    bandwidth: -1.0,
                    gain: 1.0,
                },
                EqBand {
                    freq: 1000.0,
                    bandwidth: 200.0,
                    gain: 3.0,
                },
            ],
        );

        assert_eq!(state.band_configs.len(), 1);
        assert_eq!(state.band_configs[0].freq, 1000.0);
    }

    #[test]
    fn disabling_eq_flattens_instead_of_bypassing() {
        let (backend, log) = FakeBackend::new();
        let mut pipeline = AudioPipeline::new(backend);
        pipeline.create_pipeline(cd(), None, 0.5, false).unwrap();
        let stages = pipeline.stages().unwrap().clone();

        let band = EqBand {
            freq: 1000.0,
            bandwidth: 100.0,
            gain: 6.0,
        };
        pipeline.configure_eq_bands(2, &[band, band]);
        pipeline.set_eq_enabled(true);
        pipeline.set_eq_enabled(false);

        assert_eq!(pipeline.stages().unwrap(), &stages);
        let log = log.lock().unwrap();
        let (num_bands, updates) = log.eq_calls.last().unwrap();
        assert_eq!(*num_bands, 2);
        assert_eq!(
            updates,
            &vec![
                BandUpdate::Flatten { index: 0 },
                BandUpdate::Flatten { index: 1 }
            ]
        );
        let enabled = &log.eq_calls[log.eq_calls.len() - 2].1;
        assert!(matches!(enabled[0], BandUpdate::Set { index: 0, .. }));
    }
}

mod negotiation {
    use super::*;

    fn formats(pairs: &[(u32, u16)]) -> Vec<SupportedFormat> {
        pairs.iter().copied().map(SupportedFormat::from).collect()
    }

    #[test]
    fn closest_rate_wins() {
        let supported = formats(&[(44100, 32), (96000, 24), (192000, 32)]);
        let picked = pick_output_format(&hires(), &supported);
        assert_eq!(picked, Some(SupportedFormat::new(96000, 24)));
    }

    #[test]
    fn equal_distance_prefers_higher_depth() {
        let supported = formats(&[(48000, 16), (48000, 32), (48000, 24)]);
        let picked = pick_output_format(&cd(), &supported);
        assert_eq!(picked, Some(SupportedFormat::new(48000, 32)));
    }

    #[test]
    fn selection_is_order_independent() {
        let mut supported = formats(&[(88200, 24), (44100, 16), (48000, 32), (44100, 24)]);
        let first = pick_output_format(&cd(), &supported);
        supported.reverse();
        assert_eq!(pick_output_format(&cd(), &supported), first);
        assert_eq!(first, Some(SupportedFormat::new(44100, 24)));
    }

    #[test]
    fn empty_set_has_no_pick() {
        assert_eq!(pick_output_format(&cd(), &[]), None);
    }

    #[test]
    fn probing_counts_padded_twenty_four_bit() {
        let supported = probe_formats(|caps| {
            caps.contains("rate=48000")
                && (caps.contains("format=S16LE") || caps.contains("format=S24_32LE"))
        });

        assert_eq!(
            supported,
            formats(&[(48000, 16), (48000, 24)])
        );
    }

    #[test]
    fn probing_a_deaf_device_yields_nothing() {
        assert!(probe_formats(|_| false).is_empty());
    }
}

mod devices {
    use super::*;

    fn meta(name: &str, props: &[(&str, &str)]) -> DeviceMetadata {
        let mut metadata = DeviceMetadata {
            display_name: name.to_string(),
            device_class: "Audio/Sink".to_string(),
            ..DeviceMetadata::default()
        };
        for (key, value) in props {
            metadata
                .properties
                .insert((*key).to_string(), PropValue::Text((*value).to_string()));
        }
        metadata.rendered = format!("{props:?}");
        metadata
    }

    #[test]
    fn id_follows_key_priority() {
        let device = meta(
            "Speakers",
            &[("device.name", "alsa_card.pci"), ("node.name", "alsa_output.pci")],
        );
        assert_eq!(extract_device_id(&device), "alsa_output.pci");
    }

    #[test]
    fn id_falls_back_to_display_name() {
        assert_eq!(extract_device_id(&meta(" Speakers ", &[])), "Speakers");
        assert_eq!(extract_device_id(&meta("", &[("node.name", " ")])), "audio-output");
    }

    // Heuristic only: these cover the documented substrings, not every
    // device a platform might report.
    #[test]
    fn usb_and_pipewire_hints() {
        let classifier = SubstringClassifier;
        let dac = meta("Headphones", &[("device.bus", "usb"), ("media.class", "PipeWire")]);
        let internal = meta("Built-in Audio", &[("device.bus", "pci")]);

        assert!(classifier.is_usb(&dac));
        assert!(classifier.is_pipewire(&dac));
        assert!(!classifier.is_usb(&internal));
        assert!(!classifier.is_pipewire(&internal));
        assert!(classifier.is_usb(&meta("USB Audio CODEC", &[])));
    }

    #[test]
    fn outputs_sort_usb_first_then_by_name() {
        let classifier = SubstringClassifier;
        let mut outputs = vec![
            describe_output(&meta("speakers", &[]), Vec::new(), &classifier),
            describe_output(&meta("Zebra USB", &[]), Vec::new(), &classifier),
            describe_output(&meta("Alpha", &[]), Vec::new(), &classifier),
            describe_output(&meta("apex usb", &[]), Vec::new(), &classifier),
        ];
        sort_outputs(&mut outputs);

        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["apex usb", "Zebra USB", "Alpha", "speakers"]);
    }

    struct FakeProbe {
        devices: Vec<ProbedDevice>,
        enumerations: AtomicUsize,
    }

    impl FakeProbe {
        fn new(devices: Vec<DeviceMetadata>) -> Self {
            Self {
                devices: devices
                    .into_iter()
                    .map(|metadata| ProbedDevice {
                        metadata,
                        supported_formats: vec![SupportedFormat::new(48000, 24)],
                    })
                    .collect(),
                enumerations: AtomicUsize::new(0),
            }
        }
    }

    impl DeviceProbe for FakeProbe {
        type Sink = String;

        fn sink_devices(&self) -> Result<Vec<ProbedDevice>, AudioError> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            Ok(self.devices.clone())
        }

        fn create_sink(&self, output: &OutputDevice, _: &ResolvedRouting) -> Option<String> {
            Some(output.id.clone())
        }
    }

    #[test]
    fn registry_prefers_pipewire_and_dedupes() {
        let registry = OutputRegistry::new(FakeProbe::new(vec![
            meta("Legacy", &[("device.id", "legacy")]),
            meta("DAC", &[("node.name", "dac"), ("factory", "pipewire")]),
            meta("DAC again", &[("node.name", "dac"), ("factory", "pipewire")]),
            meta("Speakers", &[("node.name", "spk"), ("factory", "pipewire")]),
        ]));

        let outputs = registry.refresh().unwrap();

        let ids: Vec<&str> = outputs.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["dac", "spk"]);
        assert_eq!(registry.outputs(), outputs);
    }

    #[test]
    fn lookup_refreshes_an_empty_cache_once() {
        let registry = OutputRegistry::new(FakeProbe::new(vec![meta(
            "Speakers",
            &[("device.id", "spk")],
        )]));

        assert!(registry.get("spk").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.probe_enumerations(), 1);

        let routing = OutputRouting::default().resolve(|_| None);
        let target = registry.sink_target("spk", &routing).unwrap();
        assert_eq!(target.sink, "spk");
        assert_eq!(
            target.supported_formats,
            vec![SupportedFormat::new(48000, 24)]
        );
    }

    impl OutputRegistry<FakeProbe> {
        fn probe_enumerations(&self) -> usize {
            self.probe().enumerations.load(Ordering::SeqCst)
        }
    }
}

mod routing {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    fn pipewire_device() -> DeviceMetadata {
        let mut device = DeviceMetadata {
            display_name: "DAC".to_string(),
            ..DeviceMetadata::default()
        };
        device.properties.insert(
            "node.name".to_string(),
            PropValue::Text("alsa_output.usb-dac".to_string()),
        );
        device
            .properties
            .insert("api.alsa.card".to_string(), PropValue::Int(2));
        device
    }

    #[test]
    fn default_routing_uses_native_sink() {
        let resolved = OutputRouting::default().resolve(env(&[]));
        assert_eq!(resolved.backend, None);
        assert_eq!(
            resolved.sink_requests(&pipewire_device(), true),
            vec![SinkRequest::Native {
                pipewire_target: Some("alsa_output.usb-dac".to_string())
            }]
        );
    }

    #[test]
    fn environment_overrides_settings() {
        let routing = OutputRouting {
            backend: "alsa".to_string(),
            pulse_device: String::new(),
            alsa_device: "hw:0,0".to_string(),
        };
        let resolved = routing.resolve(env(&[
            (BACKEND_ENV, "PulseAudio"),
            (PULSE_DEVICE_ENV, "my-sink"),
        ]));

        assert_eq!(resolved.backend, Some(RoutingBackend::Pulse));
        assert_eq!(resolved.pulse_device, "my-sink");
        assert_eq!(resolved.alsa_device, "hw:0,0");
    }

    #[test]
    fn configured_device_implies_backend() {
        let routing = OutputRouting {
            alsa_device: "hw:1,0".to_string(),
            ..OutputRouting::default()
        };
        assert_eq!(
            routing.resolve(env(&[])).backend,
            Some(RoutingBackend::Alsa)
        );
    }

    #[test]
    fn pulse_falls_back_to_node_name() {
        let routing = OutputRouting {
            backend: "pulse".to_string(),
            ..OutputRouting::default()
        };
        let requests = routing
            .resolve(env(&[]))
            .sink_requests(&pipewire_device(), false);

        assert_eq!(
            requests,
            vec![
                SinkRequest::Pulse {
                    device: "alsa_output.usb-dac".to_string()
                },
                SinkRequest::Native {
                    pipewire_target: None
                },
            ]
        );
    }

    #[test]
    fn alsa_builds_hw_address_from_card() {
        let routing = OutputRouting {
            backend: "alsa".to_string(),
            ..OutputRouting::default()
        };
        let requests = routing
            .resolve(env(&[]))
            .sink_requests(&pipewire_device(), false);

        assert_eq!(
            requests[0],
            SinkRequest::Alsa {
                device: "hw:2,0".to_string()
            }
        );
    }

    #[test]
    fn pipewire_target_override_wins() {
        let resolved = OutputRouting::default().resolve(env(&[(PIPEWIRE_TARGET_ENV, "42")]));
        assert_eq!(
            resolved.sink_requests(&pipewire_device(), true),
            vec![SinkRequest::Native {
                pipewire_target: Some("42".to_string())
            }]
        );
    }
}
