use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError, RwLock},
};

use gst::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::{
    AudioError, DeviceClassifier, DeviceMetadata, OutputDevice, PropValue, ResolvedRouting,
    SinkRequest, SinkTarget, SubstringClassifier, SupportedFormat, describe_output,
    extract_device_id, probe_formats, sort_outputs,
};
use crate::tracing_config::verbose_diagnostics;

/// A sink device as reported by the platform, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedDevice {
    /// Backend metadata
    pub metadata: DeviceMetadata,
    /// Formats accepted by the device
    pub supported_formats: Vec<SupportedFormat>,
}

/// Source of local sink devices.
pub trait DeviceProbe: Send + Sync {
    /// Sink handle created for a device.
    type Sink: Send;

    /// Lists sink devices with their probed formats.
    ///
    /// # Errors
    /// Returns `AudioError::DeviceEnumeration` when the platform cannot be
    /// queried.
    fn sink_devices(&self) -> Result<Vec<ProbedDevice>, AudioError>;

    /// Creates a sink for a previously listed output.
    fn create_sink(&self, output: &OutputDevice, routing: &ResolvedRouting) -> Option<Self::Sink>;
}

/// Cached list of local outputs.
///
/// Refreshes are serialized so a periodic refresh and a user-triggered one
/// never enumerate concurrently; readers see the previous list meanwhile.
pub struct OutputRegistry<P: DeviceProbe> {
    probe: P,
    classifier: Box<dyn DeviceClassifier>,
    outputs: RwLock<Vec<OutputDevice>>,
    refresh_lock: Mutex<()>,
}

impl<P: DeviceProbe> OutputRegistry<P> {
    /// Creates an empty registry using the default heuristics.
    pub fn new(probe: P) -> Self {
        Self::with_classifier(probe, Box::new(SubstringClassifier))
    }

    /// Creates an empty registry with custom device heuristics.
    pub fn with_classifier(probe: P, classifier: Box<dyn DeviceClassifier>) -> Self {
        Self {
            probe,
            classifier,
            outputs: RwLock::new(Vec::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Underlying device probe.
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Re-enumerates devices and replaces the cache.
    ///
    /// When any device is routed through PipeWire, only PipeWire devices
    /// are kept.
    ///
    /// # Errors
    /// Returns error when enumeration fails; the cache is left untouched.
    #[instrument(skip(self))]
    pub fn refresh(&self) -> Result<Vec<OutputDevice>, AudioError> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut seen = HashSet::new();
        let mut outputs: Vec<OutputDevice> = self
            .probe
            .sink_devices()?
            .into_iter()
            .map(|device| {
                describe_output(
                    &device.metadata,
                    device.supported_formats,
                    self.classifier.as_ref(),
                )
            })
            .filter(|output| seen.insert(output.id.clone()))
            .collect();

        if outputs.iter().any(|output| output.is_pipewire) {
            outputs.retain(|output| output.is_pipewire);
        }
        sort_outputs(&mut outputs);

        if verbose_diagnostics() {
            for output in &outputs {
                info!(
                    "Sendspin output {} ({}): usb={}, pipewire={}, formats={:?}",
                    output.name,
                    output.id,
                    output.is_usb,
                    output.is_pipewire,
                    output.supported_formats
                );
            }
        }
        debug!(count = outputs.len(), "Local outputs refreshed");

        let mut cache = self.outputs.write().unwrap_or_else(PoisonError::into_inner);
        cache.clone_from(&outputs);
        Ok(outputs)
    }

    /// Cached outputs from the last refresh.
    pub fn outputs(&self) -> Vec<OutputDevice> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Looks up an output by id, refreshing first when nothing is cached.
    pub fn get(&self, id: &str) -> Option<OutputDevice> {
        if self.outputs.read().unwrap_or_else(PoisonError::into_inner).is_empty() {
            if let Err(err) = self.refresh() {
                warn!("Failed to list local outputs: {err}");
            }
        }
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|output| output.id == id)
            .cloned()
    }

    /// Sink and formats for the output with `id`.
    ///
    /// Returns `None` when the output is unknown or no sink could be
    /// created, in which case playback uses the default sink.
    pub fn sink_target(
        &self,
        id: &str,
        routing: &ResolvedRouting,
    ) -> Option<SinkTarget<P::Sink>> {
        let Some(output) = self.get(id) else {
            warn!("Local output {id} not found; using default sink");
            return None;
        };
        let sink = self.probe.create_sink(&output, routing)?;
        Some(SinkTarget {
            sink,
            supported_formats: output.supported_formats,
        })
    }

    /// Supported formats of an output, empty when unknown.
    pub fn supported_formats(&self, id: &str) -> Vec<SupportedFormat> {
        self.get(id)
            .map(|output| output.supported_formats)
            .unwrap_or_default()
    }
}

/// Device probe backed by the GStreamer device monitor.
#[derive(Debug, Default)]
pub struct GstDeviceProbe {
    devices: Mutex<Vec<(String, gst::Device)>>,
}

impl GstDeviceProbe {
    /// Creates a probe; GStreamer must already be initialized.
    pub fn new() -> Self {
        Self::default()
    }

    fn make_sink(&self, request: &SinkRequest, id: &str) -> Option<gst::Element> {
        match request {
            SinkRequest::Pulse { device } => make_routed_sink("pulsesink", device),
            SinkRequest::Alsa { device } => make_routed_sink("alsasink", device),
            SinkRequest::Native { pipewire_target } => {
                let devices = self.devices.lock().unwrap_or_else(PoisonError::into_inner);
                let (_, device) = devices.iter().find(|(device_id, _)| device_id == id)?;
                let element = device.create_element(None).ok()?;
                if let Some(target) = pipewire_target {
                    if element.find_property("target-object").is_some() {
                        element.set_property("target-object", target);
                    }
                }
                Some(element)
            }
        }
    }
}

impl DeviceProbe for GstDeviceProbe {
    type Sink = gst::Element;

    fn sink_devices(&self) -> Result<Vec<ProbedDevice>, AudioError> {
        let monitor = gst::DeviceMonitor::new();
        monitor.add_filter(Some("Audio/Sink"), None);
        monitor
            .start()
            .map_err(|err| AudioError::DeviceEnumeration(err.to_string()))?;
        let devices = monitor.devices();
        monitor.stop();

        let mut probed = Vec::with_capacity(devices.len());
        let mut handles = Vec::with_capacity(devices.len());
        for device in devices {
            let metadata = device_metadata(&device);
            let supported_formats = match device.caps() {
                Some(caps) => probe_formats(|candidate| {
                    candidate
                        .parse::<gst::Caps>()
                        .is_ok_and(|candidate| caps.can_intersect(&candidate))
                }),
                None => Vec::new(),
            };
            handles.push((extract_device_id(&metadata), device));
            probed.push(ProbedDevice {
                metadata,
                supported_formats,
            });
        }

        *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = handles;
        Ok(probed)
    }

    fn create_sink(&self, output: &OutputDevice, routing: &ResolvedRouting) -> Option<gst::Element> {
        let metadata = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(id, _)| *id == output.id)
            .map(|(_, device)| device_metadata(device))?;

        for request in routing.sink_requests(&metadata, output.is_pipewire) {
            match self.make_sink(&request, &output.id) {
                Some(sink) => {
                    debug!("Sendspin sink for {}: {request:?}", output.id);
                    return Some(sink);
                }
                None => debug!("Sink request {request:?} failed for {}", output.id),
            }
        }
        warn!("Failed to create sink for output {}", output.id);
        None
    }
}

fn make_routed_sink(factory: &str, device: &str) -> Option<gst::Element> {
    gst::ElementFactory::make(factory)
        .property("device", device)
        .build()
        .ok()
}

fn device_metadata(device: &gst::Device) -> DeviceMetadata {
    let mut metadata = DeviceMetadata {
        display_name: device.display_name().to_string(),
        device_class: device.device_class().to_string(),
        ..DeviceMetadata::default()
    };

    if let Some(properties) = device.properties() {
        for (key, value) in properties.iter() {
            let value = if let Ok(text) = value.get::<String>() {
                PropValue::Text(text)
            } else if let Ok(int) = value.get::<i32>() {
                PropValue::Int(i64::from(int))
            } else if let Ok(int) = value.get::<u32>() {
                PropValue::Int(i64::from(int))
            } else if let Ok(int) = value.get::<i64>() {
                PropValue::Int(int)
            } else {
                continue;
            };
            metadata.properties.insert(key.to_string(), value);
        }
        metadata.rendered = properties.to_string();
    }
    metadata
}
