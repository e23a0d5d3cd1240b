use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{PcmFormat, SupportedFormat, gst_sample_format, raw_caps};

/// Sample rates probed against every device.
pub const CANDIDATE_RATES: [u32; 8] = [44100, 48000, 88200, 96000, 176400, 192000, 352800, 384000];
/// Bit depths probed against every device.
pub const CANDIDATE_DEPTHS: [u16; 3] = [16, 24, 32];

/// Metadata keys tried, in order, for a stable device id.
const ID_KEYS: [&str; 6] = [
    "device.id",
    "node.name",
    "object.path",
    "device.name",
    "device.serial",
    "device.nick",
];

/// Metadata keys inspected for a USB hint.
const USB_KEYS: [&str; 7] = [
    "device.bus",
    "device.bus-path",
    "device.bus_path",
    "device.description",
    "device.name",
    "node.description",
    "node.name",
];

const FALLBACK_ID: &str = "audio-output";

/// A discovered local audio output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDevice {
    /// Stable identifier usable as a persisted preference
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Sorted `(rate, depth)` pairs the device accepts
    pub supported_formats: Vec<SupportedFormat>,
    /// Heuristically detected USB device
    pub is_usb: bool,
    /// Device is routed through PipeWire
    pub is_pipewire: bool,
}

/// Typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// String property
    Text(String),
    /// Integer property
    Int(i64),
}

/// Backend-neutral description of a sink device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMetadata {
    /// Display name reported by the backend
    pub display_name: String,
    /// Device class, such as `Audio/Sink`
    pub device_class: String,
    /// Flattened property map
    pub properties: BTreeMap<String, PropValue>,
    /// Backend's own string rendering of the properties
    pub rendered: String,
}

impl DeviceMetadata {
    /// Trimmed, non-empty text property.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropValue::Text(value)) => Some(value.trim()).filter(|v| !v.is_empty()),
            _ => None,
        }
    }

    /// Integer property.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.properties.get(key) {
            Some(PropValue::Int(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Best-effort device classification.
///
/// Both answers come from substring matches over backend metadata. They are
/// good enough to sort and label devices, not to make guarantees.
pub trait DeviceClassifier: Send + Sync {
    /// Whether the device sits behind PipeWire.
    fn is_pipewire(&self, device: &DeviceMetadata) -> bool;

    /// Whether the device is a USB audio interface.
    fn is_usb(&self, device: &DeviceMetadata) -> bool;
}

/// Default substring heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl DeviceClassifier for SubstringClassifier {
    fn is_pipewire(&self, device: &DeviceMetadata) -> bool {
        contains_folded(&device.device_class, "pipewire")
            || contains_folded(&device.rendered, "pipewire")
    }

    fn is_usb(&self, device: &DeviceMetadata) -> bool {
        contains_folded(&device.display_name, "usb")
            || USB_KEYS
                .iter()
                .filter_map(|key| device.text(key))
                .any(|value| contains_folded(value, "usb"))
    }
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Stable id for a device, falling back to its display name.
pub fn extract_device_id(device: &DeviceMetadata) -> String {
    ID_KEYS
        .iter()
        .find_map(|key| device.text(key))
        .map(str::to_string)
        .or_else(|| Some(device.display_name.trim().to_string()).filter(|name| !name.is_empty()))
        .unwrap_or_else(|| FALLBACK_ID.to_string())
}

/// Builds an [`OutputDevice`] from metadata and probed formats.
pub fn describe_output(
    device: &DeviceMetadata,
    supported_formats: Vec<SupportedFormat>,
    classifier: &dyn DeviceClassifier,
) -> OutputDevice {
    let id = extract_device_id(device);
    let name = Some(device.display_name.trim())
        .filter(|name| !name.is_empty())
        .map_or_else(|| id.clone(), str::to_string);

    OutputDevice {
        name,
        supported_formats,
        is_usb: classifier.is_usb(device),
        is_pipewire: classifier.is_pipewire(device),
        id,
    }
}

/// Probes the candidate matrix against a device.
///
/// `accepts` receives a stereo interleaved caps string and answers whether
/// the device can take it. 24-bit audio also counts when the device only
/// takes it in 4-byte containers.
pub fn probe_formats(mut accepts: impl FnMut(&str) -> bool) -> Vec<SupportedFormat> {
    let mut supported = Vec::new();

    for bit_depth in CANDIDATE_DEPTHS {
        let mut sample_formats = vec![gst_sample_format(bit_depth, None)];
        if bit_depth == 24 {
            sample_formats.push(gst_sample_format(24, Some(4)));
        }
        for sample_rate in CANDIDATE_RATES {
            if sample_formats
                .iter()
                .any(|sample_format| accepts(&raw_caps(sample_format, 2, sample_rate)))
            {
                supported.push(SupportedFormat::new(sample_rate, bit_depth));
            }
        }
    }

    supported.sort();
    supported
}

/// Picks the output format closest to the stream.
///
/// The entry minimizing `(|rate difference|, -bit_depth)` wins: the closest
/// rate first, then the highest depth. Returns `None` for an empty set.
pub fn pick_output_format(
    stream: &PcmFormat,
    supported: &[SupportedFormat],
) -> Option<SupportedFormat> {
    supported
        .iter()
        .copied()
        .min_by_key(|candidate| {
            (
                candidate.sample_rate.abs_diff(stream.sample_rate),
                std::cmp::Reverse(candidate.bit_depth),
            )
        })
}

/// Orders devices USB-first, then by case-insensitive name.
pub fn sort_outputs(outputs: &mut [OutputDevice]) {
    outputs.sort_by_key(|output| (!output.is_usb, output.name.to_lowercase()));
}
