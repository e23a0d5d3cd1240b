use super::DeviceMetadata;

/// Environment variable overriding the configured backend hint.
pub const BACKEND_ENV: &str = "SENDSPIN_OUTPUT_BACKEND";
/// Environment variable overriding the PulseAudio device.
pub const PULSE_DEVICE_ENV: &str = "SENDSPIN_PULSE_DEVICE";
/// Environment variable overriding the ALSA device.
pub const ALSA_DEVICE_ENV: &str = "SENDSPIN_ALSA_DEVICE";
/// Environment variable forcing the PipeWire `target-object`.
pub const PIPEWIRE_TARGET_ENV: &str = "SENDSPIN_PIPEWIRE_TARGET";

const PIPEWIRE_TARGET_KEYS: [&str; 4] = ["node.name", "object.serial", "object.id", "object.path"];

/// Sink routing preferences from settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRouting {
    /// Backend hint: empty, `pulse` or `alsa`
    pub backend: String,
    /// PulseAudio sink name
    pub pulse_device: String,
    /// ALSA device string
    pub alsa_device: String,
}

/// Sink backend forced by routing preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingBackend {
    /// `pulsesink`
    Pulse,
    /// `alsasink`
    Alsa,
}

/// Routing preferences after environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRouting {
    /// Backend to try before the device's own element
    pub backend: Option<RoutingBackend>,
    /// PulseAudio sink name, possibly empty
    pub pulse_device: String,
    /// ALSA device string, possibly empty
    pub alsa_device: String,
    /// Forced PipeWire target, possibly empty
    pub pipewire_target: String,
}

/// One way to create a sink for a device, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkRequest {
    /// `pulsesink` with `device` set
    Pulse {
        /// Pulse sink or PipeWire node name
        device: String,
    },
    /// `alsasink` with `device` set
    Alsa {
        /// ALSA device string
        device: String,
    },
    /// The element the device itself creates
    Native {
        /// `target-object` for PipeWire sinks
        pipewire_target: Option<String>,
    },
}

impl OutputRouting {
    /// Applies environment overrides through `env`.
    ///
    /// Without an explicit backend, a configured Pulse device selects
    /// `pulse` and otherwise a configured ALSA device selects `alsa`.
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedRouting {
        let pick = |key: &str, fallback: &str| {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| fallback.trim().to_string())
        };

        let pulse_device = pick(PULSE_DEVICE_ENV, &self.pulse_device);
        let alsa_device = pick(ALSA_DEVICE_ENV, &self.alsa_device);
        let pipewire_target = pick(PIPEWIRE_TARGET_ENV, "");

        let backend = match pick(BACKEND_ENV, &self.backend).to_lowercase().as_str() {
            "pulse" | "pulseaudio" => Some(RoutingBackend::Pulse),
            "alsa" => Some(RoutingBackend::Alsa),
            _ if !pulse_device.is_empty() => Some(RoutingBackend::Pulse),
            _ if !alsa_device.is_empty() => Some(RoutingBackend::Alsa),
            _ => None,
        };

        ResolvedRouting {
            backend,
            pulse_device,
            alsa_device,
            pipewire_target,
        }
    }

    /// Resolves against the process environment.
    pub fn resolve_from_env(&self) -> ResolvedRouting {
        self.resolve(|key| std::env::var(key).ok())
    }
}

impl ResolvedRouting {
    /// Sink creation attempts for `device`, most specific first.
    ///
    /// The native element is always the last resort.
    pub fn sink_requests(&self, device: &DeviceMetadata, is_pipewire: bool) -> Vec<SinkRequest> {
        let mut requests = Vec::with_capacity(2);

        match self.backend {
            Some(RoutingBackend::Pulse) => {
                let target = Some(self.pulse_device.clone())
                    .filter(|name| !name.is_empty())
                    .or_else(|| device.text("node.name").map(str::to_string));
                if let Some(device) = target {
                    requests.push(SinkRequest::Pulse { device });
                }
            }
            Some(RoutingBackend::Alsa) => {
                if let Some(device) = self.alsa_target(device) {
                    requests.push(SinkRequest::Alsa { device });
                }
            }
            None => {}
        }

        let pipewire_target = is_pipewire
            .then(|| self.pipewire_target(device))
            .flatten();
        requests.push(SinkRequest::Native { pipewire_target });
        requests
    }

    fn alsa_target(&self, device: &DeviceMetadata) -> Option<String> {
        if !self.alsa_device.is_empty() {
            return Some(self.alsa_device.clone());
        }
        if let Some(path) = device.text("api.alsa.path") {
            return Some(path.to_string());
        }
        let card = device
            .int("api.alsa.card")
            .or_else(|| device.text("api.alsa.card").and_then(|v| v.parse().ok()))?;
        let pcm = device
            .int("api.alsa.pcm.device")
            .or_else(|| device.text("api.alsa.pcm.device").and_then(|v| v.parse().ok()))
            .unwrap_or(0);
        Some(format!("hw:{card},{pcm}"))
    }

    fn pipewire_target(&self, device: &DeviceMetadata) -> Option<String> {
        if !self.pipewire_target.is_empty() {
            return Some(self.pipewire_target.clone());
        }
        PIPEWIRE_TARGET_KEYS.iter().find_map(|key| {
            device
                .text(key)
                .map(str::to_string)
                .or_else(|| device.int(key).map(|value| value.to_string()))
        })
    }
}
