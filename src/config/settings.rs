use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::{debug, instrument, warn};

use super::ConfigPaths;
use crate::{
    core::{MadeskError, Result},
    services::{
        audio::{OutputRouting, SupportedFormat},
        control::Endpoint,
        sendspin::identity,
    },
};

/// Preferred audio backend for routing the local sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputBackend {
    /// Let the device decide, or infer from configured device names.
    #[default]
    Auto,
    /// Force a PulseAudio (or pipewire-pulse) sink.
    Pulse,
    /// Force an ALSA sink.
    Alsa,
}

impl OutputBackend {
    /// Parses a backend hint. Unknown values fall back to [`OutputBackend::Auto`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pulse" | "pulseaudio" => OutputBackend::Pulse,
            "alsa" => OutputBackend::Alsa,
            _ => OutputBackend::Auto,
        }
    }

    /// Name written to the settings file.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputBackend::Auto => "",
            OutputBackend::Pulse => "pulse",
            OutputBackend::Alsa => "alsa",
        }
    }
}

impl Serialize for OutputBackend {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputBackend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        lenient::text(deserializer).map(|hint| Self::parse(&hint))
    }
}

/// Persisted desktop settings.
///
/// Stored as a flat JSON object. Keys this type does not know about are
/// kept in [`Settings::extra`] and written back on save, so other tools can
/// share the file. Values of the wrong type degrade to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Normalized Music Assistant server URL, empty when unset.
    #[serde(deserialize_with = "lenient::server_url")]
    pub server_url: String,
    /// Long-lived access token, empty when the server needs none.
    #[serde(deserialize_with = "lenient::text")]
    pub auth_token: String,
    /// Persistent Sendspin client identity.
    #[serde(
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sendspin_client_id: Option<String>,
    /// Music Assistant player selected as the output target.
    #[serde(deserialize_with = "lenient::optional_text")]
    pub output_player_id: Option<String>,
    /// Local output device id used when this computer is the target.
    #[serde(deserialize_with = "lenient::optional_text")]
    pub output_local_output_id: Option<String>,
    /// Backend hint for sink construction.
    pub output_backend: OutputBackend,
    /// PulseAudio sink name override.
    #[serde(deserialize_with = "lenient::text")]
    pub output_pulse_device: String,
    /// ALSA device override (for example `hw:1,0`).
    #[serde(deserialize_with = "lenient::text")]
    pub output_alsa_device: String,
    /// Whether the equalizer is applied.
    #[serde(deserialize_with = "lenient::flag")]
    pub eq_enabled: bool,
    /// Name of the last selected equalizer preset.
    #[serde(deserialize_with = "lenient::optional_text")]
    pub eq_selected_preset: Option<String>,
    /// Formats last negotiated with the selected local output.
    #[serde(deserialize_with = "lenient::formats")]
    pub sendspin_pcm_support: Vec<SupportedFormat>,
    /// Keys owned by other tools.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    /// Builds settings from a parsed JSON document.
    ///
    /// A document that is not an object yields the defaults.
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            warn!("Settings document is not an object, using defaults");
            return Self::default();
        }
        match Self::deserialize(value) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Failed to decode settings, using defaults: {err}");
                Self::default()
            }
        }
    }

    /// Writes every field into `map`, leaving other keys untouched.
    pub fn merge_into(&self, map: &mut Map<String, Value>) {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => map.extend(fields),
            Ok(_) => {}
            Err(err) => warn!("Failed to encode settings: {err}"),
        }
    }

    /// Records the formats negotiated with the local output.
    ///
    /// An empty list never replaces a known one. Returns `true` when the
    /// stored list changed and the settings need saving.
    pub fn record_pcm_support(&mut self, formats: &[SupportedFormat]) -> bool {
        if formats.is_empty() || self.sendspin_pcm_support == formats {
            return false;
        }
        self.sendspin_pcm_support = formats.to_vec();
        true
    }

    /// Generates and stores a Sendspin client id when none is set.
    ///
    /// Returns `true` when a new id was generated and the settings need saving.
    pub fn ensure_client_id(&mut self) -> bool {
        if self.sendspin_client_id.is_some() {
            return false;
        }
        self.sendspin_client_id = Some(identity::generate_client_id());
        true
    }

    /// Control-plane endpoint, or `None` when no server is configured.
    pub fn endpoint(&self) -> Option<Endpoint> {
        if self.server_url.is_empty() {
            return None;
        }
        Some(Endpoint::new(&self.server_url, &self.auth_token))
    }

    /// Sink routing preferences derived from the output settings.
    pub fn output_routing(&self) -> OutputRouting {
        OutputRouting {
            backend: self.output_backend.as_str().to_string(),
            pulse_device: self.output_pulse_device.clone(),
            alsa_device: self.output_alsa_device.clone(),
        }
    }
}

/// JSON-file backed settings persistence.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the default settings location.
    ///
    /// # Errors
    /// Returns error if the configuration directory cannot be determined
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(ConfigPaths::settings_file()?))
    }

    /// Location of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings, falling back to defaults for a missing or
    /// unreadable file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Settings {
        match self.read_document() {
            Ok(Some(document)) => Settings::from_value(&Value::Object(document)),
            Ok(None) => {
                debug!("No settings file found, using defaults");
                Settings::default()
            }
            Err(err) => {
                warn!("Failed to read settings: {err}");
                Settings::default()
            }
        }
    }

    /// Saves the settings, merging them into whatever the file already holds.
    ///
    /// The file is written pretty-printed with sorted keys.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or the file cannot be written
    #[instrument(skip(self, settings), fields(path = %self.path.display()))]
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let mut document = match self.read_document() {
            Ok(existing) => existing.unwrap_or_default(),
            Err(err) => {
                warn!("Failed to read settings before saving: {err}");
                Map::new()
            }
        };
        settings.merge_into(&mut document);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| MadeskError::io_at(&e, parent))?;
        }

        let mut content = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|e| MadeskError::json(e, Some(&self.path)))?;
        content.push('\n');
        fs::write(&self.path, content).map_err(|e| MadeskError::io_at(&e, &self.path))?;

        Ok(())
    }

    fn read_document(&self) -> Result<Option<Map<String, Value>>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(MadeskError::io_at(&err, &self.path)),
        };

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| MadeskError::json(e, Some(&self.path)))?;

        match value {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(MadeskError::InvalidSetting {
                field: "<root>".to_string(),
                reason: "settings file must contain a JSON object".to_string(),
            }),
        }
    }
}

/// Normalizes a user-entered server URL.
///
/// Adds `http://` when no scheme is given and strips trailing slashes.
/// Returns an empty string when the value has no usable host.
pub fn normalize_server_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    match candidate.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() && uri.host().is_some_and(|h| !h.is_empty()) => {
            candidate.trim_end_matches('/').to_string()
        }
        _ => String::new(),
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    use super::normalize_server_url;
    use crate::services::audio::SupportedFormat;

    type Result<T, E> = std::result::Result<T, E>;

    fn value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn mistyped(expected: &str, value: &Value) {
        if !value.is_null() {
            warn!("Ignoring settings value {value}, expected {expected}");
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = value(deserializer)?;
        match value.as_str() {
            Some(text) => Ok(text.trim().to_string()),
            None => {
                mistyped("a string", &value);
                Ok(String::new())
            }
        }
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        text(deserializer).map(|text| Some(text).filter(|text| !text.is_empty()))
    }

    pub fn server_url<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        text(deserializer).map(|url| normalize_server_url(&url))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = value(deserializer)?;
        match value.as_bool() {
            Some(flag) => Ok(flag),
            None => {
                mistyped("a boolean", &value);
                Ok(false)
            }
        }
    }

    pub fn formats<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<SupportedFormat>, D::Error> {
        let value = value(deserializer)?;
        match serde_json::from_value(value.clone()) {
            Ok(formats) => Ok(formats),
            Err(_) => {
                mistyped("a list of [rate, depth] pairs", &value);
                Ok(Vec::new())
            }
        }
    }
}
