//! Configuration paths and persisted settings.
//!
//! Settings live in a flat JSON document shared with the desktop front-end.
//! Only the keys the audio core needs are modelled; everything else in the
//! file survives a load/save cycle untouched.

mod paths;
mod settings;

pub use paths::ConfigPaths;
pub use settings::{OutputBackend, Settings, SettingsStore, normalize_server_url};
