//! Formatting utilities for CLI output.
//!
//! Provides styled headers and errors plus compact renderings of output
//! devices and players.

use crate::services::{
    audio::{OutputDevice, SupportedFormat},
    control::Player,
    playback::OutputTarget,
};

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";
    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Cyan color
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Formats section headers with styling
pub fn format_header(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::CYAN, text, Colors::RESET)
}

/// Formats secondary details with muted styling
pub fn format_description(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats the marker of the selected row
pub fn format_selected(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::GREEN, text, Colors::RESET)
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Sample rate in kHz without trailing zeros, e.g. `44.1 kHz`, `96 kHz`.
pub fn format_rate(sample_rate: u32) -> String {
    let whole = sample_rate / 1000;
    let fraction = sample_rate % 1000;
    if fraction == 0 {
        return format!("{whole} kHz");
    }
    let digits = format!("{fraction:03}");
    format!("{whole}.{} kHz", digits.trim_end_matches('0'))
}

/// Comma-separated `rate/depth` list, or `unknown` when empty.
///
/// # Examples
///
/// ```
/// use madesk::cli::formatting::format_formats;
/// use madesk::services::audio::SupportedFormat;
///
/// let formats = [SupportedFormat::new(44100, 16), SupportedFormat::new(96000, 24)];
/// assert_eq!(format_formats(&formats), "44.1 kHz/16-bit, 96 kHz/24-bit");
/// assert_eq!(format_formats(&[]), "unknown");
/// ```
pub fn format_formats(formats: &[SupportedFormat]) -> String {
    if formats.is_empty() {
        return "unknown".to_string();
    }
    formats
        .iter()
        .map(|format| format!("{}/{}-bit", format_rate(format.sample_rate), format.bit_depth))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Equalizer switch and the last selected preset.
pub fn format_equalizer(enabled: bool, preset: Option<&str>) -> String {
    let state = if enabled { "on" } else { "off" };
    match preset {
        Some(preset) => format!("Equalizer: {state} (preset: {preset})"),
        None => format!("Equalizer: {state}"),
    }
}

/// One line for a local output.
pub fn format_output(output: &OutputDevice) -> String {
    let mut tags = Vec::new();
    if output.is_usb {
        tags.push("usb");
    }
    if output.is_pipewire {
        tags.push("pipewire");
    }
    let tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", tags.join(", "))
    };

    format!(
        "{}{tags}\n    id: {}\n    {}",
        output.name,
        output.id,
        format_description(&format_formats(&output.supported_formats))
    )
}

/// One line for a selectable output target.
pub fn format_target(target: &OutputTarget, selected: bool, player: Option<&Player>) -> String {
    let marker = if selected {
        format_selected("*")
    } else {
        " ".to_string()
    };
    let volume = player
        .and_then(|player| player.volume_level)
        .map(|volume| format!(" {volume}%"))
        .unwrap_or_default();
    let local = target
        .local_output_id
        .as_deref()
        .map(|id| format!(" --output {id}"))
        .unwrap_or_default();

    format!(
        "{marker} {:<40}{volume}  {}",
        target.display_name,
        format_description(&format!("{}{local}", target.player_id))
    )
}
