//! Unit tests for CLI module
//!
//! Tests argument parsing, output formatting and error conversion.
//! No server, GStreamer or settings file is touched.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use clap::Parser;

use super::{Cli, CliError, Commands, ControlAction, commands, formatting::*, parse_position};
use crate::config::Settings;
use crate::services::{
    audio::{
        AudioError, DeviceMetadata, DeviceProbe, OutputDevice, OutputRegistry, ProbedDevice,
        PropValue, ResolvedRouting, SupportedFormat,
    },
    control::{ControlError, Player},
    playback::OutputTargets,
    sendspin::ClientIdentity,
};

fn strip_ansi(text: &str) -> String {
    let mut plain = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            plain.push(c);
        }
    }
    plain
}

mod parsing {
    use super::*;

    #[test]
    fn play_accepts_overrides() {
        let cli = Cli::try_parse_from(["madesk", "play", "--server", "ma.local:8095", "-o", "usb-dac"])
            .unwrap();
        assert_eq!(
            cli.command,
            Commands::Play {
                server: Some("ma.local:8095".to_string()),
                output: Some("usb-dac".to_string()),
            }
        );
    }

    #[test]
    fn control_options_are_global() {
        let cli = Cli::try_parse_from(["madesk", "control", "next", "--player", "kitchen"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Control {
                action: ControlAction::Next,
                player: Some("kitchen".to_string()),
                server: None,
            }
        );
    }

    #[test]
    fn seek_keeps_raw_position() {
        let cli = Cli::try_parse_from(["madesk", "control", "seek", "1:30"]).unwrap();
        let Commands::Control { action, .. } = cli.command else {
            panic!("expected control command");
        };
        assert_eq!(
            action,
            ControlAction::Seek {
                position: "1:30".to_string()
            }
        );
    }

    #[test]
    fn volume_is_bounded() {
        assert!(Cli::try_parse_from(["madesk", "control", "volume", "100"]).is_ok());
        assert!(Cli::try_parse_from(["madesk", "control", "volume", "101"]).is_err());
        assert!(Cli::try_parse_from(["madesk", "control", "volume", "-1"]).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["madesk", "dance"]).is_err());
        assert!(Cli::try_parse_from(["madesk"]).is_err());
    }
}

mod positions {
    use super::*;

    #[test]
    fn accepts_plain_seconds() {
        assert_eq!(parse_position("0").unwrap(), 0);
        assert_eq!(parse_position(" 215 ").unwrap(), 215);
    }

    #[test]
    fn accepts_clock_forms() {
        assert_eq!(parse_position("3:35").unwrap(), 215);
        assert_eq!(parse_position("0:05").unwrap(), 5);
        assert_eq!(parse_position("2:00:00").unwrap(), 7200);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(parse_position("1:60").is_err());
        assert!(parse_position("1:60:00").is_err());
    }

    #[test]
    fn rejects_garbage() {
        for value in ["", "abc", "-5", "1:2:3:4", "1::2"] {
            match parse_position(value) {
                Err(CliError::InvalidArgument { arg, .. }) => assert_eq!(arg, "position"),
                other => panic!("expected invalid argument for {value:?}, got {other:?}"),
            }
        }
    }
}

mod rendering {
    use super::*;

    #[test]
    fn rates_drop_trailing_zeros() {
        assert_eq!(format_rate(44100), "44.1 kHz");
        assert_eq!(format_rate(48000), "48 kHz");
        assert_eq!(format_rate(88200), "88.2 kHz");
        assert_eq!(format_rate(22050), "22.05 kHz");
    }

    #[test]
    fn output_lists_tags_and_formats() {
        let output = OutputDevice {
            id: "alsa_output.usb-dac".to_string(),
            name: "USB DAC".to_string(),
            supported_formats: vec![SupportedFormat::new(96000, 24)],
            is_usb: true,
            is_pipewire: true,
        };

        let text = strip_ansi(&format_output(&output));

        assert!(text.starts_with("USB DAC [usb, pipewire]"));
        assert!(text.contains("id: alsa_output.usb-dac"));
        assert!(text.contains("96 kHz/24-bit"));
    }

    #[test]
    fn untagged_output_has_no_brackets() {
        let output = OutputDevice {
            id: "hdmi".to_string(),
            name: "HDMI".to_string(),
            supported_formats: Vec::new(),
            is_usb: false,
            is_pipewire: false,
        };

        let text = strip_ansi(&format_output(&output));

        assert!(text.starts_with("HDMI\n"));
        assert!(text.contains("unknown"));
    }

    #[test]
    fn error_is_styled() {
        let text = format_error("boom");
        assert!(text.contains("boom"));
        assert!(text.starts_with(Colors::BOLD));
        assert!(text.ends_with(Colors::RESET));
    }
}

mod errors {
    use super::*;

    #[test]
    fn control_errors_keep_user_wording() {
        let err: CliError = ControlError::AuthenticationRequired.into();
        assert_eq!(
            err.to_string(),
            "Music Assistant error: Authentication required. Add an access token in Settings."
        );
    }

    #[test]
    fn not_configured_is_a_service_error() {
        let err: CliError = ControlError::NotConfigured.into();
        assert!(matches!(err, CliError::ServiceError { .. }));
        assert!(err.to_string().contains("Server URL not configured"));
    }
}

mod commands_output {
    use super::*;

    struct StaticProbe(Vec<ProbedDevice>);

    impl StaticProbe {
        fn with(devices: &[(&str, &str)]) -> Self {
            let devices = devices
                .iter()
                .map(|(id, name)| {
                    let mut metadata = DeviceMetadata {
                        display_name: (*name).to_string(),
                        device_class: "Audio/Sink".to_string(),
                        ..DeviceMetadata::default()
                    };
                    metadata
                        .properties
                        .insert("device.id".to_string(), PropValue::Text((*id).to_string()));
                    ProbedDevice {
                        metadata,
                        supported_formats: vec![SupportedFormat::new(48000, 16)],
                    }
                })
                .collect();
            Self(devices)
        }
    }

    impl DeviceProbe for StaticProbe {
        type Sink = ();

        fn sink_devices(&self) -> Result<Vec<ProbedDevice>, AudioError> {
            Ok(self.0.clone())
        }

        fn create_sink(&self, _output: &OutputDevice, _routing: &ResolvedRouting) -> Option<()> {
            Some(())
        }
    }

    fn player(id: &str, name: &str, provider: &str) -> Player {
        Player {
            player_id: id.to_string(),
            name: name.to_string(),
            display_name: None,
            available: true,
            enabled: true,
            provider: provider.to_string(),
            volume_level: Some(40),
        }
    }

    #[test]
    fn outputs_marks_preferred_device() {
        let registry = OutputRegistry::new(StaticProbe::with(&[("dac", "DAC"), ("hdmi", "HDMI")]));

        let settings = Settings {
            output_local_output_id: Some("hdmi".to_string()),
            ..Settings::default()
        };

        let text = strip_ansi(&commands::outputs::execute(&registry, &settings).unwrap());

        let marked: Vec<&str> = text.lines().filter(|line| line.starts_with('*')).collect();
        assert_eq!(marked, vec!["* HDMI"]);
        assert!(text.contains("id: dac"));
        assert!(text.ends_with("Equalizer: off"));
    }

    #[test]
    fn outputs_show_the_selected_preset() {
        let registry = OutputRegistry::new(StaticProbe::with(&[("dac", "DAC")]));
        let settings = Settings {
            eq_enabled: true,
            eq_selected_preset: Some("Loudness".to_string()),
            ..Settings::default()
        };

        let text = strip_ansi(&commands::outputs::execute(&registry, &settings).unwrap());

        assert_eq!(text.lines().last(), Some("Equalizer: on (preset: Loudness)"));
    }

    #[test]
    fn outputs_reports_empty_list() {
        let registry = OutputRegistry::new(StaticProbe::with(&[]));

        let text = commands::outputs::execute(&registry, &Settings::default()).unwrap();

        assert_eq!(text, "No local audio outputs found");
    }

    #[test]
    fn players_render_marks_selection() {
        let identity = ClientIdentity {
            client_id: "ma_gtk_abc".to_string(),
            name: "Music Assistant GTK (desk)".to_string(),
        };
        let players = vec![
            player("kitchen", "Kitchen", "airplay"),
            player("office", "Office", "snapcast"),
        ];
        let mut targets = OutputTargets::new(identity).with_preference(Some("office".to_string()), None);
        targets.populate(&players, &[]);

        let text = strip_ansi(&commands::players::render(&targets, &players));
        let selected: Vec<&str> = text.lines().filter(|line| line.starts_with('*')).collect();

        assert_eq!(selected.len(), 1);
        assert!(selected[0].contains("Office"));
        assert!(selected[0].contains("40%"));
    }

    #[test]
    fn players_render_without_rows() {
        let identity = ClientIdentity {
            client_id: "ma_gtk_abc".to_string(),
            name: "Music Assistant GTK (desk)".to_string(),
        };
        let targets = OutputTargets::new(identity);

        assert_eq!(commands::players::render(&targets, &[]), "No available players");
    }
}
