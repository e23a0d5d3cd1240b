//! Unit tests for sendspin module
//!
//! Tests wire encoding and parsing, capability advertisement, identity and
//! the stream dispatcher lifecycle. No sockets are opened.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use serde_json::{Value, json};

use crate::services::{
    audio::{PcmFormat, SupportedFormat},
    sendspin::*,
};

fn text(kind: &str, payload: Value) -> String {
    json!({ "type": kind, "payload": payload }).to_string()
}

fn stream_start(codec: &str, rate: u32, depth: u16, channels: u16) -> ServerMessage {
    ServerMessage::StreamStart(Some(StreamFormat {
        codec: codec.to_string(),
        sample_rate: rate,
        channels,
        bit_depth: depth,
    }))
}

fn chunk(timestamp_us: i64, len: usize) -> AudioChunk {
    AudioChunk {
        timestamp_us,
        payload: vec![0; len],
    }
}

mod wire {
    use super::*;

    #[test]
    fn url_uses_fixed_port_and_path() {
        assert_eq!(
            sendspin_url("http://ma.local:8095").unwrap(),
            "ws://ma.local:8927/sendspin"
        );
        assert_eq!(
            sendspin_url("https://music.example.com/").unwrap(),
            "wss://music.example.com:8927/sendspin"
        );
    }

    #[test]
    fn url_rejects_garbage() {
        assert!(matches!(
            sendspin_url("http://bad host"),
            Err(SendspinError::InvalidUrl(_))
        ));
    }

    #[test]
    fn audio_frame_header_is_big_endian() {
        let mut frame = vec![4u8];
        frame.extend_from_slice(&(-1_234_567i64).to_be_bytes());
        frame.extend_from_slice(&[1, 2, 3, 4]);

        let chunk = AudioChunk::parse(&frame).unwrap();
        assert_eq!(chunk.timestamp_us, -1_234_567);
        assert_eq!(chunk.payload, vec![1, 2, 3, 4]);
        assert_eq!(chunk.encode(4), frame);
    }

    #[test]
    fn short_frames_are_rejected() {
        assert!(matches!(
            AudioChunk::parse(&[1, 0, 0]),
            Err(SendspinError::ShortFrame(3))
        ));
        assert!(AudioChunk::parse(&[0; 9]).unwrap().payload.is_empty());
    }

    #[test]
    fn websocket_endpoints_are_checked() {
        assert_eq!(
            endpoint_url(" ws://127.0.0.1:40123/sendspin ").unwrap(),
            "ws://127.0.0.1:40123/sendspin"
        );
        assert!(endpoint_url("http://127.0.0.1:8927/sendspin").is_err());
        assert!(endpoint_url("ws:///sendspin").is_err());
    }

    #[test]
    fn unknown_types_are_not_errors() {
        let message = ServerMessage::parse(&text("madesk/unknown", json!({}))).unwrap();
        assert_eq!(message, ServerMessage::Other("madesk/unknown".to_string()));
    }

    #[test]
    fn end_and_clear_need_no_payload() {
        let message = ServerMessage::parse(r#"{"type":"stream/end"}"#).unwrap();
        assert_eq!(message, ServerMessage::StreamEnd);
        let message = ServerMessage::parse(r#"{"type":"stream/clear"}"#).unwrap();
        assert_eq!(message, ServerMessage::StreamClear);
    }

    #[test]
    fn malformed_json_is_a_protocol_error() {
        assert!(matches!(
            ServerMessage::parse("{not json"),
            Err(SendspinError::Protocol(_))
        ));
        assert!(matches!(
            ServerMessage::parse(&text("stream/start", json!("nonsense"))),
            Err(SendspinError::Protocol(_))
        ));
    }

    #[test]
    fn time_replies_carry_all_timestamps() {
        let message = ServerMessage::parse(&text(
            "server/time",
            json!({
                "client_transmitted": 1_000,
                "server_received": 1_600,
                "server_transmitted": 1_650,
            }),
        ))
        .unwrap();

        assert_eq!(
            message,
            ServerMessage::Time(TimeSample {
                client_transmitted: 1_000,
                server_received: 1_600,
                server_transmitted: 1_650,
            })
        );
    }

    #[test]
    fn state_report_shape() {
        let value: Value = serde_json::from_str(&encode(&client_state(65, false)).unwrap()).unwrap();

        assert_eq!(value["type"], "client/state");
        let player = &value["payload"]["player"];
        assert_eq!(player["state"], "synchronized");
        assert_eq!(player["volume"], 65);
        assert_eq!(player["muted"], false);
    }

    #[test]
    fn time_request_is_stamped() {
        let before = now_micros();
        let value: Value = serde_json::from_str(&encode(&client_time(before)).unwrap()).unwrap();

        assert_eq!(value["type"], "client/time");
        assert_eq!(value["payload"]["client_transmitted"], before);
        assert!(before > 0);
    }

    #[test]
    fn hello_advertises_player_role_and_formats() {
        let identity = ClientIdentity {
            client_id: "ma_gtk_0123456789".to_string(),
            name: "Music Assistant GTK".to_string(),
        };
        let hello = client_hello(&identity, &[SupportedFormat::new(96000, 24)]);
        let value: Value = serde_json::from_str(&encode(&hello).unwrap()).unwrap();

        assert_eq!(value["type"], "client/hello");
        let payload = &value["payload"];
        assert_eq!(payload["client_id"], "ma_gtk_0123456789");
        assert_eq!(payload["supported_roles"], json!([PLAYER_ROLE]));

        let support = payload
            .as_object()
            .unwrap()
            .values()
            .find(|field| field.get("supported_formats").is_some())
            .unwrap();
        assert_eq!(support["buffer_capacity"], 524_288);
        assert_eq!(support["supported_commands"], json!(["volume", "mute"]));
        assert_eq!(
            support["supported_formats"],
            json!([{"codec": "pcm", "channels": 2, "sample_rate": 96000, "bit_depth": 24}])
        );
    }
}

mod advertisement {
    use super::*;

    fn formats(pairs: &[(u32, u16)]) -> Vec<SupportedFormat> {
        pairs.iter().copied().map(SupportedFormat::from).collect()
    }

    #[test]
    fn empty_set_falls_back_to_sixteen_bit() {
        let advertised = advertised_formats(&[]);
        let pairs: Vec<(u32, u16)> = advertised
            .iter()
            .map(|f| (u32::from(f.sample_rate), u16::from(f.bit_depth)))
            .collect();
        assert_eq!(pairs, vec![(48000, 16), (44100, 16)]);
        assert!(advertised.iter().all(|f| f.channels == 2));
    }

    #[test]
    fn duplicates_are_dropped_in_order() {
        let advertised = advertised_formats(&formats(&[(96000, 24), (44100, 16), (96000, 24)]));
        let pairs: Vec<(u32, u16)> = advertised
            .iter()
            .map(|f| (u32::from(f.sample_rate), u16::from(f.bit_depth)))
            .collect();
        assert_eq!(pairs, vec![(96000, 24), (44100, 16)]);
    }

    #[test]
    fn every_rate_gets_a_sixteen_bit_entry() {
        let result = formats_for_sendspin(&formats(&[(96000, 24), (44100, 16), (48000, 32)]));
        assert_eq!(
            result,
            formats(&[(96000, 24), (44100, 16), (48000, 32), (48000, 16), (96000, 16)])
        );
    }

    #[test]
    fn sixteen_bit_rates_are_untouched() {
        let input = formats(&[(44100, 16), (44100, 24)]);
        assert_eq!(formats_for_sendspin(&input), input);
        assert!(formats_for_sendspin(&[]).is_empty());
    }
}

mod identity {
    use super::*;

    #[test]
    fn generated_ids_have_prefix_and_ten_hex_chars() {
        let id = generate_client_id();
        let suffix = id.strip_prefix("ma_gtk_").unwrap();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_client_id());
    }

    #[test]
    fn blank_id_is_replaced() {
        assert!(ClientIdentity::new("  ").client_id.starts_with("ma_gtk_"));
        assert_eq!(ClientIdentity::new(" ma_gtk_abc ").client_id, "ma_gtk_abc");
    }

    #[test]
    fn name_mentions_host_when_known() {
        assert_eq!(
            client_name_for("studio"),
            "Music Assistant GTK (studio)"
        );
        assert_eq!(client_name_for(""), "Music Assistant GTK");
    }
}

mod dispatcher {
    use super::*;

    fn cd() -> PcmFormat {
        PcmFormat::new(44100, 16, 2).unwrap()
    }

    #[test]
    fn session_lifecycle_emits_start_chunks_end() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();
        let mut events = Vec::new();

        events.extend(dispatcher.dispatch(stream_start("pcm", 44100, 16, 2), &state).event);
        for timestamp in [0, 1000, 2000] {
            events.extend(dispatcher.audio(chunk(timestamp, 4096), &state));
        }
        events.extend(dispatcher.dispatch(ServerMessage::StreamEnd, &state).event);

        assert_eq!(events.len(), 5);
        assert_eq!(events[0], ReceiverEvent::StreamStart(cd()));
        assert!(matches!(
            events[2],
            ReceiverEvent::AudioChunk { timestamp_us: 1000, format, .. } if format == cd()
        ));
        assert_eq!(events[4], ReceiverEvent::StreamEnd);
        assert!(!state.is_streaming());
    }

    #[test]
    fn audio_outside_a_stream_is_ignored() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();

        assert!(dispatcher.audio(chunk(0, 4096), &state).is_none());

        dispatcher.dispatch(stream_start("pcm", 44100, 16, 2), &state);
        dispatcher.dispatch(ServerMessage::StreamEnd, &state);
        assert!(dispatcher.audio(chunk(0, 4096), &state).is_none());
    }

    #[test]
    fn unsupported_codec_starts_nothing() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();

        let dispatch = dispatcher.dispatch(stream_start("flac", 44100, 16, 2), &state);

        assert_eq!(dispatch, Dispatch::default());
        assert!(!state.is_streaming());
    }

    #[test]
    fn zero_format_fields_start_nothing() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();

        for message in [
            stream_start("pcm", 0, 16, 2),
            stream_start("pcm", 44100, 0, 2),
            stream_start("pcm", 44100, 16, 0),
        ] {
            assert!(dispatcher.dispatch(message, &state).event.is_none());
        }
        assert!(!state.is_streaming());
    }

    #[test]
    fn clear_keeps_the_stream() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();
        dispatcher.dispatch(stream_start("pcm", 44100, 16, 2), &state);

        let dispatch = dispatcher.dispatch(ServerMessage::StreamClear, &state);

        assert_eq!(dispatch.event, Some(ReceiverEvent::StreamClear));
        assert!(state.is_streaming());
        assert!(dispatcher.audio(chunk(0, 4096), &state).is_some());
    }

    #[test]
    fn commands_update_soft_state_and_acknowledge() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();
        let command = |payload: Value| {
            ServerMessage::parse(&text("server/command", json!({ "player": payload }))).unwrap()
        };

        let dispatch = dispatcher.dispatch(command(json!({"command": "volume", "volume": 140})), &state);
        assert_eq!(dispatch.event, Some(ReceiverEvent::VolumeChanged(100)));
        assert!(dispatch.acknowledge);
        assert_eq!(state.volume.get(), 1.0);

        let dispatch = dispatcher.dispatch(command(json!({"command": "mute", "mute": true})), &state);
        assert_eq!(dispatch.event, Some(ReceiverEvent::MuteChanged(true)));
        assert!(state.muted.get());

        let dispatch = dispatcher.dispatch(
            ServerMessage::Command(Some(PlayerCommand {
                command: "volume".to_string(),
                volume: None,
                mute: None,
            })),
            &state,
        );
        assert_eq!(dispatch.event, None);
        assert!(dispatch.acknowledge);
    }

    #[test]
    fn reset_ends_the_stream() {
        let state = ReceiverState::new(0.65);
        let mut dispatcher = StreamDispatcher::new();
        dispatcher.dispatch(stream_start("pcm", 48000, 24, 2), &state);
        dispatcher.audio(chunk(0, 12), &state);

        dispatcher.reset(&state);

        assert!(!state.is_streaming());
        assert_eq!(dispatcher.chunks(), 0);
        assert!(dispatcher.audio(chunk(0, 12), &state).is_none());
    }

    #[test]
    fn volume_percent_rounds() {
        let state = ReceiverState::new(0.656);
        assert_eq!(state.volume_percent(), 66);
        assert_eq!(ReceiverState::new(f64::NAN).volume_percent(), 0);
    }
}
