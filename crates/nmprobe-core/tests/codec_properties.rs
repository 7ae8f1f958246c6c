//! Codec properties over the whole command vocabulary.

use nmprobe_core::protocol::frame::{encode_message, LENGTH_PREFIX_LEN};
use nmprobe_core::{decode, encode, encode_all, Command, CommandKind, TruncationReason};
use serde_json::json;

fn vocabulary() -> Vec<Command> {
    vec![
        Command::check_availability("001"),
        Command::get_completion("002", "Hello, how are you?", 0.7),
        Command::get_completion_stream("003", "Count to 3", 0.7),
        Command::start_playground_session("004"),
        Command::send_playground_message("005", "session-1", "Hi there"),
        Command::end_playground_session("006", "session-1"),
        Command::new("007", CommandKind::GetCompletion).with_payload(json!({"prompt": "π ≈ 3.14159 🎲"})),
        Command::new("", CommandKind::CheckAvailability),
    ]
}

fn reason_kind(reason: &TruncationReason) -> &'static str {
    match reason {
        TruncationReason::InvalidUtf8(_) => "invalidUtf8",
        TruncationReason::InvalidJson(_) => "invalidJson",
        TruncationReason::NotAnObject => "notAnObject",
    }
}

#[test]
fn test_round_trip_preserves_every_command() {
    for command in vocabulary() {
        let bytes = encode(&command).expect("encode");
        let decoded = decode(&bytes);

        assert_eq!(decoded.responses.len(), 1, "{}", command.command);
        assert_eq!(decoded.cursor, bytes.len());
        assert!(decoded.truncation.is_none());
        assert_eq!(
            decoded.responses[0].raw,
            serde_json::to_value(&command).expect("to_value")
        );
    }
}

#[test]
fn test_length_prefix_counts_utf8_bytes() {
    let command = Command::get_completion("1", "naïve café ☕", 0.7);
    let bytes = encode(&command).expect("encode");
    let body_len = serde_json::to_vec(&command).expect("to_vec").len();

    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(&bytes[..LENGTH_PREFIX_LEN]);
    assert_eq!(u32::from_le_bytes(prefix) as usize, body_len);
    assert_eq!(bytes.len(), LENGTH_PREFIX_LEN + body_len);
}

#[test]
fn test_every_strict_prefix_decodes_nothing() {
    for command in vocabulary() {
        let bytes = encode(&command).expect("encode");
        for k in 0..bytes.len() {
            let decoded = decode(&bytes[..k]);
            assert!(decoded.responses.is_empty(), "k={} for {}", k, command.command);
            assert_eq!(decoded.cursor, 0);
            assert!(decoded.truncation.is_none());
        }
    }
}

#[test]
fn test_prefix_of_stream_yields_only_complete_frames() {
    let commands = vocabulary();
    let stream = encode_all(&commands).expect("encode_all");

    let mut boundaries = vec![0usize];
    for command in &commands {
        let last = *boundaries.last().unwrap_or(&0);
        boundaries.push(last + encode(command).expect("encode").len());
    }

    for k in 0..=stream.len() {
        let complete = boundaries.iter().filter(|&&b| b > 0 && b <= k).count();
        let decoded = decode(&stream[..k]);
        assert_eq!(decoded.responses.len(), complete, "k={}", k);
        assert_eq!(decoded.cursor, boundaries[complete]);
        assert_eq!(decoded.trailing_bytes(k), k - boundaries[complete]);
    }
}

#[test]
fn test_malformed_frame_is_contained() {
    let good = encode(&Command::check_availability("1")).expect("encode");

    let cases: Vec<(Vec<u8>, &str)> = vec![
        (b"{not json".to_vec(), "invalidJson"),
        (vec![0xc3, 0x28], "invalidUtf8"),
        (b"[1,2,3]".to_vec(), "notAnObject"),
        (b"\"hi\"".to_vec(), "notAnObject"),
        (Vec::new(), "invalidJson"),
    ];

    for (body, expected) in cases {
        let mut stream = good.clone();
        stream.extend_from_slice(&(body.len() as u32).to_le_bytes());
        stream.extend_from_slice(&body);
        stream.extend_from_slice(&good);

        let decoded = decode(&stream);
        assert_eq!(decoded.responses.len(), 1, "body {:?}", body);
        assert_eq!(decoded.cursor, good.len());

        let truncation = decoded.truncation.expect("truncation recorded");
        assert_eq!(truncation.offset, good.len());
        assert_eq!(reason_kind(&truncation.reason), expected, "body {:?}", body);
    }
}

#[test]
fn test_host_side_messages_decode_as_responses() {
    let replies = [
        json!({"requestId": "1", "type": "availabilityResponse", "payload": {"available": true, "reason": "Ready"}}),
        json!({"requestId": "2", "type": "streamChunk", "payload": {"token": "one"}}),
        json!({"requestId": "2", "type": "streamEnd", "payload": {}}),
        json!({"type": "error", "payload": {"message": "Invalid JSON message", "code": "native_error"}}),
    ];
    let stream: Vec<u8> = replies
        .iter()
        .flat_map(|r| encode_message(r).expect("encode"))
        .collect();

    let decoded = decode(&stream);
    assert_eq!(decoded.responses.len(), 4);
    assert!(decoded.responses[0].available());
    assert_eq!(decoded.responses[1].token(), Some("one"));
    assert_eq!(decoded.responses[3].request_id_or_na(), "N/A");
    assert_eq!(decoded.responses[3].error_code(), Some("native_error"));
}
