//! Property-based tests for wire message decoding.
//!
//! Inbound text is untrusted: decoding must reject garbage with an error and
//! never panic, and well-formed messages must keep their field values.

use proptest::prelude::*;
use serde_json::json;
use tandem_proto::{
    ClientMessage, ParticipantId, ParticipantSummary, ProtocolError, ServerMessage, SessionId,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: arbitrary text never panics the decoder
    #[test]
    fn prop_decode_never_panics(text in ".{0,256}") {
        let _ = ClientMessage::decode(&text);
    }

    /// Property: the size bound is enforced regardless of content
    #[test]
    fn prop_size_bound_enforced(text in ".{1,128}", max in 0usize..64) {
        match ClientMessage::decode_bounded(&text, max) {
            Err(ProtocolError::TooLarge { size, .. }) => prop_assert!(size > max),
            _ => prop_assert!(text.len() <= max),
        }
    }

    /// Property: any display name survives the JSON round trip byte for byte
    #[test]
    fn prop_display_name_preserved(name in "\\PC{0,40}") {
        let msg = ClientMessage::Join { display_name: name.clone() };
        let decoded = ClientMessage::decode(&msg.encode()?)?;
        prop_assert_eq!(decoded, ClientMessage::Join { display_name: name });
    }
}

#[test]
fn session_start_wire_shape() {
    let msg = ServerMessage::SessionStart {
        session_id: SessionId(1),
        opponent: ParticipantSummary { id: ParticipantId(2), display_name: "bo".to_string() },
        first_actor: ParticipantId(1),
        round_state: json!({"total": 0}),
        turn_budget: 3,
    };

    let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "sessionStart",
            "sessionId": 1,
            "opponent": {"id": 2, "displayName": "bo"},
            "firstActor": 1,
            "roundState": {"total": 0},
            "turnBudget": 3,
        })
    );
}

#[test]
fn invite_uses_camel_case_target() {
    let msg = ClientMessage::decode(r#"{"type":"invite","targetParticipantId":9}"#).unwrap();
    assert_eq!(msg, ClientMessage::Invite { target_participant_id: ParticipantId(9) });
}

#[test]
fn missing_required_field_is_malformed() {
    let result = ClientMessage::decode(r#"{"type":"action","sessionId":1}"#);
    assert!(matches!(result, Err(ProtocolError::Malformed(_))));
}
