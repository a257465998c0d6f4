//! Property-based serialization and validation tests.
//!
//! Uses proptest to verify:
//! 1. Any `ClientEvent` survives an encode → decode round-trip.
//! 2. Any `ServerEvent` survives an encode → decode round-trip.
//! 3. Random bytes never cause a panic in decode (returns `Err` gracefully).
//! 4. Room id validation accepts exactly the `[A-Za-z0-9_.-]{1,64}` pattern.

use proptest::prelude::*;
use roomcast_proto::event::{self, ClientEvent, ServerEvent};
use roomcast_proto::room::{MAX_ROOM_ID_LEN, RoomId};
use roomcast_proto::session::SessionId;
use uuid::Uuid;

// --- Strategies for protocol types ---

/// Strategy for generating syntactically valid room identifiers.
fn arb_room() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,64}"
}

/// Strategy for generating arbitrary opaque payloads.
fn arb_payload() -> impl Strategy<Value = String> {
    ".{0,512}"
}

/// Strategy for generating arbitrary `SessionId` values.
fn arb_session_id() -> impl Strategy<Value = SessionId> {
    any::<u128>().prop_map(|n| SessionId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating arbitrary `ClientEvent` values.
fn arb_client_event() -> impl Strategy<Value = ClientEvent> {
    prop_oneof![
        arb_room().prop_map(|room| ClientEvent::Join { room }),
        arb_payload().prop_map(|payload| ClientEvent::Message { payload }),
    ]
}

/// Strategy for generating arbitrary `ServerEvent` values.
fn arb_server_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        arb_session_id().prop_map(|session_id| ServerEvent::Welcome { session_id }),
        arb_room().prop_map(|room| ServerEvent::Joined { room }),
        arb_payload().prop_map(|payload| ServerEvent::Message { payload }),
        arb_payload().prop_map(|reason| ServerEvent::Error { reason }),
    ]
}

proptest! {
    #[test]
    fn client_event_round_trips(event in arb_client_event()) {
        let bytes = event::encode_client(&event).unwrap();
        let decoded = event::decode_client(&bytes).unwrap();
        prop_assert_eq!(event, decoded);
    }

    #[test]
    fn server_event_round_trips(event in arb_server_event()) {
        let bytes = event::encode_server(&event).unwrap();
        let decoded = event::decode_server(&bytes).unwrap();
        prop_assert_eq!(event, decoded);
    }

    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        // Either outcome is fine; what matters is no panic.
        let _ = event::decode_client(&bytes);
        let _ = event::decode_server(&bytes);
    }

    #[test]
    fn valid_room_ids_parse(room in arb_room()) {
        let parsed = RoomId::parse(&room).unwrap();
        prop_assert_eq!(parsed.as_str(), room.as_str());
    }

    #[test]
    fn invalid_characters_rejected(
        prefix in "[A-Za-z0-9_.-]{0,10}",
        bad in "[^A-Za-z0-9_.-]",
        suffix in "[A-Za-z0-9_.-]{0,10}",
    ) {
        let candidate = format!("{prefix}{bad}{suffix}");
        prop_assert!(RoomId::parse(&candidate).is_err());
    }

    #[test]
    fn overlong_room_ids_rejected(extra in 1usize..64) {
        let candidate = "a".repeat(MAX_ROOM_ID_LEN + extra);
        prop_assert!(RoomId::parse(&candidate).is_err());
    }
}
