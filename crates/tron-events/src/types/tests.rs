//! Integration tests for [`SessionEvent::typed_payload`] dispatch.

use serde_json::json;

use super::base::{SessionEvent, SessionEventPayload};
use super::event_type::EventType;

fn event(event_type: EventType, payload: serde_json::Value) -> SessionEvent {
    SessionEvent {
        id: "evt_1".to_string(),
        parent_id: None,
        session_id: "sess_1".to_string(),
        workspace_id: "ws_1".to_string(),
        timestamp: "2025-01-01T00:00:00Z".to_string(),
        event_type,
        sequence: 1,
        checksum: None,
        payload,
    }
}

#[test]
fn typed_payload_session_start() {
    let evt = event(
        EventType::SessionStart,
        json!({"workingDirectory": "/tmp", "model": "claude-opus-4-6"}),
    );
    match evt.typed_payload().unwrap() {
        SessionEventPayload::SessionStart(p) => {
            assert_eq!(p.working_directory, "/tmp");
            assert_eq!(p.model, "claude-opus-4-6");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn typed_payload_message_deleted() {
    let evt = event(
        EventType::MessageDeleted,
        json!({"targetEventId": "evt_0", "reason": "edited"}),
    );
    match evt.typed_payload().unwrap() {
        SessionEventPayload::MessageDeleted(p) => {
            assert_eq!(p.target_event_id, "evt_0");
            assert_eq!(p.reason.as_deref(), Some("edited"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn typed_payload_memory_loaded() {
    let evt = event(
        EventType::MemoryLoaded,
        json!({"sourceEventIds": ["evt_a", "evt_b"], "entryCount": 2, "tokenCount": 128}),
    );
    match evt.typed_payload().unwrap() {
        SessionEventPayload::MemoryLoaded(p) => {
            assert_eq!(p.entry_count, 2);
            assert_eq!(p.token_count, Some(128));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn typed_payload_rejects_malformed_json() {
    let evt = event(EventType::SessionStart, json!({"model": 42}));
    assert!(evt.typed_payload().is_err());
}
