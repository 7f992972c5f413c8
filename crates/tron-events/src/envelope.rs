//! WebSocket event broadcasting types.
//!
//! [`BroadcastEventType`] enumerates all event types that can be pushed to
//! connected clients over WebSocket. [`EventEnvelope`] wraps an event with
//! metadata for transport.
//!
//! These types match the TypeScript wire format exactly — iOS and chat-web
//! depend on the string values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types broadcast to WebSocket clients.
///
/// Each variant serializes to a dot-separated string matching the TypeScript
/// `BroadcastEventType` constant object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BroadcastEventType {
    // ── Session ──────────────────────────────────────────────────────
    /// A new session was created.
    #[serde(rename = "session.created")]
    SessionCreated,
    /// A session ended.
    #[serde(rename = "session.ended")]
    SessionEnded,
    /// A session was forked from another.
    #[serde(rename = "session.forked")]
    SessionForked,
    /// A session was rewound to an earlier state.
    #[serde(rename = "session.rewound")]
    SessionRewound,

    // ── Agent ────────────────────────────────────────────────────────
    /// A complete agent turn (request → response → tool results).
    #[serde(rename = "agent.turn")]
    AgentTurn,
    /// A message was deleted from the session.
    #[serde(rename = "agent.message_deleted")]
    AgentMessageDeleted,
    /// Context was cleared for the session.
    #[serde(rename = "agent.context_cleared")]
    AgentContextCleared,
    /// Context compaction completed.
    #[serde(rename = "agent.compaction")]
    AgentCompaction,
    /// Memory ledger update in progress.
    #[serde(rename = "agent.memory_updating")]
    AgentMemoryUpdating,
    /// Memory ledger update completed.
    #[serde(rename = "agent.memory_updated")]
    AgentMemoryUpdated,
    /// A skill was removed from the session.
    #[serde(rename = "agent.skill_removed")]
    AgentSkillRemoved,
    /// The todo list was updated.
    #[serde(rename = "agent.todos_updated")]
    AgentTodosUpdated,

    // ── Task ─────────────────────────────────────────────────────────
    /// A task was created.
    #[serde(rename = "task.created")]
    TaskCreated,
    /// A task was updated.
    #[serde(rename = "task.updated")]
    TaskUpdated,
    /// A task was deleted.
    #[serde(rename = "task.deleted")]
    TaskDeleted,

    // ── Project ──────────────────────────────────────────────────────
    /// A project was created.
    #[serde(rename = "project.created")]
    ProjectCreated,
    /// A project was updated.
    #[serde(rename = "project.updated")]
    ProjectUpdated,
    /// A project was deleted.
    #[serde(rename = "project.deleted")]
    ProjectDeleted,

    // ── Area ─────────────────────────────────────────────────────────
    /// An area was created.
    #[serde(rename = "area.created")]
    AreaCreated,
    /// An area was updated.
    #[serde(rename = "area.updated")]
    AreaUpdated,
    /// An area was deleted.
    #[serde(rename = "area.deleted")]
    AreaDeleted,

    // ── Browser ──────────────────────────────────────────────────────
    /// A browser frame (screenshot) is available.
    #[serde(rename = "browser.frame")]
    BrowserFrame,
    /// The browser was closed.
    #[serde(rename = "browser.closed")]
    BrowserClosed,

    // ── Event store ──────────────────────────────────────────────────
    /// A new event was persisted to the store.
    #[serde(rename = "event.new")]
    EventNew,
}

/// All broadcast event type variants, for exhaustive testing.
pub const ALL_BROADCAST_EVENT_TYPES: &[BroadcastEventType] = &[
    BroadcastEventType::SessionCreated,
    BroadcastEventType::SessionEnded,
    BroadcastEventType::SessionForked,
    BroadcastEventType::SessionRewound,
    BroadcastEventType::AgentTurn,
    BroadcastEventType::AgentMessageDeleted,
    BroadcastEventType::AgentContextCleared,
    BroadcastEventType::AgentCompaction,
    BroadcastEventType::AgentMemoryUpdating,
    BroadcastEventType::AgentMemoryUpdated,
    BroadcastEventType::AgentSkillRemoved,
    BroadcastEventType::AgentTodosUpdated,
    BroadcastEventType::TaskCreated,
    BroadcastEventType::TaskUpdated,
    BroadcastEventType::TaskDeleted,
    BroadcastEventType::ProjectCreated,
    BroadcastEventType::ProjectUpdated,
    BroadcastEventType::ProjectDeleted,
    BroadcastEventType::AreaCreated,
    BroadcastEventType::AreaUpdated,
    BroadcastEventType::AreaDeleted,
    BroadcastEventType::BrowserFrame,
    BroadcastEventType::BrowserClosed,
    BroadcastEventType::EventNew,
];

/// Envelope wrapping an event for WebSocket broadcast.
///
/// Matches the TypeScript `EventEnvelope` interface exactly:
/// ```json
/// { "type": "event.new", "sessionId": "sess_...", "timestamp": "2025-...", "data": {...} }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Broadcast event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Associated session ID (absent for system-wide events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Event payload — shape varies by event type.
    pub data: Value,
}

/// Create an [`EventEnvelope`] with automatic timestamp and session ID extraction.
///
/// If `session_id` is `None`, the function attempts to extract it from
/// `data["sessionId"]`. If `data` contains a `"timestamp"` field, it is
/// preserved; otherwise the current UTC time is used.
pub fn create_event_envelope(
    event_type: &str,
    data: Value,
    session_id: Option<&str>,
) -> EventEnvelope {
    let resolved_session_id = session_id
        .map(String::from)
        .or_else(|| data.get("sessionId").and_then(|v| v.as_str()).map(String::from));

    let timestamp = data
        .get("timestamp")
        .and_then(|v| v.as_str())
        .map_or_else(|| chrono::Utc::now().to_rfc3339(), String::from);

    EventEnvelope {
        event_type: event_type.to_string(),
        session_id: resolved_session_id,
        timestamp,
        data,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
