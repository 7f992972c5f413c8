//! Projected session state — the output of replaying an event tree.
//!
//! These types are the *read model*: they never get persisted themselves,
//! they're reconstructed from [`super::base::SessionEvent`] rows by
//! [`crate::reconstruct`] and [`crate::store::EventStore::get_state_at_head`].

use serde::{Deserialize, Serialize};

use super::payloads::TokenUsage;

/// A single projected chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// `"user"`, `"assistant"`, or `"toolResult"`.
    pub role: String,
    /// Message content — a string or an array of content blocks.
    pub content: serde_json::Value,
    /// Tool call this message answers, for `toolResult` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Whether a `toolResult` message represents a tool error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// A projected message paired with the event(s) it was built from.
///
/// Most messages map to exactly one source event; a merged turn (e.g. several
/// `tool.result` events folded into one `toolResult` message) carries more
/// than one id, and a synthetic message (nothing survived replay) carries
/// `[None]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithEventId {
    /// The projected message.
    pub message: Message,
    /// Source event ids, in the order they were merged.
    pub event_ids: Vec<Option<String>>,
}

/// Full reconstructed state of a session at its current head.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Model in effect at the head of the session.
    pub model: String,
    /// Working directory the session was started/forked into.
    pub working_directory: String,
    /// System prompt in effect, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Aggregate token usage across the whole ancestor chain.
    pub token_usage: TokenUsage,
    /// Number of completed turns.
    pub turn_count: i64,
    /// Whether `session.end` has been observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ended: Option<bool>,
    /// Projected messages, in replay order.
    pub messages_with_event_ids: Vec<MessageWithEventId>,
}

/// Lightweight session listing row (no message bodies).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session id.
    pub id: String,
    /// Workspace this session belongs to.
    pub workspace_id: String,
    /// Session title, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Latest model used in the session.
    pub latest_model: String,
    /// Number of events appended so far.
    pub event_count: i64,
    /// Number of completed turns.
    pub turn_count: i64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last activity timestamp (RFC 3339).
    pub last_activity_at: String,
    /// End timestamp, `None` if still active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

/// Session identity + lifecycle metadata, without token/message detail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Session id.
    pub id: String,
    /// Workspace this session belongs to.
    pub workspace_id: String,
    /// Parent session id, if this session was forked or spawned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    /// Event this session was forked from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork_from_event_id: Option<String>,
    /// Whether the session has ended.
    pub is_ended: bool,
}

/// A workspace — a unique working directory tracked across sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Workspace id.
    pub id: String,
    /// Absolute path.
    pub path: String,
    /// Display name, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Number of sessions rooted in this workspace.
    pub session_count: i64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last activity timestamp (RFC 3339).
    pub last_activity_at: String,
}

/// A named branch (bookmark) within a session's event tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Branch id.
    pub id: String,
    /// Session this branch belongs to.
    pub session_id: String,
    /// Branch name, unique within its session.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Root event id for this branch.
    pub root_event_id: String,
    /// Head event id for this branch.
    pub head_event_id: String,
    /// Whether this is the session's default branch.
    pub is_default: bool,
}

/// A lightweight reference to a branch, for listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    /// Branch id.
    pub id: String,
    /// Branch name.
    pub name: String,
    /// Head event id.
    pub head_event_id: String,
}

/// A lightweight reference to the session a fork originated from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkRef {
    /// Id of the session the fork was created from.
    pub source_session_id: String,
    /// Event the fork branched off at.
    pub source_event_id: String,
}

/// A single full-text search hit against the event index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Matching event id.
    pub event_id: String,
    /// Session the matching event belongs to.
    pub session_id: String,
    /// Event type of the match.
    pub event_type: String,
    /// Snippet of matching content, with `<b>`-wrapped matches.
    pub snippet: String,
    /// BM25 relevance rank (lower is more relevant).
    pub rank: f64,
    /// Timestamp of the matching event (RFC 3339).
    pub timestamp: String,
}
