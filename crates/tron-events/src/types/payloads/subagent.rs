//! Subagent lifecycle event payloads.

use serde::{Deserialize, Serialize};

use super::TokenUsage;

/// Payload for `subagent.spawned` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentSpawnedPayload {
    /// Session ID of the spawned subagent.
    pub subagent_session_id: String,
    /// Task description given to the subagent.
    pub task: String,
    /// Model the subagent runs with.
    pub model: String,
    /// Maximum turns the subagent may take.
    pub max_turns: i64,
    /// Spawn depth (0 = top-level agent, 1 = first-level subagent, ...).
    pub spawn_depth: i64,
    /// Tool call ID that triggered the spawn.
    pub tool_call_id: String,
    /// Whether the parent blocks on the subagent's completion.
    pub blocking: bool,
    /// Working directory the subagent runs in.
    pub working_directory: String,
}

/// Payload for `subagent.status_update` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentStatusUpdatePayload {
    /// Session ID of the subagent.
    pub subagent_session_id: String,
    /// Current status (`"running"`, `"waiting"`, ...).
    pub status: String,
    /// Turns executed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns_executed: Option<i64>,
}

/// Payload for `subagent.completed` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentCompletedPayload {
    /// Session ID of the subagent.
    pub subagent_session_id: String,
    /// Total turns the subagent executed.
    pub total_turns: i64,
    /// Wall-clock duration in milliseconds.
    pub duration: i64,
    /// Full output text (may be truncated).
    pub full_output: String,
    /// Short result summary (always truncated).
    pub result_summary: String,
    /// Model the subagent ran with.
    pub model: String,
    /// Token usage accumulated by the subagent, if tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Payload for `subagent.failed` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentFailedPayload {
    /// Session ID of the subagent.
    pub subagent_session_id: String,
    /// Error message.
    pub error: String,
    /// Wall-clock duration in milliseconds before failing.
    pub duration: i64,
}
