//! Session lifecycle event payloads: `session.start`, `session.end`, `session.fork`.

use serde::{Deserialize, Serialize};

/// Payload for `session.start` events — the root event of every session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    /// Working directory the session was started in.
    pub working_directory: String,
    /// Model in effect at session start.
    pub model: String,
    /// System prompt in effect, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Payload for `session.end` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndPayload {
    /// Why the session ended (`"user"`, `"idle_timeout"`, `"error"`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload for `session.fork` events — the root event of a forked session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForkPayload {
    /// Session the fork was branched from.
    pub source_session_id: String,
    /// Event the fork branched at.
    pub source_event_id: String,
}
