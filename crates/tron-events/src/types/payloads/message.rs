//! Message event payloads: `message.user`, `message.assistant`, `message.system`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TokenUsage;

/// Payload for `message.user` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessagePayload {
    /// Message content — a string or an array of content blocks.
    pub content: Value,
    /// Token usage recorded alongside this message, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Payload for `message.assistant` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessagePayload {
    /// Message content — an array of content blocks (text, thinking, tool_use).
    pub content: Value,
    /// Turn number this message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<i64>,
    /// Model that produced this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider stop reason (`end_turn`, `tool_use`, `max_tokens`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Token usage for this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Payload for `message.system` events (injected reminders, rule text, etc).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMessagePayload {
    /// Injected text content.
    pub content: String,
    /// Source of the injected message (e.g. `"rules"`, `"hook"`, `"compaction"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
