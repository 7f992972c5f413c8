//! Hook lifecycle event payloads.

use serde::{Deserialize, Serialize};

/// Payload for `hook.triggered` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookTriggeredPayload {
    /// Hook type (`PreToolUse`, `PostToolUse`, `UserPromptSubmit`, `PreCompact`, ...).
    pub hook_type: String,
    /// Matcher pattern that selected this hook, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    /// Command that was invoked.
    pub command: String,
    /// Whether this hook ran blocking.
    pub blocking: bool,
}

/// Payload for `hook.completed` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookCompletedPayload {
    /// Hook type.
    pub hook_type: String,
    /// Command that was invoked.
    pub command: String,
    /// Resulting action (`continue`, `block`, `modify`).
    pub action: String,
    /// Block/modify reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Duration in milliseconds.
    pub duration: i64,
}

/// Payload for `hook.background_started` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookBackgroundStartedPayload {
    /// Hook type.
    pub hook_type: String,
    /// Command that was invoked.
    pub command: String,
}

/// Payload for `hook.background_completed` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookBackgroundCompletedPayload {
    /// Hook type.
    pub hook_type: String,
    /// Command that was invoked.
    pub command: String,
    /// Whether the background hook exited successfully.
    pub success: bool,
    /// Duration in milliseconds.
    pub duration: i64,
}
