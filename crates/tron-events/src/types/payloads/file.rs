//! File access event payloads: `file.read`, `file.write`, `file.edit`.

use serde::{Deserialize, Serialize};

/// Payload for `file.read` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReadPayload {
    /// Absolute path read.
    pub path: String,
    /// Number of lines read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<i64>,
    /// Whether the content was truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
}

/// Payload for `file.write` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileWritePayload {
    /// Absolute path written.
    pub path: String,
    /// Whether the file previously existed (overwrite vs. create).
    pub created: bool,
    /// Bytes written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_count: Option<i64>,
}

/// Payload for `file.edit` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEditPayload {
    /// Absolute path edited.
    pub path: String,
    /// Number of replacements applied.
    pub replacements: i64,
    /// Lines added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertions: Option<i64>,
    /// Lines removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<i64>,
}
