//! Memory ledger event payloads: `memory.ledger`, `memory.loaded`.

use serde::{Deserialize, Serialize};

/// Event range covered by a ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEventRange {
    /// First event ID in the covered range.
    pub first_event_id: String,
    /// Last event ID in the covered range.
    pub last_event_id: String,
}

/// Turn range covered by a ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTurnRange {
    /// First turn number in the covered range.
    pub first_turn: i64,
    /// Last turn number in the covered range.
    pub last_turn: i64,
}

/// A file touched by the work the ledger entry summarizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFileTouch {
    /// File path.
    pub path: String,
    /// Operation performed (`read`, `write`, `edit`).
    pub op: String,
    /// Why the file was touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

/// A decision recorded in a ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDecision {
    /// What was chosen.
    pub choice: String,
    /// Why it was chosen.
    pub reason: String,
}

/// Token cost recorded alongside a ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTokenCost {
    /// Input tokens consumed.
    pub input: i64,
    /// Output tokens produced.
    pub output: i64,
}

/// Payload for `memory.ledger` events.
///
/// Written by the memory manager after a successful ledger subagent call
/// (or the keyword-summarizer fallback); see `tron-context::ledger_writer`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLedgerPayload {
    /// Event range this entry summarizes.
    pub event_range: MemoryEventRange,
    /// Turn range this entry summarizes.
    pub turn_range: MemoryTurnRange,
    /// Human-readable title.
    pub title: String,
    /// Entry type (e.g. `feature`, `bugfix`, `refactor`).
    pub entry_type: String,
    /// Status recorded by the ledger subagent.
    pub status: String,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Original user input that prompted this work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Actions taken, in order.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Files touched during the summarized range.
    #[serde(default)]
    pub files: Vec<MemoryFileTouch>,
    /// Decisions made during the summarized range.
    #[serde(default)]
    pub decisions: Vec<MemoryDecision>,
    /// Lessons learned, if any.
    #[serde(default)]
    pub lessons: Vec<String>,
    /// Notable thinking-block insights.
    #[serde(default)]
    pub thinking_insights: Vec<String>,
    /// Token cost across the summarized range.
    pub token_cost: MemoryTokenCost,
    /// Model used while the summarized range was produced.
    pub model: String,
    /// Working directory at the time of writing.
    pub working_directory: String,
}

/// Payload for `memory.loaded` events.
///
/// Recorded when prior ledger entries are injected into a new session's
/// context at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLoadedPayload {
    /// IDs of the `memory.ledger` events loaded.
    pub source_event_ids: Vec<String>,
    /// Number of ledger entries injected.
    pub entry_count: i64,
    /// Approximate token count of the injected content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<i64>,
}
