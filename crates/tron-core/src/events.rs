//! Event types for agent operation.
//!
//! Two event families:
//!
//! - **[`StreamEvent`]**: Low-level LLM streaming events from a provider
//!   (text deltas, thinking deltas, tool call construction, done/error).
//! - **[`TronEvent`]**: High-level agent lifecycle events with session context
//!   (agent start/end, turn boundaries, tool execution, hooks, compaction).
//!
//! `StreamEvent` is purely in-memory (never persisted). `TronEvent` is
//! broadcast over WebSocket and may be recorded as session events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::{ToolCall, TokenUsage};
use crate::tools::TronToolResult;

// ─────────────────────────────────────────────────────────────────────────────
// StreamEvent — LLM provider streaming events
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted during LLM response streaming.
///
/// These are transient (never persisted) and drive real-time UI updates
/// as the model generates content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Stream started.
    #[serde(rename = "start")]
    Start,

    /// Text block started.
    #[serde(rename = "text_start")]
    TextStart,

    /// Incremental text content.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Text fragment.
        delta: String,
    },

    /// Text block completed.
    #[serde(rename = "text_end")]
    TextEnd {
        /// Full accumulated text.
        text: String,
        /// Verification signature.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Thinking block started (extended thinking).
    #[serde(rename = "thinking_start")]
    ThinkingStart,

    /// Incremental thinking content.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// Thinking text fragment.
        delta: String,
    },

    /// Thinking block completed.
    #[serde(rename = "thinking_end")]
    ThinkingEnd {
        /// Full thinking text.
        thinking: String,
        /// Verification signature.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Tool call started.
    #[serde(rename = "toolcall_start")]
    ToolCallStart {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        name: String,
    },

    /// Incremental tool call argument JSON.
    #[serde(rename = "toolcall_delta")]
    ToolCallDelta {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Partial JSON arguments.
        #[serde(rename = "argumentsDelta")]
        arguments_delta: String,
    },

    /// Tool call fully constructed.
    #[serde(rename = "toolcall_end")]
    ToolCallEnd {
        /// Complete tool call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },

    /// Stream completed successfully.
    #[serde(rename = "done")]
    Done {
        /// Full assistant message.
        message: AssistantMessage,
        /// Stop reason from LLM.
        #[serde(rename = "stopReason")]
        stop_reason: String,
    },

    /// Stream error.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        error: String,
    },

    /// Retryable error — a retry is about to happen.
    #[serde(rename = "retry")]
    Retry {
        /// Current attempt (1-based).
        attempt: u32,
        /// Maximum retries configured.
        #[serde(rename = "maxRetries")]
        max_retries: u32,
        /// Delay before next retry in ms.
        #[serde(rename = "delayMs")]
        delay_ms: u64,
        /// Error info.
        error: RetryErrorInfo,
    },

    /// Safety block (Gemini provider).
    #[serde(rename = "safety_block")]
    SafetyBlock {
        /// Categories that triggered the block.
        #[serde(rename = "blockedCategories")]
        blocked_categories: Vec<String>,
        /// Error message.
        error: String,
    },
}

/// Error info attached to a [`StreamEvent::Retry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryErrorInfo {
    /// Error category string.
    pub category: String,
    /// Human-readable message.
    pub message: String,
    /// Whether retryable.
    #[serde(rename = "isRetryable")]
    pub is_retryable: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// TronEvent — agent lifecycle events
// ─────────────────────────────────────────────────────────────────────────────

/// Common fields for all agent events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Token usage reported in turn-end events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnTokenUsage {
    /// Input tokens.
    pub input_tokens: u64,
    /// Output tokens.
    pub output_tokens: u64,
    /// Tokens read from prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
}

/// Extended token usage for response-complete events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTokenUsage {
    /// Input tokens.
    pub input_tokens: u64,
    /// Output tokens.
    pub output_tokens: u64,
    /// Tokens read from prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
    /// 5-minute cache creation tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_5m_tokens: Option<u64>,
    /// 1-hour cache creation tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_1h_tokens: Option<u64>,
}

/// Tool call summary in a batch event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    /// Tool call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    pub arguments: serde_json::Map<String, Value>,
}

/// Hook completion result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookResult {
    /// Hook allowed the operation to continue.
    Continue,
    /// Hook blocked the operation.
    Block,
    /// Hook modified the operation.
    Modify,
}

/// Background hook completion result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundHookResult {
    /// All hooks succeeded.
    Continue,
    /// At least one hook failed.
    Error,
}

/// Compaction trigger reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionReason {
    /// Pre-turn guardrail triggered compaction.
    PreTurnGuardrail,
    /// Token threshold exceeded.
    ThresholdExceeded,
    /// User requested compaction.
    Manual,
}

/// High-level agent event with session context.
///
/// These events are broadcast over WebSocket and may be persisted as
/// session events. iOS relies on exact type strings and field names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TronEvent {
    // -- Agent lifecycle --

    /// Agent started processing.
    #[serde(rename = "agent_start")]
    AgentStart {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// Agent finished processing.
    #[serde(rename = "agent_end")]
    AgentEnd {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Error message if ended due to error.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Agent ready (post-processing complete, safe to send next message).
    #[serde(rename = "agent_ready")]
    AgentReady {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// Agent interrupted by user.
    #[serde(rename = "agent_interrupted")]
    AgentInterrupted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn number when interrupted.
        turn: u32,
        /// Partial content captured before interruption.
        #[serde(rename = "partialContent", skip_serializing_if = "Option::is_none")]
        partial_content: Option<String>,
        /// Tool that was running when interrupted.
        #[serde(rename = "activeTool", skip_serializing_if = "Option::is_none")]
        active_tool: Option<String>,
    },

    // -- Turn lifecycle --

    /// Turn started.
    #[serde(rename = "turn_start")]
    TurnStart {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn number.
        turn: u32,
    },

    /// Turn completed.
    #[serde(rename = "turn_end")]
    TurnEnd {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn number.
        turn: u32,
        /// Duration in milliseconds.
        duration: u64,
        /// Token usage for this turn.
        #[serde(rename = "tokenUsage", skip_serializing_if = "Option::is_none")]
        token_usage: Option<TurnTokenUsage>,
        /// Canonical token record.
        #[serde(rename = "tokenRecord", skip_serializing_if = "Option::is_none")]
        token_record: Option<Value>,
        /// Cost for this turn in USD.
        #[serde(skip_serializing_if = "Option::is_none")]
        cost: Option<f64>,
        /// Context window limit (for iOS sync after model switch).
        #[serde(rename = "contextLimit", skip_serializing_if = "Option::is_none")]
        context_limit: Option<u64>,
    },

    /// Turn failed.
    #[serde(rename = "agent.turn_failed")]
    TurnFailed {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn number.
        turn: u32,
        /// Human-readable error message.
        error: String,
        /// Error category code.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Human-readable error category.
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        /// Whether the user can retry.
        recoverable: bool,
        /// Content generated before failure.
        #[serde(rename = "partialContent", skip_serializing_if = "Option::is_none")]
        partial_content: Option<String>,
    },

    /// LLM response finished streaming (before tool execution).
    #[serde(rename = "response_complete")]
    ResponseComplete {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Turn number.
        turn: u32,
        /// Stop reason from LLM.
        #[serde(rename = "stopReason")]
        stop_reason: String,
        /// Raw token usage.
        #[serde(rename = "tokenUsage", skip_serializing_if = "Option::is_none")]
        token_usage: Option<ResponseTokenUsage>,
        /// Whether the response contains tool calls.
        #[serde(rename = "hasToolCalls")]
        has_tool_calls: bool,
        /// Number of tool calls.
        #[serde(rename = "toolCallCount")]
        tool_call_count: u32,
    },

    // -- Message --

    /// Message content update.
    #[serde(rename = "message_update")]
    MessageUpdate {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Content delta.
        content: String,
    },

    // -- Tool execution --

    /// All tool calls from the model's response (before execution).
    #[serde(rename = "tool_use_batch")]
    ToolUseBatch {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Tool calls.
        #[serde(rename = "toolCalls")]
        tool_calls: Vec<ToolCallSummary>,
    },

    /// Tool execution started.
    #[serde(rename = "tool_execution_start")]
    ToolExecutionStart {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Tool arguments.
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<serde_json::Map<String, Value>>,
    },

    /// Tool execution progress update.
    #[serde(rename = "tool_execution_update")]
    ToolExecutionUpdate {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Progress update text.
        update: String,
    },

    /// Tool execution completed.
    #[serde(rename = "tool_execution_end")]
    ToolExecutionEnd {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// Duration in milliseconds.
        duration: u64,
        /// Whether execution resulted in error.
        #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
        /// Detailed result.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<TronToolResult>,
    },

    /// Tool call argument delta (during streaming).
    #[serde(rename = "toolcall_delta")]
    ToolCallArgumentDelta {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName", skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        /// Partial JSON arguments delta.
        #[serde(rename = "argumentsDelta")]
        arguments_delta: String,
    },

    /// Tool call generating (`toolcall_start`, before arguments streamed).
    #[serde(rename = "toolcall_generating")]
    ToolCallGenerating {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        #[serde(rename = "toolName")]
        tool_name: String,
    },

    // -- Hooks --

    /// Hook execution triggered.
    #[serde(rename = "hook_triggered")]
    HookTriggered {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Hook names being executed.
        #[serde(rename = "hookNames")]
        hook_names: Vec<String>,
        /// Hook event type.
        #[serde(rename = "hookEvent")]
        hook_event: String,
        /// Tool name for tool-related hooks.
        #[serde(rename = "toolName", skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        /// Tool call ID for tool-related hooks.
        #[serde(rename = "toolCallId", skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },

    /// Hook execution completed.
    #[serde(rename = "hook_completed")]
    HookCompleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Hook names that were executed.
        #[serde(rename = "hookNames")]
        hook_names: Vec<String>,
        /// Hook event type.
        #[serde(rename = "hookEvent")]
        hook_event: String,
        /// Result action.
        result: HookResult,
        /// Duration in milliseconds.
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
        /// Reason for block/modify.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// Tool name.
        #[serde(rename = "toolName", skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        /// Tool call ID.
        #[serde(rename = "toolCallId", skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },

    /// Background hook execution started.
    #[serde(rename = "hook.background_started")]
    HookBackgroundStarted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Hook names.
        #[serde(rename = "hookNames")]
        hook_names: Vec<String>,
        /// Hook event type.
        #[serde(rename = "hookEvent")]
        hook_event: String,
        /// Correlation ID.
        #[serde(rename = "executionId")]
        execution_id: String,
    },

    /// Background hook execution completed.
    #[serde(rename = "hook.background_completed")]
    HookBackgroundCompleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Hook names.
        #[serde(rename = "hookNames")]
        hook_names: Vec<String>,
        /// Hook event type.
        #[serde(rename = "hookEvent")]
        hook_event: String,
        /// Correlation ID.
        #[serde(rename = "executionId")]
        execution_id: String,
        /// Result.
        result: BackgroundHookResult,
        /// Duration in milliseconds.
        duration: u64,
        /// Error message if result is error.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Session --

    /// Session saved.
    #[serde(rename = "session_saved")]
    SessionSaved {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// File path.
        #[serde(rename = "filePath")]
        file_path: String,
    },

    /// Session loaded.
    #[serde(rename = "session_loaded")]
    SessionLoaded {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// File path.
        #[serde(rename = "filePath")]
        file_path: String,
        /// Number of messages loaded.
        #[serde(rename = "messageCount")]
        message_count: u32,
    },

    // -- Context --

    /// Context window warning.
    #[serde(rename = "context_warning")]
    ContextWarning {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Usage percentage.
        #[serde(rename = "usagePercent")]
        usage_percent: f64,
        /// Warning message.
        message: String,
    },

    // -- Compaction --

    /// Compaction started.
    #[serde(rename = "compaction_start")]
    CompactionStart {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Trigger reason.
        reason: CompactionReason,
        /// Token count before compaction.
        #[serde(rename = "tokensBefore")]
        tokens_before: u64,
    },

    /// Compaction completed.
    #[serde(rename = "compaction_complete")]
    CompactionComplete {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Whether compaction succeeded.
        success: bool,
        /// Token count before compaction.
        #[serde(rename = "tokensBefore")]
        tokens_before: u64,
        /// Token count after compaction.
        #[serde(rename = "tokensAfter")]
        tokens_after: u64,
        /// Compression ratio (0-1, lower is better).
        #[serde(rename = "compressionRatio")]
        compression_ratio: f64,
        /// Trigger reason.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<CompactionReason>,
        /// Summary of compacted context.
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        /// Estimated total context tokens after compaction.
        #[serde(rename = "estimatedContextTokens", skip_serializing_if = "Option::is_none")]
        estimated_context_tokens: Option<u64>,
    },

    // -- Error / Retry --

    /// Error event.
    #[serde(rename = "error")]
    Error {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Error message.
        error: String,
        /// Error context.
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },

    /// API retry event.
    #[serde(rename = "api_retry")]
    ApiRetry {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Current attempt (1-based).
        attempt: u32,
        /// Maximum retries configured.
        #[serde(rename = "maxRetries")]
        max_retries: u32,
        /// Delay before next retry in ms.
        #[serde(rename = "delayMs")]
        delay_ms: u64,
        /// Error category.
        #[serde(rename = "errorCategory")]
        error_category: String,
        /// Error message.
        #[serde(rename = "errorMessage")]
        error_message: String,
    },

    // -- Thinking (agent-level with session context) --

    /// Thinking started.
    #[serde(rename = "thinking_start")]
    ThinkingStart {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// Thinking delta.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Thinking text fragment.
        delta: String,
    },

    /// Thinking ended.
    #[serde(rename = "thinking_end")]
    ThinkingEnd {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Full thinking text.
        thinking: String,
    },

    // -- Session lifecycle --

    /// A new session was created.
    #[serde(rename = "session_created")]
    SessionCreated {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Model used for the session.
        model: String,
        /// Working directory the session was started in.
        #[serde(rename = "workingDirectory")]
        working_directory: String,
    },

    /// A session was archived.
    #[serde(rename = "session_archived")]
    SessionArchived {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// A session was unarchived.
    #[serde(rename = "session_unarchived")]
    SessionUnarchived {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// A session was forked into a new one.
    #[serde(rename = "session_forked")]
    SessionForked {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// ID of the newly created session.
        #[serde(rename = "newSessionId")]
        new_session_id: String,
    },

    /// A session was deleted.
    #[serde(rename = "session_deleted")]
    SessionDeleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// A session's summary fields changed (title, usage, activity).
    #[serde(rename = "session_updated")]
    SessionUpdated {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session title, if set.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Model used for the session.
        model: String,
        /// Number of messages in the session.
        #[serde(rename = "messageCount")]
        message_count: u32,
        /// Cumulative input tokens.
        #[serde(rename = "inputTokens")]
        input_tokens: u64,
        /// Cumulative output tokens.
        #[serde(rename = "outputTokens")]
        output_tokens: u64,
        /// Input tokens consumed by the most recent turn.
        #[serde(rename = "lastTurnInputTokens")]
        last_turn_input_tokens: u64,
        /// Cache-read tokens.
        #[serde(rename = "cacheReadTokens")]
        cache_read_tokens: u64,
        /// Cache-creation tokens.
        #[serde(rename = "cacheCreationTokens")]
        cache_creation_tokens: u64,
        /// Cumulative cost in USD.
        cost: f64,
        /// Timestamp of the last activity.
        #[serde(rename = "lastActivity")]
        last_activity: String,
        /// Whether the session is currently active.
        #[serde(rename = "isActive")]
        is_active: bool,
        /// Most recent user prompt, if any.
        #[serde(rename = "lastUserPrompt", skip_serializing_if = "Option::is_none")]
        last_user_prompt: Option<String>,
        /// Most recent assistant response, if any.
        #[serde(
            rename = "lastAssistantResponse",
            skip_serializing_if = "Option::is_none"
        )]
        last_assistant_response: Option<String>,
        /// Parent session ID, if this session is a subagent or fork.
        #[serde(rename = "parentSessionId", skip_serializing_if = "Option::is_none")]
        parent_session_id: Option<String>,
    },

    // -- Memory ledger --

    /// The memory ledger entry is being updated (write in progress).
    #[serde(rename = "memory_updating")]
    MemoryUpdating {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
    },

    /// The memory ledger was updated.
    #[serde(rename = "memory_updated")]
    MemoryUpdated {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Title of the updated entry.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Entry type (e.g. "feature", "decision").
        #[serde(rename = "entryType", skip_serializing_if = "Option::is_none")]
        entry_type: Option<String>,
        /// ID of the event that recorded the entry.
        #[serde(rename = "eventId", skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },

    /// Memory entries were loaded for the session.
    #[serde(rename = "memory_loaded")]
    MemoryLoaded {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Number of entries loaded.
        count: u32,
    },

    // -- Context / message edits --

    /// Context was cleared (e.g. via `/clear`).
    #[serde(rename = "context_cleared")]
    ContextCleared {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Token count before clearing.
        #[serde(rename = "tokensBefore")]
        tokens_before: u32,
        /// Token count after clearing.
        #[serde(rename = "tokensAfter")]
        tokens_after: u32,
    },

    /// A message was deleted from the session.
    #[serde(rename = "message_deleted")]
    MessageDeleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// ID of the deleted event.
        #[serde(rename = "targetEventId")]
        target_event_id: String,
        /// Event type of the deleted event.
        #[serde(rename = "targetType")]
        target_type: String,
        /// Turn the deleted event belonged to, if known.
        #[serde(rename = "targetTurn", skip_serializing_if = "Option::is_none")]
        target_turn: Option<u32>,
        /// Reason for deletion, if given.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // -- Rules --

    /// Rule files were discovered for the session.
    #[serde(rename = "rules_loaded")]
    RulesLoaded {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Total number of rule files discovered.
        #[serde(rename = "totalFiles")]
        total_files: u32,
        /// Number of dynamically-scoped rules among them.
        #[serde(rename = "dynamicRulesCount")]
        dynamic_rules_count: u32,
    },

    /// Rules were activated for the current turn's working set.
    #[serde(rename = "rules_activated")]
    RulesActivated {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Rules activated this turn.
        rules: Vec<ActivatedRuleInfo>,
        /// Total number of rules activated.
        #[serde(rename = "totalActivated")]
        total_activated: u32,
    },

    // -- Skills --

    /// A skill was removed from the active set.
    #[serde(rename = "skill_removed")]
    SkillRemoved {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Name of the removed skill.
        #[serde(rename = "skillName")]
        skill_name: String,
    },

    // -- Subagents --

    /// A subagent was spawned.
    #[serde(rename = "subagent_spawned")]
    SubagentSpawned {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session ID of the spawned subagent.
        #[serde(rename = "subagentSessionId")]
        subagent_session_id: String,
        /// Task description given to the subagent.
        task: String,
        /// Model the subagent is running.
        model: String,
        /// Maximum turns the subagent may take.
        #[serde(rename = "maxTurns")]
        max_turns: u32,
        /// Depth of this subagent in the spawn tree.
        #[serde(rename = "spawnDepth")]
        spawn_depth: u32,
        /// Tool call ID that triggered the spawn, if any.
        #[serde(rename = "toolCallId", skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        /// Whether the parent blocks on completion.
        blocking: bool,
        /// Working directory for the subagent, if overridden.
        #[serde(
            rename = "workingDirectory",
            skip_serializing_if = "Option::is_none"
        )]
        working_directory: Option<String>,
    },

    /// A subagent's status changed.
    #[serde(rename = "subagent_status_update")]
    SubagentStatusUpdate {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session ID of the subagent.
        #[serde(rename = "subagentSessionId")]
        subagent_session_id: String,
        /// Current status string.
        status: String,
        /// Current turn the subagent is on.
        #[serde(rename = "currentTurn")]
        current_turn: u32,
        /// Human-readable current activity, if known.
        #[serde(skip_serializing_if = "Option::is_none")]
        activity: Option<String>,
    },

    /// A subagent completed successfully.
    #[serde(rename = "subagent_completed")]
    SubagentCompleted {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session ID of the subagent.
        #[serde(rename = "subagentSessionId")]
        subagent_session_id: String,
        /// Total turns taken.
        #[serde(rename = "totalTurns")]
        total_turns: u32,
        /// Duration in milliseconds.
        duration: u64,
        /// Full output text, if retained.
        #[serde(rename = "fullOutput", skip_serializing_if = "Option::is_none")]
        full_output: Option<String>,
        /// Summarized result, if produced.
        #[serde(rename = "resultSummary", skip_serializing_if = "Option::is_none")]
        result_summary: Option<String>,
        /// Token usage for the subagent run.
        #[serde(rename = "tokenUsage", skip_serializing_if = "Option::is_none")]
        token_usage: Option<serde_json::Value>,
        /// Model the subagent ran.
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },

    /// A subagent failed.
    #[serde(rename = "subagent_failed")]
    SubagentFailed {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session ID of the subagent.
        #[serde(rename = "subagentSessionId")]
        subagent_session_id: String,
        /// Error message.
        error: String,
        /// Duration in milliseconds before failure.
        duration: u64,
    },

    /// A raw event forwarded from a subagent's own stream.
    #[serde(rename = "subagent_event")]
    SubagentEvent {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session ID of the subagent.
        #[serde(rename = "subagentSessionId")]
        subagent_session_id: String,
        /// The forwarded event, as raw JSON.
        event: serde_json::Value,
    },

    /// A subagent's result became available to the parent (post-completion notification).
    #[serde(rename = "subagent_result_available")]
    SubagentResultAvailable {
        /// Base fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Session ID of the parent session.
        #[serde(rename = "parentSessionId")]
        parent_session_id: String,
        /// Session ID of the subagent.
        #[serde(rename = "subagentSessionId")]
        subagent_session_id: String,
        /// Task the subagent was given.
        task: String,
        /// Summarized result text.
        #[serde(rename = "resultSummary")]
        result_summary: String,
        /// Whether the subagent succeeded.
        success: bool,
        /// Total turns taken.
        #[serde(rename = "totalTurns")]
        total_turns: u32,
        /// Duration in milliseconds.
        duration: u64,
        /// Token usage for the subagent run.
        #[serde(rename = "tokenUsage", skip_serializing_if = "Option::is_none")]
        token_usage: Option<serde_json::Value>,
        /// Error message, if the subagent failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Timestamp the subagent completed at.
        #[serde(rename = "completedAt")]
        completed_at: String,
    },
}

/// A single rule file activated for the current turn's working set.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActivatedRuleInfo {
    /// Path to the rule file, relative to the workspace root.
    #[serde(rename = "relativePath")]
    pub relative_path: String,
    /// Directory scope the rule applies to.
    #[serde(rename = "scopeDir")]
    pub scope_dir: String,
}

impl TronEvent {
    /// Get the base event fields.
    #[must_use]
    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::AgentStart { base, .. }
            | Self::AgentEnd { base, .. }
            | Self::AgentReady { base, .. }
            | Self::AgentInterrupted { base, .. }
            | Self::TurnStart { base, .. }
            | Self::TurnEnd { base, .. }
            | Self::TurnFailed { base, .. }
            | Self::ResponseComplete { base, .. }
            | Self::MessageUpdate { base, .. }
            | Self::ToolUseBatch { base, .. }
            | Self::ToolExecutionStart { base, .. }
            | Self::ToolExecutionUpdate { base, .. }
            | Self::ToolExecutionEnd { base, .. }
            | Self::ToolCallArgumentDelta { base, .. }
            | Self::ToolCallGenerating { base, .. }
            | Self::HookTriggered { base, .. }
            | Self::HookCompleted { base, .. }
            | Self::HookBackgroundStarted { base, .. }
            | Self::HookBackgroundCompleted { base, .. }
            | Self::SessionSaved { base, .. }
            | Self::SessionLoaded { base, .. }
            | Self::ContextWarning { base, .. }
            | Self::CompactionStart { base, .. }
            | Self::CompactionComplete { base, .. }
            | Self::Error { base, .. }
            | Self::ApiRetry { base, .. }
            | Self::ThinkingStart { base, .. }
            | Self::ThinkingDelta { base, .. }
            | Self::ThinkingEnd { base, .. }
            | Self::SessionCreated { base, .. }
            | Self::SessionArchived { base, .. }
            | Self::SessionUnarchived { base, .. }
            | Self::SessionForked { base, .. }
            | Self::SessionDeleted { base, .. }
            | Self::SessionUpdated { base, .. }
            | Self::MemoryUpdating { base, .. }
            | Self::MemoryUpdated { base, .. }
            | Self::MemoryLoaded { base, .. }
            | Self::ContextCleared { base, .. }
            | Self::MessageDeleted { base, .. }
            | Self::RulesLoaded { base, .. }
            | Self::RulesActivated { base, .. }
            | Self::SkillRemoved { base, .. }
            | Self::SubagentSpawned { base, .. }
            | Self::SubagentStatusUpdate { base, .. }
            | Self::SubagentCompleted { base, .. }
            | Self::SubagentFailed { base, .. }
            | Self::SubagentEvent { base, .. }
            | Self::SubagentResultAvailable { base, .. } => base,
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.base().session_id
    }

    /// Get the timestamp.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.base().timestamp
    }

    /// Get the event type string (for type discrimination).
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::AgentStart { .. } => "agent_start",
            Self::AgentEnd { .. } => "agent_end",
            Self::AgentReady { .. } => "agent_ready",
            Self::AgentInterrupted { .. } => "agent_interrupted",
            Self::TurnStart { .. } => "turn_start",
            Self::TurnEnd { .. } => "turn_end",
            Self::TurnFailed { .. } => "agent.turn_failed",
            Self::ResponseComplete { .. } => "response_complete",
            Self::MessageUpdate { .. } => "message_update",
            Self::ToolUseBatch { .. } => "tool_use_batch",
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionUpdate { .. } => "tool_execution_update",
            Self::ToolExecutionEnd { .. } => "tool_execution_end",
            Self::ToolCallArgumentDelta { .. } => "toolcall_delta",
            Self::ToolCallGenerating { .. } => "toolcall_generating",
            Self::HookTriggered { .. } => "hook_triggered",
            Self::HookCompleted { .. } => "hook_completed",
            Self::HookBackgroundStarted { .. } => "hook.background_started",
            Self::HookBackgroundCompleted { .. } => "hook.background_completed",
            Self::SessionSaved { .. } => "session_saved",
            Self::SessionLoaded { .. } => "session_loaded",
            Self::ContextWarning { .. } => "context_warning",
            Self::CompactionStart { .. } => "compaction_start",
            Self::CompactionComplete { .. } => "compaction_complete",
            Self::Error { .. } => "error",
            Self::ApiRetry { .. } => "api_retry",
            Self::ThinkingStart { .. } => "thinking_start",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ThinkingEnd { .. } => "thinking_end",
            Self::SessionCreated { .. } => "session_created",
            Self::SessionArchived { .. } => "session_archived",
            Self::SessionUnarchived { .. } => "session_unarchived",
            Self::SessionForked { .. } => "session_forked",
            Self::SessionDeleted { .. } => "session_deleted",
            Self::SessionUpdated { .. } => "session_updated",
            Self::MemoryUpdating { .. } => "memory_updating",
            Self::MemoryUpdated { .. } => "memory_updated",
            Self::MemoryLoaded { .. } => "memory_loaded",
            Self::ContextCleared { .. } => "context_cleared",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::RulesLoaded { .. } => "rules_loaded",
            Self::RulesActivated { .. } => "rules_activated",
            Self::SkillRemoved { .. } => "skill_removed",
            Self::SubagentSpawned { .. } => "subagent_spawned",
            Self::SubagentStatusUpdate { .. } => "subagent_status_update",
            Self::SubagentCompleted { .. } => "subagent_completed",
            Self::SubagentFailed { .. } => "subagent_failed",
            Self::SubagentEvent { .. } => "subagent_event",
            Self::SubagentResultAvailable { .. } => "subagent_result_available",
        }
    }

    /// Whether this is a tool execution event.
    #[must_use]
    pub fn is_tool_execution(&self) -> bool {
        matches!(
            self,
            Self::ToolExecutionStart { .. }
                | Self::ToolExecutionUpdate { .. }
                | Self::ToolExecutionEnd { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Create an agent-start event.
#[must_use]
pub fn agent_start_event(session_id: impl Into<String>) -> TronEvent {
    TronEvent::AgentStart {
        base: BaseEvent::now(session_id),
    }
}

/// Create an agent-end event.
#[must_use]
pub fn agent_end_event(session_id: impl Into<String>) -> TronEvent {
    TronEvent::AgentEnd {
        base: BaseEvent::now(session_id),
        error: None,
    }
}

/// Create an agent-ready event.
#[must_use]
pub fn agent_ready_event(session_id: impl Into<String>) -> TronEvent {
    TronEvent::AgentReady {
        base: BaseEvent::now(session_id),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type guards
// ─────────────────────────────────────────────────────────────────────────────

/// Stream event type strings.
const STREAM_EVENT_TYPES: &[&str] = &[
    "start",
    "text_start",
    "text_delta",
    "text_end",
    "thinking_start",
    "thinking_delta",
    "thinking_end",
    "toolcall_start",
    "toolcall_delta",
    "toolcall_end",
    "done",
    "error",
    "retry",
    "safety_block",
];

/// Check if a type string is a stream event type.
#[must_use]
pub fn is_stream_event_type(type_str: &str) -> bool {
    STREAM_EVENT_TYPES.contains(&type_str)
}

// ─────────────────────────────────────────────────────────────────────────────
// AssistantMessage type alias
// ─────────────────────────────────────────────────────────────────────────────

/// An assistant message (used in [`StreamEvent::Done`]).
///
/// This is a type alias for the message type — the full `Message::Assistant`
/// variant carries all the fields, but for streaming we only need
/// the content + metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    /// Assistant content blocks.
    pub content: Vec<crate::content::AssistantContent>,
    /// Token usage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
