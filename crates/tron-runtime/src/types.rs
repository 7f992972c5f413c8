//! Runtime configuration and result types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tron_core::messages::TokenUsage;
use tron_context::types::CompactionConfig;
use tron_llm::ProviderHealthTracker;

use crate::errors::StopReason;

// ─────────────────────────────────────────────────────────────────────────────
// Agent configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Reasoning level for agent execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningLevel {
    /// No reasoning.
    None,
    /// Low reasoning effort.
    Low,
    /// Medium reasoning effort.
    Medium,
    /// High reasoning effort.
    High,
    /// Extra-high reasoning effort (Anthropic only, maps to High for other providers).
    #[serde(alias = "xhigh", alias = "x_high")]
    XHigh,
    /// Maximum reasoning effort (Anthropic only, maps to High for other providers).
    Max,
}

impl ReasoningLevel {
    /// Convert to Anthropic effort string (budget_tokens style).
    pub fn as_effort_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::XHigh => "xhigh",
            Self::Max => "max",
        }
    }

    /// Convert to OpenAI reasoning_effort string.
    /// OpenAI supports: "low", "medium", "high" only.
    /// XHigh/Max clamp to "high".
    pub fn as_openai_reasoning_effort(&self) -> &str {
        match self {
            Self::None => "low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High | Self::XHigh | Self::Max => "high",
        }
    }

    /// Convert to Google Gemini thinking level string.
    /// Gemini supports: "THINKING_DISABLED", "THINKING_LOW", "THINKING_MEDIUM", "THINKING_HIGH".
    /// XHigh/Max clamp to "THINKING_HIGH".
    pub fn as_gemini_thinking_level(&self) -> &str {
        match self {
            Self::None => "THINKING_DISABLED",
            Self::Low => "THINKING_LOW",
            Self::Medium => "THINKING_MEDIUM",
            Self::High | Self::XHigh | Self::Max => "THINKING_HIGH",
        }
    }

    /// Parse from a string, case-insensitive.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "xhigh" | "x_high" | "x-high" => Some(Self::XHigh),
            "max" => Some(Self::Max),
            _ => Option::None,
        }
    }
}

/// Configuration for creating a `TronAgent`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// LLM provider type override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<tron_core::messages::ProviderType>,
    /// Model identifier.
    pub model: String,
    /// System prompt override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum output tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum turns before stopping.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Enable extended thinking.
    #[serde(default)]
    pub enable_thinking: bool,
    /// Thinking budget in tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Stop sequences.
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Compaction configuration.
    #[serde(skip)]
    pub compaction: CompactionConfig,
    /// Working directory for file operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Current subagent nesting depth (0 = root agent).
    #[serde(default)]
    pub subagent_depth: u32,
    /// Maximum nesting depth allowed for spawning children.
    #[serde(default)]
    pub subagent_max_depth: u32,
    /// Retry configuration for provider stream failures.
    #[serde(skip)]
    pub retry: Option<tron_core::retry::RetryConfig>,
    /// Shared provider health tracker for recording success/failure outcomes.
    #[serde(skip)]
    pub health_tracker: Option<Arc<ProviderHealthTracker>>,
}

const fn default_max_turns() -> u32 {
    25
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider_type: None,
            model: "claude-opus-4-6".into(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            max_turns: default_max_turns(),
            enable_thinking: false,
            thinking_budget: None,
            stop_sequences: Vec::new(),
            compaction: CompactionConfig::default(),
            working_directory: None,
            subagent_depth: 0,
            subagent_max_depth: 0,
            retry: None,
            health_tracker: None,
        }
    }
}

/// Per-prompt execution context.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    /// Skill context to inject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_context: Option<String>,
    /// Subagent results to inject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent_results: Option<String>,
    /// Task context to inject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_context: Option<String>,
    /// Reasoning level override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_level: Option<ReasoningLevel>,
    /// Dynamic rules context from path-scoped files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_rules_context: Option<String>,
    /// Override user message content (e.g., multimodal blocks with images).
    /// When set, `run()` uses this instead of creating a text-only message.
    #[serde(skip)]
    pub user_content_override: Option<tron_core::messages::UserMessageContent>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a single turn execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct TurnResult {
    /// Whether the turn completed successfully.
    pub success: bool,
    /// Error message if turn failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of tool calls executed.
    pub tool_calls_executed: usize,
    /// Token usage for this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    /// Why the turn stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Whether the turn was interrupted.
    pub interrupted: bool,
    /// Content captured before interruption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_content: Option<String>,
    /// Whether a tool requested turn stop.
    pub stop_turn_requested: bool,
    /// LLM model ID used for this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Turn duration in milliseconds.
    pub latency_ms: u64,
    /// Whether the response contained thinking blocks.
    pub has_thinking: bool,
    /// Raw LLM stop reason string (e.g. `end_turn`, `tool_use`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_stop_reason: Option<String>,
    /// Context window tokens this turn (for cross-turn baseline tracking).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u64>,
}

impl Default for TurnResult {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            tool_calls_executed: 0,
            token_usage: None,
            stop_reason: None,
            interrupted: false,
            partial_content: None,
            stop_turn_requested: false,
            model: None,
            latency_ms: 0,
            has_thinking: false,
            llm_stop_reason: None,
            context_window_tokens: None,
        }
    }
}

/// Result of a full agent run (multi-turn).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Number of turns executed.
    pub turns_executed: u32,
    /// Cumulative token usage.
    pub total_token_usage: TokenUsage,
    /// Why the agent stopped.
    pub stop_reason: StopReason,
    /// Whether the run was interrupted.
    pub interrupted: bool,
    /// Error message if run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Context window tokens from the last turn (for compaction ratio).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_context_window_tokens: Option<u64>,
}

impl Default for RunResult {
    fn default() -> Self {
        Self {
            turns_executed: 0,
            total_token_usage: TokenUsage::default(),
            stop_reason: StopReason::EndTurn,
            interrupted: false,
            error: None,
            last_context_window_tokens: None,
        }
    }
}

/// Result of tool execution pipeline.
#[derive(Clone, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ToolExecutionResult {
    /// Tool call ID.
    pub tool_call_id: String,
    /// Tool result.
    pub result: tron_core::tools::TronToolResult,
    /// Execution duration in milliseconds.
    pub duration_ms: u64,
    /// Whether a hook blocked execution.
    pub blocked_by_hook: bool,
    /// Whether a guardrail blocked execution.
    pub blocked_by_guardrail: bool,
    /// Whether this tool requested a turn stop.
    pub stops_turn: bool,
    /// Whether this tool is interactive.
    pub is_interactive: bool,
}

/// Accumulated result from stream processing.
#[derive(Clone, Debug)]
pub struct StreamResult {
    /// Full assistant message.
    pub message: tron_core::events::AssistantMessage,
    /// Extracted tool calls.
    pub tool_calls: Vec<tron_core::messages::ToolCall>,
    /// Stop reason string from LLM.
    pub stop_reason: String,
    /// Token usage.
    pub token_usage: Option<TokenUsage>,
    /// Whether the stream was interrupted.
    pub interrupted: bool,
    /// Partial content if interrupted.
    pub partial_content: Option<String>,
}
