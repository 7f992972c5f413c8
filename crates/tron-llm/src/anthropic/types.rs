//! Anthropic model registry, auth, request/response, and SSE wire types.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::OAuthTokens;
use crate::models::model_ids::{
    ALL_ANTHROPIC_MODEL_IDS, CLAUDE_3_7_SONNET, CLAUDE_3_HAIKU, CLAUDE_HAIKU_4_5, CLAUDE_OPUS_4,
    CLAUDE_OPUS_4_1, CLAUDE_OPUS_4_5, CLAUDE_OPUS_4_6, CLAUDE_SONNET_4, CLAUDE_SONNET_4_5,
};
use crate::retry::StreamRetryConfig;

/// Default max output tokens when a model is unrecognized.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 64_000;

/// Prefix prepended to the system prompt in OAuth mode, required by Anthropic's
/// OAuth terms of service for Claude Code-branded clients.
pub const OAUTH_SYSTEM_PROMPT_PREFIX: &str =
    "You are Claude Code, Anthropic's official CLI for Claude.";

/// Anthropic authentication — API key or OAuth.
#[derive(Clone, Debug)]
pub enum AnthropicAuth {
    /// API key authentication.
    ApiKey {
        /// The Anthropic API key.
        api_key: String,
    },
    /// OAuth authentication (Claude Code / Claude Pro-Max accounts).
    OAuth {
        /// Current OAuth tokens.
        tokens: OAuthTokens,
        /// Optional account label for multi-account setups.
        account_label: Option<String>,
    },
}

/// Provider-level settings tunable independently of per-request options.
#[derive(Clone, Debug)]
pub struct AnthropicProviderSettings {
    /// Override the OAuth system prompt prefix.
    pub system_prompt_prefix: Option<String>,
    /// Comma-separated `anthropic-beta` header value sent with OAuth requests
    /// for models needing the thinking beta.
    pub oauth_beta_headers: String,
}

impl Default for AnthropicProviderSettings {
    fn default() -> Self {
        Self {
            system_prompt_prefix: None,
            oauth_beta_headers: "oauth-2025-04-20,interleaved-thinking-2025-05-14".into(),
        }
    }
}

/// Anthropic provider configuration.
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// Model ID (e.g., `"claude-opus-4-6"`).
    pub model: String,
    /// Authentication.
    pub auth: AnthropicAuth,
    /// Override max tokens.
    pub max_tokens: Option<u32>,
    /// Override base URL.
    pub base_url: Option<String>,
    /// Retry configuration.
    pub retry: Option<StreamRetryConfig>,
    /// Provider-level settings.
    pub provider_settings: AnthropicProviderSettings,
}

/// Anthropic model information (provider-specific fields beyond [`crate::models::types::ModelInfo`]).
#[derive(Clone, Debug)]
pub struct AnthropicModelInfo {
    /// API model ID.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Short name for compact display.
    pub short_name: &'static str,
    /// Model family.
    pub family: &'static str,
    /// Context window in tokens.
    pub context_window: u64,
    /// Maximum output tokens.
    pub max_output: u32,
    /// Supports extended thinking.
    pub supports_thinking: bool,
    /// Supports adaptive thinking (no budget parameter needed).
    pub supports_adaptive_thinking: bool,
    /// Requires the `anthropic-beta: interleaved-thinking-*` header.
    pub supports_thinking_beta_headers: bool,
    /// Supports effort levels (`low`/`medium`/`high`).
    pub supports_effort: bool,
    /// Supports tool use.
    pub supports_tools: bool,
    /// Supports image inputs.
    pub supports_images: bool,
    /// Input cost per million tokens (USD).
    pub input_cost_per_million: f64,
    /// Output cost per million tokens (USD).
    pub output_cost_per_million: f64,
}

static CLAUDE_MODELS: LazyLock<HashMap<&'static str, AnthropicModelInfo>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    let _ = m.insert(
        CLAUDE_OPUS_4_6,
        AnthropicModelInfo {
            id: CLAUDE_OPUS_4_6,
            name: "Claude Opus 4.6",
            short_name: "Opus 4.6",
            family: "Claude 4.6",
            context_window: 200_000,
            max_output: 128_000,
            supports_thinking: true,
            supports_adaptive_thinking: true,
            supports_thinking_beta_headers: false,
            supports_effort: true,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 15.0,
            output_cost_per_million: 75.0,
        },
    );
    let _ = m.insert(
        CLAUDE_OPUS_4_5,
        AnthropicModelInfo {
            id: CLAUDE_OPUS_4_5,
            name: "Claude Opus 4.5",
            short_name: "Opus 4.5",
            family: "Claude 4.5",
            context_window: 200_000,
            max_output: 64_000,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: true,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 15.0,
            output_cost_per_million: 75.0,
        },
    );
    let _ = m.insert(
        CLAUDE_SONNET_4_5,
        AnthropicModelInfo {
            id: CLAUDE_SONNET_4_5,
            name: "Claude Sonnet 4.5",
            short_name: "Sonnet 4.5",
            family: "Claude 4.5",
            context_window: 200_000,
            max_output: 64_000,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 3.0,
            output_cost_per_million: 15.0,
        },
    );
    let _ = m.insert(
        CLAUDE_HAIKU_4_5,
        AnthropicModelInfo {
            id: CLAUDE_HAIKU_4_5,
            name: "Claude Haiku 4.5",
            short_name: "Haiku 4.5",
            family: "Claude 4.5",
            context_window: 200_000,
            max_output: 64_000,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 1.0,
            output_cost_per_million: 5.0,
        },
    );
    let _ = m.insert(
        CLAUDE_OPUS_4_1,
        AnthropicModelInfo {
            id: CLAUDE_OPUS_4_1,
            name: "Claude Opus 4.1",
            short_name: "Opus 4.1",
            family: "Claude 4",
            context_window: 200_000,
            max_output: 32_000,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 15.0,
            output_cost_per_million: 75.0,
        },
    );
    let _ = m.insert(
        CLAUDE_OPUS_4,
        AnthropicModelInfo {
            id: CLAUDE_OPUS_4,
            name: "Claude Opus 4",
            short_name: "Opus 4",
            family: "Claude 4",
            context_window: 200_000,
            max_output: 32_000,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 15.0,
            output_cost_per_million: 75.0,
        },
    );
    let _ = m.insert(
        CLAUDE_SONNET_4,
        AnthropicModelInfo {
            id: CLAUDE_SONNET_4,
            name: "Claude Sonnet 4",
            short_name: "Sonnet 4",
            family: "Claude 4",
            context_window: 200_000,
            max_output: 64_000,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 3.0,
            output_cost_per_million: 15.0,
        },
    );
    let _ = m.insert(
        CLAUDE_3_7_SONNET,
        AnthropicModelInfo {
            id: CLAUDE_3_7_SONNET,
            name: "Claude 3.7 Sonnet",
            short_name: "3.7 Sonnet",
            family: "Claude 3",
            context_window: 200_000,
            max_output: 8_192,
            supports_thinking: true,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: true,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 3.0,
            output_cost_per_million: 15.0,
        },
    );
    let _ = m.insert(
        CLAUDE_3_HAIKU,
        AnthropicModelInfo {
            id: CLAUDE_3_HAIKU,
            name: "Claude 3 Haiku",
            short_name: "3 Haiku",
            family: "Claude 3",
            context_window: 200_000,
            max_output: 4_096,
            supports_thinking: false,
            supports_adaptive_thinking: false,
            supports_thinking_beta_headers: false,
            supports_effort: false,
            supports_tools: true,
            supports_images: true,
            input_cost_per_million: 0.25,
            output_cost_per_million: 1.25,
        },
    );
    m
});

/// Look up a Claude model by ID.
pub fn get_claude_model(id: &str) -> Option<&'static AnthropicModelInfo> {
    CLAUDE_MODELS.get(id)
}

/// All known Claude model IDs.
pub fn all_claude_model_ids() -> Vec<&'static str> {
    ALL_ANTHROPIC_MODEL_IDS.to_vec()
}

/// A cache control breakpoint attached to a system prompt block or tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheControl {
    /// Always `"ephemeral"`.
    #[serde(rename = "type")]
    pub cache_type: String,
    /// Optional TTL override (`"5m"` default, `"1h"` for long-lived breakpoints).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

/// A block in the multi-part OAuth system prompt.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPromptBlock {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub block_type: String,
    /// Block content.
    pub text: String,
    /// Cache breakpoint, if this block ends a cacheable segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemPromptBlock {
    /// Build a text block with no cache control.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            block_type: "text".into(),
            text: content.into(),
            cache_control: None,
        }
    }
}

/// A tool definition sent to the Messages API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicTool {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON schema for the tool's input.
    pub input_schema: Value,
    /// Cache breakpoint, if this is the last cacheable tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// A single message in the conversation, in Anthropic wire format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicMessageParam {
    /// `"user"` or `"assistant"`.
    pub role: String,
    /// Content blocks, each an opaque JSON object (`text`, `tool_use`, `tool_result`, ...).
    pub content: Vec<Value>,
}

/// The `/v1/messages` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnthropicRequest {
    /// Model ID.
    pub model: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Conversation messages.
    pub messages: Vec<AnthropicMessageParam>,
    /// System prompt — string (API key) or array of blocks (OAuth).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
    /// Tool definitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    /// Always `true` — this provider only streams.
    pub stream: bool,
    /// Extended thinking configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Value>,
    /// Effort-level output configuration.
    #[serde(skip_serializing_if = "Option::is_none", rename = "output_config")]
    pub output_config: Option<Value>,
    /// Custom stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Cache token breakdown by TTL tier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseCacheCreation {
    /// Tokens cached with a 5-minute TTL.
    pub ephemeral_5m_input_tokens: u64,
    /// Tokens cached with a 1-hour TTL.
    pub ephemeral_1h_input_tokens: u64,
}

/// Token usage reported on `message_start` and `message_delta` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseUsage {
    /// Input tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Cache creation (write) tokens.
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Cache read (hit) tokens.
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    /// Per-TTL-tier cache creation breakdown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation: Option<SseCacheCreation>,
}

/// Incremental usage delta on `message_delta` events (output tokens only).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseUsageDelta {
    /// Output tokens generated so far.
    #[serde(default)]
    pub output_tokens: u64,
}

/// The `message` object on a `message_start` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseMessage {
    /// Message ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Stop reason (always `null` at `message_start`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Initial token usage.
    pub usage: SseUsage,
}

/// The delta payload on a `message_delta` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseMessageDelta {
    /// Stop reason (`"end_turn"`, `"max_tokens"`, `"tool_use"`, `"stop_sequence"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// A content block announced by `content_block_start`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseContentBlock {
    /// A text block.
    Text {
        /// Initial (usually empty) text.
        #[serde(default)]
        text: String,
    },
    /// An extended thinking block.
    Thinking {
        /// Initial (usually empty) thinking content.
        #[serde(default)]
        thinking: String,
    },
    /// A tool-use block.
    ToolUse {
        /// Tool call ID.
        id: String,
        /// Tool name.
        name: String,
    },
}

/// A delta fragment on a `content_block_delta` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseDelta {
    /// Incremental text.
    TextDelta {
        /// Text fragment.
        text: String,
    },
    /// Incremental thinking content.
    ThinkingDelta {
        /// Thinking fragment.
        thinking: String,
    },
    /// Incremental thinking signature.
    SignatureDelta {
        /// Signature fragment.
        signature: String,
    },
    /// Incremental tool-call argument JSON.
    InputJsonDelta {
        /// Raw partial JSON fragment.
        partial_json: String,
    },
}

/// An SSE error payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SseError {
    /// Error type (`"overloaded_error"`, `"api_error"`, ...).
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable error message.
    pub message: String,
}

/// A parsed Anthropic Messages API SSE event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicSseEvent {
    /// Start of a new message; carries initial token usage.
    MessageStart {
        /// The message envelope.
        message: SseMessage,
    },
    /// Start of a new content block.
    ContentBlockStart {
        /// Index of the block within the message.
        index: u32,
        /// The block being started.
        content_block: SseContentBlock,
    },
    /// Incremental content for the current block.
    ContentBlockDelta {
        /// Index of the block being updated.
        index: u32,
        /// The delta fragment.
        delta: SseDelta,
    },
    /// End of the current content block.
    ContentBlockStop {
        /// Index of the block that ended.
        index: u32,
    },
    /// Top-level message metadata update (stop reason, output token usage).
    MessageDelta {
        /// The delta payload.
        delta: SseMessageDelta,
        /// Updated usage, if present.
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<SseUsageDelta>,
    },
    /// End of the message stream.
    MessageStop,
    /// Keep-alive ping.
    Ping,
    /// An error occurred mid-stream.
    Error {
        /// The error payload.
        error: SseError,
    },
}
