//! `OpenAI` provider implementing the [`Provider`] trait.
//!
//! Builds and sends streaming requests to the `OpenAI` Responses API (Codex
//! endpoint). Supports OAuth authentication with automatic `ChatGPT` account ID
//! extraction from the access token's JWT claims, token refresh before expiry,
//! and reasoning effort levels.
//!
//! # Authentication
//!
//! OAuth only — the Codex endpoint requires OAuth Bearer tokens. On every
//! stream request, the provider checks if the access token is about to expire
//! and refreshes it automatically.
//!
//! # Context Injection
//!
//! Context parts (rules, memory, skills, tasks) are injected as a `developer`
//! message prepended to the input. On the first turn (no assistant messages
//! yet), a tool clarification message is also prepended, since the Codex
//! endpoint's built-in system instructions reference tools we don't expose.

use async_trait::async_trait;
use base64::Engine as _;
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::auth::{OAuthTokens, calculate_expires_at, should_refresh};
use crate::compose_context_parts;
use crate::models::types::ProviderType;
use crate::provider::{
    Provider, ProviderError, ProviderResult, ProviderStreamOptions, StreamEventStream,
};
use crate::sse::parse_sse_lines;
use tron_core::events::StreamEvent;
use tron_core::messages::{Context, Message};

use super::message_converter::{
    convert_to_responses_input, convert_tools, generate_tool_clarification_message,
};
use super::stream_handler::{create_stream_state, process_stream_event};
use super::types::{
    MessageContent, OpenAIApiSettings, OpenAIAuth, OpenAIConfig, ReasoningConfig,
    ResponsesInputItem, ResponsesRequest, ResponsesSseEvent, get_openai_model,
};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default OAuth token endpoint.
const DEFAULT_TOKEN_URL: &str = "https://auth.openai.com/oauth/token";

/// Default OAuth client ID.
const DEFAULT_CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";

/// Buffer before token expiry to trigger refresh (milliseconds).
const TOKEN_EXPIRY_BUFFER_MS: i64 = 300_000;

/// SSE parser options for the Responses API.
///
/// `OpenAI` terminates the stream with an explicit `[DONE]` marker, so there
/// is no need to process a remaining buffer once the stream ends.
static SSE_OPTIONS: crate::SseParserOptions = crate::SseParserOptions {
    process_remaining_buffer: false,
};

/// Default system instructions for the Codex endpoint.
///
/// The `ChatGPT` backend validates that these instructions are present; they
/// describe Tron's role rather than Codex CLI's own shell/`apply_patch` tools,
/// which are clarified away per-turn by [`generate_tool_clarification_message`].
const DEFAULT_INSTRUCTIONS: &str = "You are Tron, an agentic coding assistant.";

// ─────────────────────────────────────────────────────────────────────────────
// Auth helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extract the `ChatGPT` account ID from a JWT access token.
///
/// Decodes the JWT payload and looks for the `chatgpt_account_id` field in
/// the `https://api.openai.com/auth` claims object. Returns an empty string
/// on any parsing failure — the request can still proceed without it.
#[must_use]
pub fn extract_account_id(token: &str) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() < 2 {
        return String::new();
    }

    let Ok(payload_bytes) =
        base64::engine::general_purpose::STANDARD.decode(to_standard_base64(parts[1]))
    else {
        return String::new();
    };

    let Ok(payload_str) = std::str::from_utf8(&payload_bytes) else {
        return String::new();
    };

    let Ok(payload) = serde_json::from_str::<serde_json::Value>(payload_str) else {
        return String::new();
    };

    payload
        .get("https://api.openai.com/auth")
        .and_then(|auth| auth.get("chatgpt_account_id"))
        .and_then(|id| id.as_str())
        .unwrap_or("")
        .to_string()
}

/// Convert base64url encoding to standard base64 (with padding).
fn to_standard_base64(input: &str) -> String {
    let standard: String = input
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    match standard.len() % 4 {
        2 => format!("{standard}=="),
        3 => format!("{standard}="),
        _ => standard,
    }
}

/// OAuth token refresh response.
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Refresh `OpenAI` OAuth tokens using the `refresh_token` grant.
async fn refresh_tokens(
    tokens: &OAuthTokens,
    settings: &OpenAIApiSettings,
    client: &reqwest::Client,
) -> ProviderResult<OAuthTokens> {
    let token_url = settings.token_url.as_deref().unwrap_or(DEFAULT_TOKEN_URL);
    let client_id = settings.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID);

    info!("Refreshing OpenAI OAuth tokens");

    let body = serde_json::json!({
        "grant_type": "refresh_token",
        "refresh_token": tokens.refresh_token,
        "client_id": client_id,
    });

    let response = client
        .post(token_url)
        .header(CONTENT_TYPE, "application/json")
        .json(&body)
        .send()
        .await
        .map_err(ProviderError::Http)?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        return Err(ProviderError::Auth {
            message: format!("OpenAI token refresh failed: {status} - {error_text}"),
        });
    }

    let data: TokenResponse = response.json().await.map_err(ProviderError::Http)?;
    let expires_at = calculate_expires_at(data.expires_in, 0);

    Ok(OAuthTokens {
        access_token: data.access_token,
        refresh_token: data
            .refresh_token
            .unwrap_or_else(|| tokens.refresh_token.clone()),
        expires_at,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// `OpenAI` LLM provider for the Responses API (Codex endpoint).
pub struct OpenAIProvider {
    /// Provider configuration.
    config: OpenAIConfig,
    /// HTTP client (reused across requests).
    client: reqwest::Client,
    /// Resolved base URL.
    base_url: String,
    /// Mutable OAuth token state (refreshed before each request).
    tokens: tokio::sync::Mutex<OAuthTokens>,
}

impl OpenAIProvider {
    /// Create a new `OpenAI` provider.
    #[must_use]
    pub fn new(config: OpenAIConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a new `OpenAI` provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAIConfig, client: reqwest::Client) -> Self {
        let base_url = config
            .base_url
            .clone()
            .or_else(|| config.provider_settings.base_url.clone())
            .unwrap_or_else(|| super::types::DEFAULT_BASE_URL.to_string());

        let OpenAIAuth::OAuth { tokens } = &config.auth;
        let tokens = tokens.clone();

        info!(model = %config.model, base_url = %base_url, "OpenAI provider initialized");

        Self {
            config,
            client,
            base_url,
            tokens: tokio::sync::Mutex::new(tokens),
        }
    }

    /// Ensure OAuth tokens are valid, refreshing if necessary.
    async fn ensure_valid_tokens(&self) -> ProviderResult<()> {
        let mut tokens = self.tokens.lock().await;
        if should_refresh(&tokens, TOKEN_EXPIRY_BUFFER_MS) {
            let new_tokens =
                refresh_tokens(&tokens, &self.config.provider_settings, &self.client).await?;
            *tokens = new_tokens;
        }
        Ok(())
    }

    /// Build HTTP headers for the Responses API request.
    fn build_headers(tokens: &OAuthTokens) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", tokens.access_token);
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| ProviderError::Auth {
                message: format!("Invalid authorization header: {e}"),
            })?,
        );
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let _ = headers.insert(
            "openai-beta",
            HeaderValue::from_static("responses=experimental"),
        );
        let _ = headers.insert(
            "openai-originator",
            HeaderValue::from_static("codex_cli_rs"),
        );

        let account_id = extract_account_id(&tokens.access_token);
        if !account_id.is_empty() {
            if let Ok(val) = HeaderValue::from_str(&account_id) {
                let _ = headers.insert("chatgpt-account-id", val);
            }
        }

        Ok(headers)
    }

    /// Resolve the reasoning effort level: options -> config -> settings -> model default.
    fn resolve_reasoning_effort(&self, options: &ProviderStreamOptions) -> String {
        options
            .reasoning_effort
            .as_deref()
            .or(self.config.reasoning_effort.as_deref())
            .or(self
                .config
                .provider_settings
                .default_reasoning_effort
                .as_deref())
            .unwrap_or_else(|| {
                get_openai_model(&self.config.model).map_or("medium", |m| m.default_reasoning_level)
            })
            .to_string()
    }

    /// Determine if this is the first turn (no assistant messages in history yet).
    fn is_first_turn(messages: &[Message]) -> bool {
        !messages
            .iter()
            .any(|m| matches!(m, Message::Assistant { .. }))
    }

    /// Build the Responses API input array from the context.
    ///
    /// Converts messages, prepends a tool clarification on the first turn, and
    /// injects context parts (rules, memory, skills, tasks) as a developer
    /// message.
    fn build_input(context: &Context) -> Vec<ResponsesInputItem> {
        let mut input = convert_to_responses_input(&context.messages);

        if let Some(ref ctx_tools) = context.tools {
            if !ctx_tools.is_empty() && Self::is_first_turn(&context.messages) {
                let clarification = generate_tool_clarification_message(
                    ctx_tools,
                    context.working_directory.as_deref(),
                );
                input.insert(
                    0,
                    ResponsesInputItem::Message {
                        role: "user".into(),
                        content: vec![MessageContent::InputText {
                            text: clarification,
                        }],
                        id: None,
                    },
                );
                debug!("Prepended tool clarification message (first turn)");
            }
        }

        let context_parts = compose_context_parts(context);
        if !context_parts.is_empty() {
            input.insert(
                0,
                ResponsesInputItem::Message {
                    role: "developer".into(),
                    content: vec![MessageContent::InputText {
                        text: context_parts.join("\n\n"),
                    }],
                    id: None,
                },
            );
        }

        input
    }

    /// Build the full [`ResponsesRequest`] from context and options.
    fn build_request(&self, context: &Context, options: &ProviderStreamOptions) -> ResponsesRequest {
        let reasoning_effort = self.resolve_reasoning_effort(options);
        let input = Self::build_input(context);
        let tools = context.tools.as_ref().map(|t| convert_tools(t));

        ResponsesRequest {
            model: self.config.model.clone(),
            input,
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
            stream: true,
            store: false,
            temperature: options.temperature.or(self.config.temperature),
            tools,
            max_output_tokens: options.max_tokens.or(self.config.max_tokens),
            reasoning: Some(ReasoningConfig {
                effort: reasoning_effort,
                summary: "detailed".into(),
            }),
        }
    }

    /// Internal streaming implementation.
    async fn stream_internal(
        &self,
        context: &Context,
        options: &ProviderStreamOptions,
    ) -> ProviderResult<StreamEventStream> {
        debug!(
            model = %self.config.model,
            message_count = context.messages.len(),
            tool_count = context.tools.as_ref().map_or(0, Vec::len),
            "Starting OpenAI stream"
        );

        let tokens = self.tokens.lock().await;
        let headers = Self::build_headers(&tokens)?;
        drop(tokens);

        let request = self.build_request(context, options);
        let url = format!("{}/codex/responses", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(tron_core::retry::parse_retry_after_header);
            let body_text = response.text().await.unwrap_or_default();
            let (message, code, retryable) = parse_api_error(&body_text, status.as_u16());
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited {
                    retry_after_ms: retry_after.unwrap_or(0),
                    message,
                });
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
                code,
                retryable,
            });
        }

        let byte_stream = response.bytes_stream();
        let sse_lines = parse_sse_lines(byte_stream, &SSE_OPTIONS);

        let event_stream = sse_lines
            .scan(create_stream_state(), |state, line| {
                if line == "[DONE]" {
                    return std::future::ready(Some(vec![]));
                }
                let event: ResponsesSseEvent = match serde_json::from_str(&line) {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(line = %line, error = %e, "Failed to parse OpenAI SSE event");
                        return std::future::ready(Some(vec![]));
                    }
                };
                let events = process_stream_event(&event, state);
                std::future::ready(Some(events))
            })
            .flat_map(stream::iter)
            .map(Ok);

        Ok(Box::pin(event_stream))
    }
}

/// Parse an API error response body.
fn parse_api_error(body: &str, status: u16) -> (String, Option<String>, bool) {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        let message = error["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        let code = error["type"].as_str().map(String::from);
        let retryable = status == 429 || status >= 500;
        (message, code, retryable)
    } else {
        (
            format!("HTTP {status}: {body}"),
            None,
            status == 429 || status >= 500,
        )
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream(
        &self,
        context: &Context,
        options: &ProviderStreamOptions,
    ) -> ProviderResult<StreamEventStream> {
        self.ensure_valid_tokens().await?;

        let start_event = stream::once(async { Ok(StreamEvent::Start) });
        let inner_stream = self.stream_internal(context, options).await?;
        Ok(Box::pin(start_event.chain(inner_stream)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
