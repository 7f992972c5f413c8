//! `MiniMax` provider implementing the [`Provider`] trait.
//!
//! Uses `MiniMax`'s Anthropic-compatible endpoint with Bearer auth.
//! Reuses Anthropic message converter, stream handler, and SSE types.
//! No OAuth, no prompt caching, no image support, no adaptive thinking.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, error, instrument, warn};

use crate::anthropic::message_converter::convert_messages;
use crate::anthropic::message_sanitizer::sanitize_messages;
use crate::anthropic::stream_handler::{create_stream_state_for, process_sse_event};
use crate::anthropic::types::{
    AnthropicMessageParam, AnthropicRequest, AnthropicSseEvent, AnthropicTool,
};
use crate::models::types::ProviderType;
use crate::provider::{
    Provider, ProviderError, ProviderResult, ProviderStreamOptions, StreamEventStream,
};
use crate::sse::parse_sse_lines;
use crate::compose_context_parts;
use tron_core::events::StreamEvent;
use tron_core::messages::Context;

use super::types::{DEFAULT_BASE_URL, DEFAULT_MAX_OUTPUT_TOKENS, MiniMaxAuth, MiniMaxConfig, get_minimax_model};

/// API version header value (Anthropic-compatible).
const API_VERSION: &str = "2023-06-01";

/// Default SSE parser options.
static SSE_OPTIONS: crate::SseParserOptions = crate::SseParserOptions {
    process_remaining_buffer: true,
};

/// `MiniMax` LLM provider.
pub struct MiniMaxProvider {
    config: MiniMaxConfig,
    client: reqwest::Client,
}

impl MiniMaxProvider {
    /// Create a new `MiniMax` provider.
    #[must_use]
    pub fn new(config: MiniMaxConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new `MiniMax` provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: MiniMaxConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Build HTTP headers for the request.
    ///
    /// `MiniMax` uses Bearer auth (not x-api-key), no beta headers, no browser access.
    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        match &self.config.auth {
            MiniMaxAuth::ApiKey { api_key } => {
                let auth_value = format!("Bearer {api_key}");
                let _ = headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&auth_value).map_err(|e| ProviderError::Auth {
                        message: format!("Invalid API key header: {e}"),
                    })?,
                );
            }
        }

        Ok(headers)
    }

    /// Build the system prompt parameter — plain string, no cache breakpoints.
    fn build_system_param(context: &Context) -> Option<Value> {
        let parts = compose_context_parts(context);
        if parts.is_empty() {
            return None;
        }
        Some(json!(parts.join("\n\n")))
    }

    /// Build tool definitions without cache control.
    fn build_tools(context: &Context) -> Option<Vec<AnthropicTool>> {
        let tools = context.tools.as_ref()?;
        if tools.is_empty() {
            return None;
        }

        let anthropic_tools: Vec<AnthropicTool> = tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: serde_json::to_value(&t.parameters).unwrap_or_default(),
                cache_control: None,
            })
            .collect();

        Some(anthropic_tools)
    }

    /// Build thinking configuration — enabled only, never adaptive.
    fn build_thinking_config(options: &ProviderStreamOptions) -> Option<Value> {
        if options.enable_thinking != Some(true) {
            return None;
        }

        let budget = options.thinking_budget.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS / 4);
        Some(json!({
            "type": "enabled",
            "budget_tokens": budget,
        }))
    }

    /// Calculate `max_tokens`: options → config → model registry fallback.
    fn calculate_max_tokens(&self, options: &ProviderStreamOptions) -> u32 {
        options.max_tokens.unwrap_or_else(|| {
            self.config.max_tokens.unwrap_or_else(|| {
                get_minimax_model(&self.config.model)
                    .map_or(DEFAULT_MAX_OUTPUT_TOKENS, |m| m.max_output)
            })
        })
    }

    /// Strip image content blocks from messages (`MiniMax` doesn't support images).
    fn strip_images(messages: &mut [AnthropicMessageParam]) {
        let mut warned = false;
        for msg in messages.iter_mut() {
            let had_images = msg.content.len();
            msg.content.retain(|block| {
                block
                    .get("type")
                    .and_then(Value::as_str)
                    .is_none_or(|t| t != "image")
            });
            if !warned && msg.content.len() < had_images {
                warn!("Stripped image content blocks — MiniMax does not support images");
                warned = true;
            }
        }
    }

    /// Build the request body — no `output_config`, no `cache_control`.
    fn build_request(
        &self,
        context: &Context,
        options: &ProviderStreamOptions,
        messages: Vec<AnthropicMessageParam>,
    ) -> AnthropicRequest {
        AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.calculate_max_tokens(options),
            messages,
            system: Self::build_system_param(context),
            tools: Self::build_tools(context),
            stream: true,
            thinking: Self::build_thinking_config(options),
            output_config: None,
            stop_sequences: options.stop_sequences.clone(),
        }
    }

    /// Perform the streaming HTTP request and return the event stream.
    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn stream_internal(
        &self,
        context: &Context,
        options: &ProviderStreamOptions,
    ) -> ProviderResult<StreamEventStream> {
        let sanitized = sanitize_messages(context.messages.clone());
        let mut messages = convert_messages(&sanitized);

        // Strip images — MiniMax doesn't support them
        Self::strip_images(&mut messages);

        let request = self.build_request(context, options, messages);

        let base_url = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base_url}/v1/messages");

        let headers = self.build_headers()?;
        let body = serde_json::to_value(&request).map_err(ProviderError::Json)?;

        debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            message_count = request.messages.len(),
            has_tools = request.tools.is_some(),
            has_thinking = request.thinking.is_some(),
            "Sending MiniMax request"
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
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
            error!(
                status = status.as_u16(),
                code = code.as_deref().unwrap_or("unknown"),
                retryable,
                "MiniMax API error"
            );
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

        // Parse SSE stream — reuse Anthropic stream handler with MiniMax provider type
        let byte_stream = response.bytes_stream();
        let sse_lines = parse_sse_lines(byte_stream, &SSE_OPTIONS);

        let event_stream = sse_lines
            .scan(
                create_stream_state_for(tron_core::messages::ProviderType::MiniMax),
                |state, line| {
                    let event: AnthropicSseEvent = match serde_json::from_str(&line) {
                        Ok(e) => e,
                        Err(e) => {
                            warn!(line = %line, error = %e, "Failed to parse MiniMax SSE event");
                            return std::future::ready(Some(vec![]));
                        }
                    };

                    let events = process_sse_event(&event, state);
                    std::future::ready(Some(events))
                },
            )
            .flat_map(stream::iter)
            .map(Ok);

        Ok(Box::pin(event_stream))
    }
}

/// Parse an API error response body.
fn parse_api_error(body: &str, status: u16) -> (String, Option<String>, bool) {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
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
impl Provider for MiniMaxProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::MiniMax
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "minimax", model = %self.config.model))]
    async fn stream(
        &self,
        context: &Context,
        options: &ProviderStreamOptions,
    ) -> ProviderResult<StreamEventStream> {
        debug!(message_count = context.messages.len(), "starting stream");
        let start_event = stream::once(async { Ok(StreamEvent::Start) });
        let inner_stream = match self.stream_internal(context, options).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "MiniMax stream failed");
                return Err(e);
            }
        };
        Ok(Box::pin(start_event.chain(inner_stream)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
