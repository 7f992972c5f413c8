//! # tron-llm
//!
//! LLM provider trait and shared streaming utilities.
//!
//! Defines the `Provider` trait that all LLM backends implement:
//! - Shared SSE parser (handles Anthropic / `OpenAI` / Google format differences)
//! - Stream retry with exponential backoff + jitter
//! - Tool call JSON parsing from incremental deltas
//! - ID remapping utilities
//! - Model registry: `model_id -> ModelInfo { context_window, max_output, pricing, capabilities }`
//! - Provider factory: `create_provider(config) -> Box<dyn Provider>`

#![deny(unsafe_code)]

pub mod anthropic;
pub mod auth;
pub mod context_composition;
pub mod error_parsing;
pub mod google;
pub mod health;
pub mod id_remapping;
pub mod minimax;
pub mod models;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod sse;
pub mod stream_pipeline;
pub mod tokens;
pub mod tool_parsing;

pub use context_composition::{compose_context_parts, compose_context_parts_grouped};
pub use health::ProviderHealthTracker;
pub use sse::SseParserOptions;
