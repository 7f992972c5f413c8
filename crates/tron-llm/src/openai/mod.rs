//! `OpenAI` LLM provider implementation.

pub mod message_converter;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::OpenAIProvider;
pub use types::{OpenAIAuth, OpenAIConfig};
