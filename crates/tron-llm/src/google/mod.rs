//! Google/Gemini LLM provider implementation.

pub mod message_converter;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::GoogleProvider;
pub use types::{GoogleAuth, GoogleConfig};
