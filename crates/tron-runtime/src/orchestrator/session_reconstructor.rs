//! Session reconstructor — rebuild runtime state from event history.

use tron_core::messages::{Message, TokenUsage};
use tron_events::{EventStore, SessionState};

use crate::errors::RuntimeError;

/// Reconstructed session state for resuming.
#[derive(Clone, Debug, Default)]
pub struct ReconstructedState {
    /// Session model.
    pub model: String,
    /// Reconstructed messages.
    pub messages: Vec<Message>,
    /// Cumulative token usage.
    pub token_usage: TokenUsage,
    /// Turn count.
    pub turn_count: u32,
    /// Working directory.
    pub working_directory: Option<String>,
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Whether the session has ended.
    pub is_ended: bool,
}

/// Reconstruct session state from the event store.
pub fn reconstruct(event_store: &EventStore, session_id: &str) -> Result<ReconstructedState, RuntimeError> {
    let state = event_store
        .get_state_at_head(session_id)
        .map_err(|e| RuntimeError::Persistence(e.to_string()))?;

    Ok(from_session_state(&state))
}

/// Reconstruct session state as of a specific event, instead of the head.
pub fn reconstruct_at(event_store: &EventStore, event_id: &str) -> Result<ReconstructedState, RuntimeError> {
    let state = event_store
        .get_state_at(event_id)
        .map_err(|e| RuntimeError::Persistence(e.to_string()))?;

    Ok(from_session_state(&state))
}

/// Convert `SessionState` to `ReconstructedState`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn from_session_state(state: &SessionState) -> ReconstructedState {
    let messages: Vec<Message> = state
        .messages_with_event_ids
        .iter()
        .filter_map(|m| {
            serde_json::from_value(serde_json::to_value(&m.message).ok()?).ok()
        })
        .collect();

    let token_usage = TokenUsage {
        input_tokens: state.token_usage.input_tokens as u64,
        output_tokens: state.token_usage.output_tokens as u64,
        cache_read_tokens: state
            .token_usage
            .cache_read_tokens
            .filter(|&v| v > 0)
            .map(|v| v as u64),
        cache_creation_tokens: state
            .token_usage
            .cache_creation_tokens
            .filter(|&v| v > 0)
            .map(|v| v as u64),
        cache_creation_5m_tokens: state
            .token_usage
            .cache_creation_5m_tokens
            .filter(|&v| v > 0)
            .map(|v| v as u64),
        cache_creation_1h_tokens: state
            .token_usage
            .cache_creation_1h_tokens
            .filter(|&v| v > 0)
            .map(|v| v as u64),
        provider_type: None,
    };

    ReconstructedState {
        model: state.model.clone(),
        messages,
        token_usage,
        turn_count: state.turn_count as u32,
        working_directory: Some(state.working_directory.clone()),
        system_prompt: state.system_prompt.clone(),
        is_ended: state.is_ended.unwrap_or(false),
    }
}
