//! Hook context factory.
//!
//! Provides a trait and default implementation for creating typed
//! [`HookContext`] instances. The factory automatically populates session ID
//! and timestamps, so callers only need to provide event-specific data.

use chrono::Utc;

use super::types::HookContext;

/// Factory for creating [`HookContext`] instances.
///
/// Implementations are scoped to a session â€” the `session_id` is set once
/// and used for all created contexts. Timestamps are generated automatically.
pub trait HookContextFactory: Send + Sync {
    /// Create a [`HookContext::PreToolUse`] context.
    fn create_pre_tool_context(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        tool_call_id: &str,
    ) -> HookContext;

    /// Create a [`HookContext::PostToolUse`] context.
    fn create_post_tool_context(
        &self,
        tool_name: &str,
        tool_call_id: &str,
        result: serde_json::Value,
        duration_ms: u64,
    ) -> HookContext;

    /// Create a [`HookContext::Stop`] context.
    fn create_stop_context(
        &self,
        stop_reason: &str,
        final_message: Option<&str>,
    ) -> HookContext;

    /// Create a [`HookContext::SessionStart`] context.
    fn create_session_start_context(
        &self,
        working_directory: &str,
        parent_handoff_id: Option<&str>,
    ) -> HookContext;

    /// Create a [`HookContext::SessionEnd`] context.
    fn create_session_end_context(
        &self,
        message_count: u64,
        tool_call_count: u64,
    ) -> HookContext;

    /// Create a [`HookContext::UserPromptSubmit`] context.
    fn create_user_prompt_submit_context(&self, prompt: &str) -> HookContext;

    /// Create a [`HookContext::SubagentStop`] context.
    fn create_subagent_stop_context(
        &self,
        subagent_id: &str,
        stop_reason: &str,
        result: Option<serde_json::Value>,
    ) -> HookContext;

    /// Create a [`HookContext::PreCompact`] context.
    fn create_pre_compact_context(
        &self,
        current_tokens: u64,
        target_tokens: u64,
    ) -> HookContext;

    /// Create a [`HookContext::Notification`] context.
    fn create_notification_context(
        &self,
        level: &str,
        title: &str,
        body: Option<&str>,
    ) -> HookContext;
}

/// Default implementation of [`HookContextFactory`].
///
/// Scoped to a single session. Timestamps use UTC ISO 8601 format.
#[derive(Debug, Clone)]
pub struct DefaultContextFactory {
    session_id: String,
}

impl DefaultContextFactory {
    /// Create a new factory scoped to a session.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }
}

impl HookContextFactory for DefaultContextFactory {
    fn create_pre_tool_context(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        tool_call_id: &str,
    ) -> HookContext {
        HookContext::PreToolUse {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            tool_name: tool_name.to_string(),
            tool_arguments: arguments,
            tool_call_id: tool_call_id.to_string(),
        }
    }

    fn create_post_tool_context(
        &self,
        tool_name: &str,
        tool_call_id: &str,
        result: serde_json::Value,
        duration_ms: u64,
    ) -> HookContext {
        HookContext::PostToolUse {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            tool_name: tool_name.to_string(),
            tool_call_id: tool_call_id.to_string(),
            result,
            duration_ms,
        }
    }

    fn create_stop_context(
        &self,
        stop_reason: &str,
        final_message: Option<&str>,
    ) -> HookContext {
        HookContext::Stop {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            stop_reason: stop_reason.to_string(),
            final_message: final_message.map(ToString::to_string),
        }
    }

    fn create_session_start_context(
        &self,
        working_directory: &str,
        parent_handoff_id: Option<&str>,
    ) -> HookContext {
        HookContext::SessionStart {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            working_directory: working_directory.to_string(),
            parent_handoff_id: parent_handoff_id.map(ToString::to_string),
        }
    }

    fn create_session_end_context(
        &self,
        message_count: u64,
        tool_call_count: u64,
    ) -> HookContext {
        HookContext::SessionEnd {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            message_count,
            tool_call_count,
        }
    }

    fn create_user_prompt_submit_context(&self, prompt: &str) -> HookContext {
        HookContext::UserPromptSubmit {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            prompt: prompt.to_string(),
        }
    }

    fn create_subagent_stop_context(
        &self,
        subagent_id: &str,
        stop_reason: &str,
        result: Option<serde_json::Value>,
    ) -> HookContext {
        HookContext::SubagentStop {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            subagent_id: subagent_id.to_string(),
            stop_reason: stop_reason.to_string(),
            result,
        }
    }

    fn create_pre_compact_context(
        &self,
        current_tokens: u64,
        target_tokens: u64,
    ) -> HookContext {
        HookContext::PreCompact {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            current_tokens,
            target_tokens,
        }
    }

    fn create_notification_context(
        &self,
        level: &str,
        title: &str,
        body: Option<&str>,
    ) -> HookContext {
        HookContext::Notification {
            session_id: self.session_id.clone(),
            timestamp: Self::now(),
            level: level.to_string(),
            title: title.to_string(),
            body: body.map(ToString::to_string),
        }
    }
}
