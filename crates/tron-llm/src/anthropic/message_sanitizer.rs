//! Sanitizes a message history before it is sent to the Anthropic API.
//!
//! The Messages API rejects a `tool_result` block whose `tool_use_id` has no
//! matching `tool_use` block earlier in the conversation, and rejects empty
//! assistant messages. Both can happen after compaction or when switching
//! providers mid-session, so this pass repairs the history rather than
//! letting the request fail outright.

use std::collections::HashSet;

use tron_core::content::AssistantContent;
use tron_core::messages::{Message, ToolResultMessageContent};

/// Drop orphaned tool results and empty assistant messages.
#[must_use]
pub fn sanitize_messages(messages: Vec<Message>) -> Vec<Message> {
    let mut known_tool_call_ids: HashSet<String> = HashSet::new();
    let mut sanitized = Vec::with_capacity(messages.len());

    for msg in messages {
        match &msg {
            Message::Assistant { content, .. } => {
                if content.is_empty() {
                    continue;
                }
                for block in content {
                    if let AssistantContent::ToolUse { id, .. } = block {
                        known_tool_call_ids.insert(id.clone());
                    }
                }
                sanitized.push(msg);
            }
            Message::ToolResult { tool_call_id, .. } => {
                if known_tool_call_ids.contains(tool_call_id) {
                    sanitized.push(msg);
                }
            }
            Message::User { content, .. } => {
                if is_empty_text(content) {
                    continue;
                }
                sanitized.push(msg);
            }
        }
    }

    sanitized
}

fn is_empty_text(content: &tron_core::messages::UserMessageContent) -> bool {
    matches!(
        content,
        tron_core::messages::UserMessageContent::Text(text) if text.is_empty()
    )
}
