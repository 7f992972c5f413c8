//! Converts Tron messages and tools to the Gemini API wire format.
//!
//! Gemini addresses tool calls by function *name*, not by ID — unlike
//! Anthropic/OpenAI there is no tool-call-ID remapping to do here. A
//! `FunctionResponse` part only needs the original function name, which is
//! carried alongside the `tool_call_id` in the assistant message that made
//! the call.

use std::collections::HashMap;

use tron_core::content::{AssistantContent, ToolResultContent, UserContent};
use tron_core::messages::{Context, Message, ToolResultMessageContent, UserMessageContent};
use tron_core::tools::Tool;

use super::types::{
    FunctionCallData, FunctionDeclaration, FunctionResponseData, GeminiContent, GeminiPart,
    GeminiTool, InlineDataContent, TOOL_RESULT_MAX_LENGTH,
};

/// Convert the conversation history into Gemini `contents` entries.
///
/// Gemini has no distinct "tool" role: tool results are sent as a `user`
/// message containing a `functionResponse` part. The function name for
/// each tool result is looked up from the assistant's preceding
/// `tool_use` block by `tool_call_id`.
#[must_use]
pub fn convert_messages(context: &Context) -> Vec<GeminiContent> {
    let tool_names = collect_tool_call_names(&context.messages);

    context
        .messages
        .iter()
        .filter_map(|msg| convert_message(msg, &tool_names))
        .collect()
}

/// Convert Tron tools into Gemini function declarations.
#[must_use]
pub fn convert_tools(tools: &[Tool]) -> Vec<GeminiTool> {
    vec![GeminiTool {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: serde_json::to_value(&t.parameters).unwrap_or_default(),
            })
            .collect(),
    }]
}

fn collect_tool_call_names(messages: &[Message]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for msg in messages {
        if let Message::Assistant { content, .. } = msg {
            for block in content {
                if let AssistantContent::ToolUse { id, name, .. } = block {
                    names.insert(id.clone(), name.clone());
                }
            }
        }
    }
    names
}

fn convert_message(msg: &Message, tool_names: &HashMap<String, String>) -> Option<GeminiContent> {
    match msg {
        Message::User { content, .. } => Some(GeminiContent {
            role: "user".into(),
            parts: convert_user_content(content),
        }),
        Message::Assistant { content, .. } => {
            let parts = convert_assistant_content(content);
            if parts.is_empty() {
                return None;
            }
            Some(GeminiContent {
                role: "model".into(),
                parts,
            })
        }
        Message::ToolResult {
            tool_call_id,
            content,
            ..
        } => {
            let name = tool_names
                .get(tool_call_id)
                .cloned()
                .unwrap_or_else(|| tool_call_id.clone());
            Some(GeminiContent {
                role: "user".into(),
                parts: vec![GeminiPart::FunctionResponse {
                    function_response: FunctionResponseData {
                        name,
                        response: convert_tool_result_response(content),
                    },
                }],
            })
        }
    }
}

fn convert_user_content(content: &UserMessageContent) -> Vec<GeminiPart> {
    match content {
        UserMessageContent::Text(text) => vec![GeminiPart::Text {
            text: text.clone(),
            thought: None,
            thought_signature: None,
        }],
        UserMessageContent::Blocks(blocks) => blocks.iter().map(convert_user_block).collect(),
    }
}

fn convert_user_block(block: &UserContent) -> GeminiPart {
    match block {
        UserContent::Text { text } => GeminiPart::Text {
            text: text.clone(),
            thought: None,
            thought_signature: None,
        },
        UserContent::Image { data, mime_type } => GeminiPart::InlineData {
            inline_data: InlineDataContent {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
        },
        UserContent::Document {
            data, mime_type, ..
        } => GeminiPart::InlineData {
            inline_data: InlineDataContent {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
        },
    }
}

fn convert_assistant_content(content: &[AssistantContent]) -> Vec<GeminiPart> {
    content
        .iter()
        .map(|block| match block {
            AssistantContent::Text { text } => GeminiPart::Text {
                text: text.clone(),
                thought: None,
                thought_signature: None,
            },
            AssistantContent::Thinking {
                thinking,
                signature,
            } => GeminiPart::Text {
                text: thinking.clone(),
                thought: Some(true),
                thought_signature: signature.clone(),
            },
            AssistantContent::ToolUse {
                name,
                arguments,
                thought_signature,
                ..
            } => GeminiPart::FunctionCall {
                function_call: FunctionCallData {
                    name: name.clone(),
                    args: serde_json::Value::Object(arguments.clone()),
                },
                thought_signature: thought_signature.clone(),
            },
        })
        .collect()
}

fn convert_tool_result_response(content: &ToolResultMessageContent) -> serde_json::Value {
    let text = match content {
        ToolResultMessageContent::Text(text) => text.clone(),
        ToolResultMessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ToolResultContent::Text { text } => Some(text.as_str()),
                ToolResultContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let truncated = if text.len() > TOOL_RESULT_MAX_LENGTH {
        let mut t = text[..TOOL_RESULT_MAX_LENGTH].to_string();
        t.push_str("\n... [truncated]");
        t
    } else {
        text
    };

    serde_json::json!({ "result": truncated })
}
