//! Converts Tron messages to the Anthropic Messages API wire format.
//!
//! Anthropic's `content` array holds opaque JSON blocks (`text`, `image`,
//! `document`, `tool_use`, `tool_result`), so each block is built as a
//! [`serde_json::Value`] rather than a typed enum. Tool call IDs are
//! remapped to the `toolu_` format when a conversation was started under a
//! different provider.

use serde_json::{json, Value};

use tron_core::content::{AssistantContent, ToolResultContent, UserContent};
use tron_core::messages::{Message, ToolResultMessageContent, UserMessageContent};

use crate::{build_tool_call_id_mapping, remap_tool_call_id, IdFormat};

use super::types::AnthropicMessageParam;

/// Convert Tron messages to Anthropic `messages` array entries.
///
/// Consecutive blocks belonging to the same role are NOT merged across
/// distinct [`Message`] entries — each input message maps to exactly one
/// output message, mirroring how the conversation was recorded.
#[must_use]
pub fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessageParam> {
    let all_tool_call_ids = collect_tool_call_ids(messages);
    let id_refs: Vec<&str> = all_tool_call_ids.iter().map(String::as_str).collect();
    let id_mapping = build_tool_call_id_mapping(&id_refs, IdFormat::Anthropic);

    messages
        .iter()
        .map(|msg| convert_message(msg, &id_mapping))
        .collect()
}

fn collect_tool_call_ids(messages: &[Message]) -> Vec<String> {
    let mut ids = Vec::new();
    for msg in messages {
        if let Message::Assistant { content, .. } = msg {
            for block in content {
                if let AssistantContent::ToolUse { id, .. } = block {
                    ids.push(id.clone());
                }
            }
        }
    }
    ids
}

fn convert_message(
    msg: &Message,
    id_mapping: &std::collections::HashMap<String, String>,
) -> AnthropicMessageParam {
    match msg {
        Message::User { content, .. } => AnthropicMessageParam {
            role: "user".into(),
            content: convert_user_content(content),
        },
        Message::Assistant { content, .. } => AnthropicMessageParam {
            role: "assistant".into(),
            content: convert_assistant_content(content, id_mapping),
        },
        Message::ToolResult {
            tool_call_id,
            content,
            is_error,
        } => {
            let remapped_id = remap_tool_call_id(tool_call_id, id_mapping).to_string();
            AnthropicMessageParam {
                role: "user".into(),
                content: vec![convert_tool_result(&remapped_id, content, *is_error)],
            }
        }
    }
}

fn convert_user_content(content: &UserMessageContent) -> Vec<Value> {
    match content {
        UserMessageContent::Text(text) => vec![json!({"type": "text", "text": text})],
        UserMessageContent::Blocks(blocks) => blocks.iter().map(convert_user_block).collect(),
    }
}

fn convert_user_block(block: &UserContent) -> Value {
    match block {
        UserContent::Text { text } => json!({"type": "text", "text": text}),
        UserContent::Image { data, mime_type } => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": mime_type,
                "data": data,
            },
        }),
        UserContent::Document {
            data,
            mime_type,
            file_name,
        } => {
            let mut block = json!({
                "type": "document",
                "source": {
                    "type": "base64",
                    "media_type": mime_type,
                    "data": data,
                },
            });
            if let Some(name) = file_name {
                block["title"] = json!(name);
            }
            block
        }
    }
}

fn convert_assistant_content(
    content: &[AssistantContent],
    id_mapping: &std::collections::HashMap<String, String>,
) -> Vec<Value> {
    content
        .iter()
        .map(|block| match block {
            AssistantContent::Text { text } => json!({"type": "text", "text": text}),
            AssistantContent::Thinking { thinking, signature } => {
                let mut block = json!({"type": "thinking", "thinking": thinking});
                if let Some(sig) = signature {
                    block["signature"] = json!(sig);
                }
                block
            }
            AssistantContent::ToolUse {
                id,
                name,
                arguments,
                ..
            } => {
                let remapped_id = remap_tool_call_id(id, id_mapping).to_string();
                json!({
                    "type": "tool_use",
                    "id": remapped_id,
                    "name": name,
                    "input": arguments,
                })
            }
        })
        .collect()
}

fn convert_tool_result(
    tool_call_id: &str,
    content: &ToolResultMessageContent,
    is_error: Option<bool>,
) -> Value {
    let result_content = match content {
        ToolResultMessageContent::Text(text) => json!(text),
        ToolResultMessageContent::Blocks(blocks) => {
            let parts: Vec<Value> = blocks
                .iter()
                .map(|block| match block {
                    ToolResultContent::Text { text } => json!({"type": "text", "text": text}),
                    ToolResultContent::Image { data, mime_type } => json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": mime_type,
                            "data": data,
                        },
                    }),
                })
                .collect();
            json!(parts)
        }
    };

    let mut block = json!({
        "type": "tool_result",
        "tool_use_id": tool_call_id,
        "content": result_content,
    });
    if is_error == Some(true) {
        block["is_error"] = json!(true);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn converts_plain_user_text() {
        let messages = vec![Message::user("hello")];
        let converted = convert_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[0].content[0]["text"], "hello");
    }

    #[test]
    fn converts_assistant_text_and_tool_use() {
        let mut args = Map::new();
        args.insert("path".into(), json!("/f.txt"));
        let messages = vec![Message::Assistant {
            content: vec![
                AssistantContent::text("Reading..."),
                AssistantContent::ToolUse {
                    id: "toolu_01abc".into(),
                    name: "read".into(),
                    arguments: args,
                    thought_signature: None,
                },
            ],
            usage: None,
            cost: None,
            stop_reason: None,
            thinking: None,
        }];
        let converted = convert_messages(&messages);
        assert_eq!(converted[0].role, "assistant");
        assert_eq!(converted[0].content[1]["type"], "tool_use");
        assert_eq!(converted[0].content[1]["id"], "toolu_01abc");
    }

    #[test]
    fn converts_tool_result_to_user_message() {
        let messages = vec![Message::ToolResult {
            tool_call_id: "toolu_01abc".into(),
            content: ToolResultMessageContent::Text("done".into()),
            is_error: None,
        }];
        let converted = convert_messages(&messages);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[0].content[0]["type"], "tool_result");
        assert_eq!(converted[0].content[0]["tool_use_id"], "toolu_01abc");
        assert_eq!(converted[0].content[0]["content"], "done");
    }

    #[test]
    fn tool_result_error_flag_set() {
        let messages = vec![Message::ToolResult {
            tool_call_id: "toolu_01abc".into(),
            content: ToolResultMessageContent::Text("boom".into()),
            is_error: Some(true),
        }];
        let converted = convert_messages(&messages);
        assert_eq!(converted[0].content[0]["is_error"], true);
    }

    #[test]
    fn remaps_openai_tool_call_ids_to_anthropic_format() {
        let mut args = Map::new();
        args.insert("q".into(), json!("x"));
        let messages = vec![
            Message::Assistant {
                content: vec![AssistantContent::ToolUse {
                    id: "call_abc".into(),
                    name: "search".into(),
                    arguments: args,
                    thought_signature: None,
                }],
                usage: None,
                cost: None,
                stop_reason: None,
                thinking: None,
            },
            Message::ToolResult {
                tool_call_id: "call_abc".into(),
                content: ToolResultMessageContent::Text("result".into()),
                is_error: None,
            },
        ];
        let converted = convert_messages(&messages);
        let tool_use_id = converted[0].content[0]["id"].as_str().unwrap().to_string();
        assert!(tool_use_id.starts_with("toolu_"));
        assert_eq!(converted[1].content[0]["tool_use_id"], tool_use_id);
    }

    #[test]
    fn converts_image_user_block() {
        let messages = vec![Message::User {
            content: UserMessageContent::Blocks(vec![UserContent::image("b64", "image/png")]),
            timestamp: None,
        }];
        let converted = convert_messages(&messages);
        assert_eq!(converted[0].content[0]["type"], "image");
        assert_eq!(converted[0].content[0]["source"]["media_type"], "image/png");
    }

    #[test]
    fn empty_messages_returns_empty() {
        assert!(convert_messages(&[]).is_empty());
    }
}
