//! Translate a stored transcript into the LLM's message format (§4.H step
//! 3), applying the exact coalescing rules:
//!
//! - `user` text → a user turn with a text block.
//! - `assistant` text → an assistant turn with a text block.
//! - `tool_use` → attaches to the *current* assistant turn (coalescing with
//!   the preceding assistant text); never appears on a user turn.
//! - `tool_result` → attaches to the *current* user turn (coalescing with
//!   the following user text); never appears on an assistant turn.
//!
//! A `tool_use` immediately followed by its `tool_result` thus produces
//! `(assistant{text, tool_use})(user{tool_result})` — spec.md's own worked
//! example, reproduced as a test below.

use sa_domain::model::{MessageRole, StoredMessage};
use sa_domain::tool::{ContentPart, Message, MessageContent, Role};

struct OpenTurn {
    role: Role,
    parts: Vec<ContentPart>,
}

impl OpenTurn {
    fn into_message(self) -> Message {
        let content = if self.parts.len() == 1 {
            match &self.parts[0] {
                ContentPart::Text { text } => MessageContent::Text(text.clone()),
                _ => MessageContent::Parts(self.parts),
            }
        } else {
            MessageContent::Parts(self.parts)
        };
        Message {
            role: self.role,
            content,
        }
    }
}

/// Translate an ordered transcript into the LLM's message list.
pub fn translate_transcript(messages: &[StoredMessage]) -> Vec<Message> {
    let mut output = Vec::new();
    let mut current: Option<OpenTurn> = None;

    for msg in messages {
        match msg.role {
            MessageRole::User => {
                match &mut current {
                    Some(turn) if turn.role == Role::User => {
                        turn.parts.push(ContentPart::Text {
                            text: msg.content.clone(),
                        });
                    }
                    _ => {
                        flush(&mut current, &mut output);
                        current = Some(OpenTurn {
                            role: Role::User,
                            parts: vec![ContentPart::Text {
                                text: msg.content.clone(),
                            }],
                        });
                    }
                }
            }
            MessageRole::Assistant => {
                match &mut current {
                    Some(turn) if turn.role == Role::Assistant => {
                        turn.parts.push(ContentPart::Text {
                            text: msg.content.clone(),
                        });
                    }
                    _ => {
                        flush(&mut current, &mut output);
                        current = Some(OpenTurn {
                            role: Role::Assistant,
                            parts: vec![ContentPart::Text {
                                text: msg.content.clone(),
                            }],
                        });
                    }
                }
            }
            MessageRole::ToolUse => {
                let part = ContentPart::ToolUse {
                    id: msg.tool_use_id.clone().unwrap_or_default(),
                    name: msg.tool_name.clone().unwrap_or_default(),
                    input: msg.tool_input.clone().unwrap_or(serde_json::Value::Null),
                };
                match &mut current {
                    Some(turn) if turn.role == Role::Assistant => turn.parts.push(part),
                    _ => {
                        flush(&mut current, &mut output);
                        current = Some(OpenTurn {
                            role: Role::Assistant,
                            parts: vec![part],
                        });
                    }
                }
            }
            MessageRole::ToolResult => {
                let part = ContentPart::ToolResult {
                    tool_use_id: msg.tool_use_id.clone().unwrap_or_default(),
                    content: msg.content.clone(),
                    is_error: false,
                };
                match &mut current {
                    Some(turn) if turn.role == Role::User => turn.parts.push(part),
                    _ => {
                        flush(&mut current, &mut output);
                        current = Some(OpenTurn {
                            role: Role::User,
                            parts: vec![part],
                        });
                    }
                }
            }
        }
    }
    flush(&mut current, &mut output);
    output
}

fn flush(current: &mut Option<OpenTurn>, output: &mut Vec<Message>) {
    if let Some(turn) = current.take() {
        output.push(turn.into_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_user_then_assistant() {
        let messages = vec![
            StoredMessage::user("s1", "hi"),
            StoredMessage::assistant("s1", "hello"),
        ];
        let translated = translate_transcript(&messages);
        assert_eq!(translated.len(), 2);
        assert_eq!(translated[0].role, Role::User);
        assert_eq!(translated[0].content.text(), Some("hi"));
        assert_eq!(translated[1].role, Role::Assistant);
        assert_eq!(translated[1].content.text(), Some("hello"));
    }

    #[test]
    fn tool_use_followed_by_tool_result_matches_spec_example() {
        let messages = vec![
            StoredMessage::user("s1", "hi"),
            StoredMessage::assistant("s1", "checking"),
            StoredMessage::tool_use("s1", "u1", "query", serde_json::json!({"sql": "SELECT 1"})),
            StoredMessage::tool_result("s1", "u1", "1"),
            StoredMessage::assistant("s1", "one"),
        ];
        let translated = translate_transcript(&messages);

        assert_eq!(translated.len(), 4);
        assert_eq!(translated[0].role, Role::User);
        assert_eq!(translated[1].role, Role::Assistant);
        match &translated[1].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], ContentPart::Text { .. }));
                assert!(matches!(parts[1], ContentPart::ToolUse { .. }));
            }
            other => panic!("expected Parts, got {other:?}"),
        }
        assert_eq!(translated[2].role, Role::User);
        match &translated[2].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], ContentPart::ToolResult { .. }));
            }
            other => panic!("expected Parts, got {other:?}"),
        }
        assert_eq!(translated[3].role, Role::Assistant);
        assert_eq!(translated[3].content.text(), Some("one"));
    }

    #[test]
    fn empty_transcript_translates_to_empty() {
        assert!(translate_transcript(&[]).is_empty());
    }

    #[test]
    fn consecutive_tool_results_coalesce_into_one_user_turn() {
        let messages = vec![
            StoredMessage::tool_use("s1", "u1", "query", serde_json::json!({})),
            StoredMessage::tool_use("s1", "u2", "query", serde_json::json!({})),
            StoredMessage::tool_result("s1", "u1", "a"),
            StoredMessage::tool_result("s1", "u2", "b"),
        ];
        let translated = translate_transcript(&messages);
        assert_eq!(translated.len(), 2);
        match &translated[1].content {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected Parts, got {other:?}"),
        }
    }
}
