//! An [`LlmProvider`] adapter for any OpenAI-compatible chat-completions
//! endpoint (OpenAI itself, Azure OpenAI, vLLM, Ollama, Together, ...) —
//! the one concrete provider this crate ships (§6 "a messages endpoint with
//! tool-use semantics").
//!
//! Grounded on the teacher's `openai_compat.rs` adapter: request/response
//! (de)serialization helpers kept, but trimmed to the non-streaming
//! single-call contract [`LlmProvider::chat`] actually needs — the
//! orchestrator (§4.H) makes one blocking round trip per loop iteration, it
//! never consumes a token stream.

use sa_domain::error::{Error, Result};
use sa_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::Value;

use crate::traits::{ChatRequest, ChatResponse, LlmProvider, Usage};

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build a provider against `base_url` (e.g. `https://api.openai.com/v1`),
    /// authenticating with `api_key` (resolved by the caller from the
    /// environment variable named in `LlmConfig.api_key_env`, §6
    /// "Environment").
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("building llm http client: {e}")))?;
        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            client,
        })
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().flat_map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

// ── Message serialization ───────────────────────────────────────────

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Render one transcript message as zero or more OpenAI chat messages.
///
/// `translate_transcript` (§4.H step 3) coalesces a `tool_result`
/// immediately followed by the next `user` text into a single `User` turn
/// holding both a `ToolResult` part and a trailing `Text` part — and a run
/// of several consecutive tool results coalesces into one turn holding
/// several `ToolResult` parts (see `transcript.rs`'s
/// `consecutive_tool_results_coalesce_into_one_user_turn`). A strict
/// OpenAI-compatible endpoint needs each of those as its own `role:"tool"`
/// message, so any turn carrying `ToolResult` parts — regardless of its
/// transcript role — is expanded into one `tool` message per part plus a
/// trailing `user` message for any leftover text, instead of being folded
/// into a single message the way a plain text turn is.
fn msg_to_openai(msg: &Message) -> Vec<Value> {
    if msg.role == Role::Assistant {
        return vec![assistant_to_openai(msg)];
    }
    if let MessageContent::Parts(parts) = &msg.content {
        if parts.iter().any(|p| matches!(p, ContentPart::ToolResult { .. })) {
            return expand_tool_result_turn(msg.role, parts);
        }
    }
    vec![serde_json::json!({
        "role": role_to_str(msg.role),
        "content": msg.content.extract_all_text(),
    })]
}

/// Expand a turn holding one or more `ToolResult` parts (plus optional
/// trailing `Text` parts) into `role:"tool"` messages — one per
/// `tool_use_id`, in order — followed by a single `role:"user"` message for
/// any leftover text, when present.
fn expand_tool_result_turn(role: Role, parts: &[ContentPart]) -> Vec<Value> {
    let mut out = Vec::new();
    let mut text_parts: Vec<String> = Vec::new();
    for part in parts {
        match part {
            ContentPart::ToolResult { tool_use_id, content, .. } => {
                out.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content,
                }));
            }
            ContentPart::Text { text } => text_parts.push(text.clone()),
            _ => {}
        }
    }
    if !text_parts.is_empty() {
        out.push(serde_json::json!({
            "role": role_to_str(role),
            "content": text_parts.join("\n"),
        }));
    }
    out
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t.clone()),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string(),
                            }
                        }));
                    }
                    _ => {}
                }
            }
        }
    }

    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ── Response parsing ─────────────────────────────────────────────────

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::BackendFailure("llm response has no choices".into()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| Error::BackendFailure("llm choice has no message".into()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ChatResponse {
        content,
        tool_calls: parse_tool_calls(message),
        usage: body.get("usage").and_then(parse_usage),
        model,
        finish_reason,
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(arr) = message.get("tool_calls").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).unwrap_or(Value::Null);
            Some(ToolCall { call_id, tool_name, arguments })
        })
        .collect()
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ── Trait impl ───────────────────────────────────────────────────────

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req);

        tracing::debug!(provider = %self.id, %url, "llm chat request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("llm chat: {e}"))
                } else {
                    Error::BackendFailure(format!("llm chat: {e}"))
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::BackendFailure(format!("llm response body: {e}")))?;

        if !status.is_success() {
            return Err(Error::BackendFailure(format!(
                "llm HTTP {}: {text}",
                status.as_u16()
            )));
        }

        let json: Value = serde_json::from_str(&text).map_err(Error::Json)?;
        parse_chat_response(&json)
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_only_response() {
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {"role": "assistant", "content": "hello"},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12},
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.content, "hello");
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn parses_tool_call_response() {
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "query", "arguments": "{\"sql\":\"SELECT 1\"}"},
                    }],
                },
                "finish_reason": "tool_calls",
            }],
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].tool_name, "query");
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn missing_choices_is_backend_failure() {
        let body = serde_json::json!({"choices": []});
        assert!(parse_chat_response(&body).is_err());
    }

    #[test]
    fn assistant_message_with_tool_use_serializes_tool_calls() {
        let msg = Message {
            role: Role::Assistant,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "checking".into() },
                ContentPart::ToolUse {
                    id: "u1".into(),
                    name: "query".into(),
                    input: serde_json::json!({"sql": "SELECT 1"}),
                },
            ]),
        };
        let json = assistant_to_openai(&msg);
        assert_eq!(json["content"], "checking");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "query");
    }

    #[test]
    fn tool_result_message_carries_tool_call_id() {
        let msg = Message::tool_result("u1", "42");
        let expanded = msg_to_openai(&msg);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0]["role"], "tool");
        assert_eq!(expanded[0]["tool_call_id"], "u1");
        assert_eq!(expanded[0]["content"], "42");
    }

    #[test]
    fn coalesced_tool_results_expand_into_separate_tool_messages() {
        let msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::ToolResult {
                    tool_use_id: "u1".into(),
                    content: "a".into(),
                    is_error: false,
                },
                ContentPart::ToolResult {
                    tool_use_id: "u2".into(),
                    content: "b".into(),
                    is_error: false,
                },
            ]),
        };
        let expanded = msg_to_openai(&msg);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0]["role"], "tool");
        assert_eq!(expanded[0]["tool_call_id"], "u1");
        assert_eq!(expanded[0]["content"], "a");
        assert_eq!(expanded[1]["tool_call_id"], "u2");
        assert_eq!(expanded[1]["content"], "b");
    }

    #[test]
    fn tool_result_followed_by_user_text_keeps_both() {
        let msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::ToolResult {
                    tool_use_id: "u1".into(),
                    content: "1".into(),
                    is_error: false,
                },
                ContentPart::Text { text: "thanks".into() },
            ]),
        };
        let expanded = msg_to_openai(&msg);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0]["role"], "tool");
        assert_eq!(expanded[0]["tool_call_id"], "u1");
        assert_eq!(expanded[1]["role"], "user");
        assert_eq!(expanded[1]["content"], "thanks");
    }

    #[test]
    fn build_chat_body_expands_tool_result_turn_into_flat_message_list() {
        let provider = OpenAiCompatProvider::new("p", "http://x", "key", "gpt-4o", 1000).unwrap();
        let req = ChatRequest {
            messages: vec![
                Message::assistant("checking"),
                Message {
                    role: Role::User,
                    content: MessageContent::Parts(vec![ContentPart::ToolResult {
                        tool_use_id: "u1".into(),
                        content: "1".into(),
                        is_error: false,
                    }]),
                },
                Message::assistant("one"),
            ],
            tools: vec![],
            temperature: None,
            max_tokens: None,
            model: None,
        };
        let body = provider.build_chat_body(&req);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "tool");
        assert_eq!(messages[1]["tool_call_id"], "u1");
    }
}
