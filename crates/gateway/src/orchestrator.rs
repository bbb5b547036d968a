//! The agent orchestrator (SPEC_FULL.md §4.H): drives the LLM in a bounded
//! tool-calling loop over a durable session transcript, bridging the MCP
//! client (§4.F) into the hosted LLM API (§6).
//!
//! Grounded on the teacher's `runtime/turn.rs` (bounded-loop shape,
//! concurrent tool dispatch via `futures_util::future::join_all` to
//! preserve call order while latency is `max(tool_latencies)` rather than
//! the sum) and `api/chat.rs` (turn-invocation / response-assembly shape),
//! simplified to this spec's single-provider, non-streaming contract.

use futures_util::future::join_all;

use sa_domain::error::Result;
use sa_domain::model::StoredMessage;
use sa_domain::trace::TraceEvent;
use sa_providers::ChatRequest;
use sa_sessions::translate_transcript;

use crate::state::AppState;

/// One completed tool invocation, returned to the HTTP caller alongside the
/// final assistant text (§4.I `POST /sessions/{id}/messages`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: serde_json::Value,
    pub result: String,
}

/// Result of driving one user turn to completion (§4.H).
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnOutcome {
    pub assistant_text: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// A normalized tool_use the provider asked for this round.
struct PendingToolUse {
    call_id: String,
    tool_name: String,
    arguments: serde_json::Value,
}

/// Drive the bounded tool-calling loop for `session_id` given the caller's
/// newly-sent `user_text` (§4.H steps 1-5): persist the user message, loop
/// the LLM against the transcript for at most `max_loops` rounds, and
/// synthesize a title if this was the session's first message.
///
/// The email resolved for the session's owner is threaded into every MCP
/// tool call as `_meta.user_email` (§3 "MCP message") so ACL evaluation
/// runs as that user, not the process-wide fallback.
pub async fn handle_user_message(
    state: &AppState,
    session_id: &str,
    caller_email: &str,
    user_text: String,
) -> Result<TurnOutcome> {
    let is_first_message = state.docstore.list_messages(session_id).await?.is_empty();

    // Step 1: persist the user message.
    state
        .docstore
        .append_message(&StoredMessage::user(session_id, &user_text))
        .await?;

    let mut assistant_text = String::new();
    let mut tool_calls = Vec::new();
    let mut loop_budget_exceeded = true;

    for round in 0..state.config.agent.max_loops {
        // Steps 2/3: reload + translate the transcript every round, since
        // tool results persisted in the previous round must be visible.
        let transcript = state.docstore.list_messages(session_id).await?;
        let mut messages = vec![sa_domain::tool::Message::system(
            state.config.agent.system_prompt.clone(),
        )];
        messages.extend(translate_transcript(&transcript));

        let request = ChatRequest {
            messages,
            tools: state.mcp_client.tools_for_llm(),
            temperature: None,
            max_tokens: None,
            model: None,
        };

        // Step a: a per-round fatal LLM error surfaces to the caller.
        let response = state.llm.chat(&request).await?;

        // Step b: persist text and tool_use blocks as soon as they arrive.
        if !response.content.is_empty() {
            assistant_text = response.content.clone();
            state
                .docstore
                .append_message(&StoredMessage::assistant(session_id, &response.content))
                .await?;
        }
        let pending: Vec<PendingToolUse> = response
            .tool_calls
            .iter()
            .map(|tc| PendingToolUse {
                call_id: tc.call_id.clone(),
                tool_name: tc.tool_name.clone(),
                arguments: tc.arguments.clone(),
            })
            .collect();
        for tc in &pending {
            state
                .docstore
                .append_message(&StoredMessage::tool_use(
                    session_id,
                    &tc.call_id,
                    &tc.tool_name,
                    tc.arguments.clone(),
                ))
                .await?;
        }

        TraceEvent::AgentLoopRound {
            session_id: session_id.to_string(),
            round,
            tool_calls: pending.len(),
        }
        .emit();

        // Step c: stop on "end of turn" or when no tool_use blocks remain.
        let ended_turn = response
            .finish_reason
            .as_deref()
            .map(|r| r == "end_turn" || r == "stop")
            .unwrap_or(false);
        if ended_turn || pending.is_empty() {
            loop_budget_exceeded = false;
            break;
        }

        // Step d: dispatch every tool_use concurrently — latency is
        // max(tool_latencies), not their sum — preserving call order when
        // collecting results; a single tool failure becomes a synthetic
        // `Error: ...` result and the loop continues rather than crashing.
        let futures = pending
            .iter()
            .map(|tc| state.mcp_client.call_tool_as(&tc.tool_name, tc.arguments.clone(), Some(caller_email)));
        let results = join_all(futures).await;

        for (tc, result) in pending.iter().zip(results) {
            let text = match result {
                Ok(text) => text,
                Err(e) => format!("Error: {e}"),
            };
            state
                .docstore
                .append_message(&StoredMessage::tool_result(session_id, &tc.call_id, &text))
                .await?;
            tool_calls.push(ToolCallRecord {
                name: tc.tool_name.clone(),
                input: tc.arguments.clone(),
                result: text,
            });
        }
        // Step e: loop — the next iteration reloads + re-translates.
    }

    if loop_budget_exceeded {
        TraceEvent::AgentLoopBudgetExceeded {
            session_id: session_id.to_string(),
            rounds: state.config.agent.max_loops,
        }
        .emit();
    }

    // Step 5: synthesize a title from the first user message.
    if is_first_message {
        synthesize_title(state, session_id, &user_text).await?;
    }

    Ok(TurnOutcome {
        assistant_text,
        tool_calls,
    })
}

async fn synthesize_title(state: &AppState, session_id: &str, user_text: &str) -> Result<()> {
    let limit = state.config.agent.title_prefix_chars;
    let title: String = user_text.chars().take(limit).collect();
    let title = title.trim();
    if title.is_empty() {
        return Ok(());
    }
    state.docstore.set_session_title(session_id, title).await
}
