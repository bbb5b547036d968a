//! `sa-providers` — the hosted LLM API seam (SPEC_FULL.md §4.H, §6).
//!
//! Spec names exactly one "hosted LLM API" (singular); unlike the teacher's
//! multi-vendor router (Anthropic/Bedrock/Google/smart-routing/classifier),
//! this crate keeps only [`LlmProvider`] and one concrete adapter against any
//! OpenAI-compatible chat-completions endpoint — the shape the orchestrator
//! actually depends on.

pub mod openai_compat;
pub mod traits;

pub use openai_compat::OpenAiCompatProvider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider, Usage};
