use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Hosted LLM API (§6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single OpenAI-compatible chat endpoint configuration.
///
/// Spec names one "hosted LLM API" (singular) — unlike the teacher's
/// multi-provider router, there is exactly one active provider here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Environment variable holding the API key (never stored in the file).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            model: d_model(),
            api_key_env: d_api_key_env(),
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
        }
    }
}

fn d_model() -> String {
    "gpt-4o".into()
}
fn d_api_key_env() -> String {
    "SA_LLM_API_KEY".into()
}
fn d_timeout_ms() -> u64 {
    60_000
}
fn d_max_retries() -> u32 {
    2
}
