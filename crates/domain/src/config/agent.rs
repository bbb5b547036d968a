use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent orchestrator (§4.H)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Bounded tool-calling loop cap (spec default N = 20).
    #[serde(default = "d_max_loops")]
    pub max_loops: usize,
    /// Length (in chars) of the user-text prefix used to synthesize a
    /// session title on the first message.
    #[serde(default = "d_title_prefix_chars")]
    pub title_prefix_chars: usize,
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_loops: d_max_loops(),
            title_prefix_chars: d_title_prefix_chars(),
            system_prompt: d_system_prompt(),
        }
    }
}

fn d_max_loops() -> usize {
    20
}
fn d_title_prefix_chars() -> usize {
    60
}
fn d_system_prompt() -> String {
    "You are a data analyst assistant. Use the available tools to answer \
     questions about the business by querying the database read-only. \
     Never guess at numbers you have not queried."
        .into()
}
