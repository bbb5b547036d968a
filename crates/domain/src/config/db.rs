use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relational pool (§4.A)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the bounded read-only Postgres pool.
///
/// `url` is normally supplied via the `SA_DATABASE_URL` environment
/// variable rather than committed to the config file; the field is kept
/// here so the same `Config::validate()` pass can check it regardless of
/// where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "d_max_connections")]
    pub max_connections: u32,
    #[serde(default = "d_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "d_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: d_max_connections(),
            acquire_timeout_ms: d_acquire_timeout_ms(),
            idle_timeout_ms: d_idle_timeout_ms(),
        }
    }
}

fn d_max_connections() -> u32 {
    10
}
fn d_acquire_timeout_ms() -> u64 {
    5_000
}
fn d_idle_timeout_ms() -> u64 {
    10 * 60 * 1000
}
