use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Document store adapter (§4.B)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocStoreConfig {
    #[serde(default)]
    pub uri: String,
    #[serde(default = "d_database")]
    pub database: String,
}

impl Default for DocStoreConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: d_database(),
        }
    }
}

fn d_database() -> String {
    "db_mcp_bridge".into()
}
