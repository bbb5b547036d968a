/// Shared error type used across all db-mcp-bridge crates.
///
/// Ambient variants (`Io`, `Json`, `Http`, `Timeout`, `Config`, `Other`) carry
/// over from the rest of the stack; the domain-specific variants map
/// directly onto the error kinds in SPEC_FULL.md §7.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid or expired token")]
    AuthInvalid,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("backend failure: {0}")]
    BackendFailure(String),

    #[error("loop budget exceeded")]
    LoopBudgetExceeded { partial_text: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The HTTP status this error maps to at the outer edge (§7).
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AuthRequired | Error::AuthInvalid => 401,
            Error::AccessDenied(_) => 403,
            Error::NotFound(_) => 404,
            Error::ValidationError(_) => 400,
            Error::LoopBudgetExceeded { .. } => 200,
            _ => 500,
        }
    }

    /// Render as the textual body of an MCP `isError: true` tool result.
    pub fn to_mcp_message(&self) -> String {
        match self {
            Error::AuthRequired => "authentication required".to_string(),
            Error::AuthInvalid => "invalid or expired token".to_string(),
            Error::AccessDenied(reason) => reason.clone(),
            Error::NotFound(what) => format!("not found: {what}"),
            Error::ValidationError(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
