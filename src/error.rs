//! Error types for the Haskell definition locator.

use thiserror::Error;

/// Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the locator.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Search Errors =====
    #[error("Search tool unavailable: {0}")]
    SearchToolUnavailable(String),

    #[error("Search tool failed (exit code {code:?}): {stderr}")]
    SearchToolFailed { code: Option<i32>, stderr: String },

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("Timeout: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Cancelled: operation was cancelled")]
    Cancelled,

    // ===== Request Errors =====
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("No workspace root configured for a cross-file search")]
    NoWorkspaceRoot,

    #[error("File not found: {0}")]
    FileNotFound(String),

    // ===== MCP Errors =====
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ===== Internal Errors =====
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Failures that void a single pattern search without affecting the
    /// rest of the request.
    pub fn is_pattern_local(&self) -> bool {
        matches!(
            self,
            Self::SearchToolFailed { .. } | Self::Timeout { .. } | Self::InvalidPattern(_)
        )
    }

    /// Check if the search engine itself could not be started.
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, Self::SearchToolUnavailable(_))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("search task failed: {}", err))
    }
}
