//! Error types for the PipeAgent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`Error`] is what a turn of
//! the agent loop terminates with.

use thiserror::Error;

/// The terminal error of an agent turn.
///
/// The `Display` text of every variant is what the user sees, both in the
/// alert banner and as the turn's final `agent` message.
#[derive(Debug, Error)]
pub enum Error {
    // --- Authentication ---
    #[error(transparent)]
    Auth(#[from] AuthError),

    // --- Provider errors ---
    #[error(transparent)]
    Provider(#[from] ProviderError),

    // --- Loop budget ---
    #[error("Loop budget exceeded: {reason}")]
    LoopBudgetExceeded { iterations: u32, reason: String },
}

/// Alias used by the agent loop for its terminal outcome.
pub type AgentError = Error;

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error should be mirrored into the transcript.
    ///
    /// A missing token aborts the turn before anything is sent, so nothing
    /// is appended for it.
    pub fn is_transcript_visible(&self) -> bool {
        !matches!(self, Error::Auth(_))
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authentication required: no token available")]
    TokenMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request never produced a usable HTTP exchange.
    #[error("LLM error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("API error: {message}")]
    Api { status_code: u16, message: String },

    /// The chat-completions body could not be decoded.
    #[error("Response not JSON: {0}")]
    NotJson(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("{0}")]
    Request(String),

    #[error("{0}")]
    Evaluation(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}
