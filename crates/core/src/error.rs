//! Error types for the ragstream domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each pipeline stage has its own error enum; the top-level [`Error`]
//! only carries the failures that are fatal to a pipeline run.

use thiserror::Error;

/// The top-level error type for a pipeline run.
#[derive(Debug, Error)]
pub enum Error {
    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller cancelled the run.
    #[error("Pipeline run cancelled")]
    Cancelled,

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error came from caller cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Stage errors ---

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval store unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval store timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum RerankError {
    #[error("Reranker '{backend}' failed: {reason}")]
    Failed { backend: String, reason: String },

    #[error("Reranker '{backend}' timed out after {timeout_secs}s")]
    Timeout { backend: String, timeout_secs: u64 },

    #[error("Reranker '{0}' is not registered")]
    NotRegistered(String),

    #[error("All {attempts} rerankers failed")]
    AllRerankersFailed { attempts: usize },

    #[error("Reranking cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("Prompt template unavailable: {0}")]
    Unavailable(String),

    #[error("Prompt template failed to render: {0}")]
    Render(String),

    #[error("Prompt template produced no messages")]
    Empty,
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Generation backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    #[error("Generation stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Final generation result failed: {0}")]
    FinalResult(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The message is shown to the user verbatim.
    #[error("{message}")]
    Misconfigured { tool: String, message: String },

    #[error("Tool '{0}' is not available")]
    Unknown(String),
}

impl ToolError {
    /// Build a misconfiguration error naming the missing credential.
    pub fn missing_credential(tool: &str, key: &str) -> Self {
        ToolError::Misconfigured {
            tool: tool.to_string(),
            message: format!(
                "The {tool} tool is not configured: missing {key}. It was disabled for this response."
            ),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SerializationError {
    #[error("Payload is not valid JSON: {0}")]
    Invalid(String),

    #[error("Payload could not be recovered")]
    Unrecoverable,
}
