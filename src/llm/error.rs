//! Error types for generation and embedding calls

/// Result type for model service calls
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Failures of the generation or embedding service itself.
///
/// These are call failures, not parsing problems: the pipeline treats every
/// variant as fatal.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("Request failed: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Service answered but carried no completion or vector
    #[error("Service returned an empty response")]
    EmptyResponse,

    /// Response body could not be decoded
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// Embedding length differs from the configured dimension count
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Client misconfiguration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}
