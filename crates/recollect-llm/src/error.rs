//! Error types for generation backends.

use recollect_protocol::GenerationError;

/// Errors raised by the HTTP generation adapters.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Request could not be sent or the body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Backend refused to generate for this prompt.
    #[error("generation blocked: {0}")]
    Blocked(String),
    /// API key environment variable is unset or empty.
    #[error("missing API key: set {0}")]
    MissingApiKey(String),
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http(err) => GenerationError::Transport(err.to_string()),
            LlmError::Status { status, message } => GenerationError::Backend { status, message },
            LlmError::MalformedResponse(message) | LlmError::Blocked(message) => {
                GenerationError::MalformedResponse(message)
            }
            LlmError::MissingApiKey(name) => {
                GenerationError::Misconfigured(format!("missing API key: set {name}"))
            }
        }
    }
}
