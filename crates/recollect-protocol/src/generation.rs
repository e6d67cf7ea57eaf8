//! Text generation capability shared by every memory component.

use thiserror::Error;

/// Errors returned by generation backends.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Backend could not be reached or the transport failed.
    #[error("generation transport failed: {0}")]
    Transport(String),
    /// Backend answered with an error status.
    #[error("generation backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    /// Backend answered but the payload had no usable text.
    #[error("generation response malformed: {0}")]
    MalformedResponse(String),
    /// Adapter is missing required settings (model, credentials).
    #[error("generation backend misconfigured: {0}")]
    Misconfigured(String),
}

/// Prompt-in, text-out model access.
///
/// Calls block until the backend answers. Implementations own their
/// transport and credentials; callers only choose the model name.
pub trait GenerationGateway: Send + Sync {
    /// Generate a completion for `prompt` with the named model.
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}
