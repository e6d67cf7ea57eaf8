/// Errors raised while dispatching model-requested function calls.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Function name is not registered.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    /// Function received invalid arguments.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}
