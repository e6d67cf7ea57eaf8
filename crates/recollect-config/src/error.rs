use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a usable [`RecollectConfig`](crate::RecollectConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    /// Layer is not valid JSON5.
    #[error("config syntax error: {0}")]
    Syntax(#[from] json5::Error),
    #[error("config decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// An override layer was requested explicitly but is absent.
    #[error("override config {} does not exist", path.display())]
    MissingOverride { path: PathBuf },
    /// `location` is `<layer>:<dotted.key>`.
    #[error("invalid config at {location}: {message}")]
    Schema { location: String, message: String },
    #[error("invalid config: {0}")]
    Invariant(String),
}
