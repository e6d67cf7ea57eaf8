//! HTTP generation backends for Recollect.
//!
//! Each backend implements [`GenerationGateway`]; [`gateway_from_config`]
//! picks one from `llm.provider`.

mod error;
mod gemini;
mod ollama;
mod transport;

/// Adapter error type.
pub use error::LlmError;
/// Gemini REST adapter.
pub use gemini::{GEMINI_ENDPOINT, GeminiGateway};
/// Ollama adapter.
pub use ollama::{OLLAMA_ENDPOINT, OllamaGateway};

use log::info;
use recollect_config::{LlmConfig, LlmProvider};
use recollect_protocol::GenerationGateway;
use std::sync::Arc;

/// Build the generation backend selected by `config.provider`.
pub fn gateway_from_config(config: &LlmConfig) -> Result<Arc<dyn GenerationGateway>, LlmError> {
    let gateway: Arc<dyn GenerationGateway> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiGateway::from_config(config)?),
        LlmProvider::Ollama => Arc::new(OllamaGateway::from_config(config)?),
    };
    info!(
        "generation backend ready (provider={:?}, chat_model={}, summary_model={})",
        config.provider, config.chat_model, config.summary_model
    );
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_backend_by_provider() {
        let ollama = LlmConfig {
            provider: LlmProvider::Ollama,
            ..LlmConfig::default()
        };
        assert!(gateway_from_config(&ollama).is_ok());

        let gemini = LlmConfig {
            api_key_env: "RECOLLECT_TEST_UNSET_SELECT_KEY".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            gateway_from_config(&gemini),
            Err(LlmError::MissingApiKey(_))
        ));
    }
}
