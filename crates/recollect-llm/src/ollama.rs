//! Local Ollama server adapter.

use crate::error::LlmError;
use crate::transport::{http_client, send_json, trim_endpoint};
use log::debug;
use recollect_config::LlmConfig;
use recollect_protocol::{GenerationError, GenerationGateway};
use reqwest::blocking::Client;
use serde_json::{Map, Value, json};

/// Default Ollama host.
pub const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Non-streaming generation over `POST /api/generate`.
pub struct OllamaGateway {
    client: Client,
    host: String,
    options: Map<String, Value>,
}

impl OllamaGateway {
    pub fn new(
        host: Option<&str>,
        timeout_secs: u64,
        options: Map<String, Value>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            host: trim_endpoint(host.unwrap_or(OLLAMA_ENDPOINT)).to_string(),
            options,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            config.endpoint.as_deref(),
            config.timeout_secs,
            config.options.clone(),
        )
    }

    fn request(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        debug!(
            "ollama request (host={}, model={}, prompt_len={})",
            self.host,
            model,
            prompt.len()
        );
        let body = send_json(
            self.client
                .post(format!("{}/api/generate", self.host))
                .json(&request_body(model, prompt, &self.options)),
        )?;
        parse_response(&body)
    }
}

impl GenerationGateway for OllamaGateway {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        Ok(self.request(model, prompt)?)
    }
}

fn request_body(model: &str, prompt: &str, options: &Map<String, Value>) -> Value {
    let mut body = json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
    });
    if !options.is_empty()
        && let Some(object) = body.as_object_mut()
    {
        object.insert("options".to_string(), Value::Object(options.clone()));
    }
    body
}

fn parse_response(body: &Value) -> Result<String, LlmError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(LlmError::MalformedResponse(error.to_string()));
    }
    body.get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::MalformedResponse("missing 'response' field".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn body_disables_streaming_and_passes_options() {
        let mut options = Map::new();
        options.insert("num_ctx".to_string(), json!(4096));
        assert_eq!(
            request_body("llama3.2", "hi", &options),
            json!({
                "model": "llama3.2",
                "prompt": "hi",
                "stream": false,
                "options": { "num_ctx": 4096 },
            })
        );
        assert!(request_body("llama3.2", "hi", &Map::new()).get("options").is_none());
    }

    #[test]
    fn parses_response_field() {
        assert_eq!(
            parse_response(&json!({ "model": "llama3.2", "response": "Hello", "done": true }))
                .expect("text"),
            "Hello"
        );
        assert!(parse_response(&json!({ "error": "model not found" })).is_err());
        assert!(parse_response(&json!({ "done": true })).is_err());
    }

    #[test]
    fn host_defaults_to_local_server() {
        let gateway = OllamaGateway::new(None, 5, Map::new()).expect("gateway");
        assert_eq!(gateway.host, OLLAMA_ENDPOINT);
        let custom = OllamaGateway::new(Some("http://gpu-box:11434/"), 5, Map::new())
            .expect("gateway");
        assert_eq!(custom.host, "http://gpu-box:11434");
    }
}
