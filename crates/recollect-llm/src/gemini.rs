//! Google Gemini REST adapter.

use crate::error::LlmError;
use crate::transport::{http_client, send_json, trim_endpoint};
use log::debug;
use recollect_config::LlmConfig;
use recollect_protocol::{GenerationError, GenerationGateway};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Public Gemini API base URL.
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation over `models/{model}:generateContent`.
pub struct GeminiGateway {
    client: Client,
    endpoint: String,
    api_key: String,
    options: Map<String, Value>,
}

impl GeminiGateway {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: Option<&str>,
        timeout_secs: u64,
        options: Map<String, Value>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            endpoint: trim_endpoint(endpoint.unwrap_or(GEMINI_ENDPOINT)).to_string(),
            api_key: api_key.into(),
            options,
        })
    }

    /// Build from config, reading the key from `config.api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            api_key,
            config.endpoint.as_deref(),
            config.timeout_secs,
            config.options.clone(),
        )
    }

    fn request(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        debug!(
            "gemini request (model={}, prompt_len={})",
            model,
            prompt.len()
        );
        let body = send_json(
            self.client
                .post(request_url(&self.endpoint, model))
                .header("x-goog-api-key", &self.api_key)
                .json(&request_body(prompt, &self.options)),
        )?;
        parse_response(body)
    }
}

impl GenerationGateway for GeminiGateway {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        Ok(self.request(model, prompt)?)
    }
}

fn request_url(endpoint: &str, model: &str) -> String {
    format!("{endpoint}/models/{model}:generateContent")
}

fn request_body(prompt: &str, options: &Map<String, Value>) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
    });
    if !options.is_empty()
        && let Some(object) = body.as_object_mut()
    {
        object.insert(
            "generationConfig".to_string(),
            Value::Object(options.clone()),
        );
    }
    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn parse_response(body: Value) -> Result<String, LlmError> {
    let response: GenerateResponse = serde_json::from_value(body)
        .map_err(|err| LlmError::MalformedResponse(err.to_string()))?;
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(LlmError::Blocked(reason));
    }
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("no candidates returned".to_string()))?;
    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "no text".to_string());
        return Err(LlmError::MalformedResponse(format!(
            "candidate has no text (finish_reason={reason})"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_url_and_body() {
        assert_eq!(
            request_url(GEMINI_ENDPOINT, "gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            request_body("hello", &Map::new()),
            json!({ "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }] })
        );
        let mut options = Map::new();
        options.insert("temperature".to_string(), json!(0.2));
        assert_eq!(
            request_body("hello", &options)["generationConfig"],
            json!({ "temperature": 0.2 })
        );
    }

    #[test]
    fn parses_candidate_text() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello" }, { "text": " there" }], "role": "model" },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_response(body).expect("text"), "Hello there");
    }

    #[test]
    fn reports_blocked_and_empty_responses() {
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(parse_response(blocked), Err(LlmError::Blocked(reason)) if reason == "SAFETY"));

        let empty = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        assert!(matches!(parse_response(empty), Err(LlmError::MalformedResponse(message)) if message.contains("MAX_TOKENS")));

        assert!(matches!(
            parse_response(json!({ "candidates": [] })),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = LlmConfig {
            api_key_env: "RECOLLECT_TEST_UNSET_GEMINI_KEY".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            GeminiGateway::from_config(&config),
            Err(LlmError::MissingApiKey(name)) if name == "RECOLLECT_TEST_UNSET_GEMINI_KEY"
        ));
    }
}
