use parking_lot::Mutex;
use recollect_protocol::{GenerationError, GenerationGateway};
use std::collections::VecDeque;
use std::sync::Arc;

/// Prompts seen by a recording gateway, as `(model, prompt)` pairs.
pub type PromptLog = Arc<Mutex<Vec<(String, String)>>>;

/// Always answers with the same text.
#[derive(Debug, Clone)]
pub struct FixedGeneration {
    response: String,
}

impl FixedGeneration {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl GenerationGateway for FixedGeneration {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerationError> {
        Ok(self.response.clone())
    }
}

/// Answers with the same text and records every prompt.
#[derive(Debug, Clone)]
pub struct RecordingGeneration {
    response: String,
    prompts: PromptLog,
}

impl RecordingGeneration {
    pub fn new(response: impl Into<String>) -> (Self, PromptLog) {
        let prompts = PromptLog::default();
        (
            Self {
                response: response.into(),
                prompts: prompts.clone(),
            },
            prompts,
        )
    }
}

impl GenerationGateway for RecordingGeneration {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .push((model.to_string(), prompt.to_string()));
        Ok(self.response.clone())
    }
}

/// Replays queued responses in order, then falls back to a default.
#[derive(Debug, Clone)]
pub struct ScriptedGeneration {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
    fallback: String,
    prompts: PromptLog,
}

impl ScriptedGeneration {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(|text| Ok(text.into())).collect(),
            )),
            fallback: String::new(),
            prompts: PromptLog::default(),
        }
    }

    /// Text returned once the script runs out.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Queue a transport failure after the responses already queued.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.responses.lock().push_back(Err(message.into()));
        self
    }

    /// Every `(model, prompt)` seen so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl GenerationGateway for ScriptedGeneration {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.prompts
            .lock()
            .push((model.to_string(), prompt.to_string()));
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerationError::Transport(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Fails every call with a transport error.
#[derive(Debug, Clone, Default)]
pub struct FailingGeneration;

impl GenerationGateway for FailingGeneration {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Transport("generation unavailable".to_string()))
    }
}
