//! Configuration schema for Recollect.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything the chat binary needs; every section falls back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecollectConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub user: UserSeedConfig,
}

impl RecollectConfig {
    pub fn builder() -> RecollectConfigBuilder {
        RecollectConfigBuilder::default()
    }

    /// Reject values that deserialize fine but cannot drive a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (
                self.history.max_history_pairs > 0,
                "history.max_history_pairs must be at least 1",
            ),
            (
                self.search.max_characters > 0,
                "search.max_characters must be at least 1",
            ),
            (
                self.search.max_results > 0,
                "search.max_results must be at least 1",
            ),
            (
                !self.llm.chat_model.trim().is_empty(),
                "llm.chat_model must not be empty",
            ),
            (
                !self.llm.summary_model.trim().is_empty(),
                "llm.summary_model must not be empty",
            ),
        ];
        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(ConfigError::Invariant(message.to_string())),
            None => Ok(()),
        }
    }
}

/// Section-by-section construction for embedding applications and tests.
#[derive(Debug, Default, Clone)]
pub struct RecollectConfigBuilder {
    config: RecollectConfig,
}

impl RecollectConfigBuilder {
    pub fn llm(mut self, llm: LlmConfig) -> Self {
        self.config.llm = llm;
        self
    }

    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    pub fn search(mut self, search: SearchConfig) -> Self {
        self.config.search = search;
        self
    }

    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = database;
        self
    }

    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    pub fn chat(mut self, chat: ChatConfig) -> Self {
        self.config.chat = chat;
        self
    }

    pub fn user(mut self, user: UserSeedConfig) -> Self {
        self.config.user = user;
        self
    }

    pub fn build(self) -> RecollectConfig {
        self.config
    }
}

/// Generation backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Ollama,
}

/// Generation backend and model names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    /// Model used to reflect on working memories; reflection is skipped when unset.
    #[serde(default)]
    pub reflection_model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Base URL override; defaults depend on the provider.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Provider-specific generation options passed through verbatim.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            chat_model: default_chat_model(),
            summary_model: default_summary_model(),
            reflection_model: None,
            api_key_env: default_api_key_env(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            options: Map::new(),
        }
    }
}

/// Default model used for chat replies.
fn default_chat_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Default model used for compaction and summaries.
fn default_summary_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Default environment variable holding the cloud API key.
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default HTTP timeout for generation calls.
fn default_timeout_secs() -> u64 {
    120
}

/// Rolling history window and compaction budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_max_history_pairs")]
    pub max_history_pairs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_history_pairs: default_max_history_pairs(),
        }
    }
}

/// Default token budget before the rolling window is compacted.
fn default_max_tokens() -> usize {
    2000
}

/// Default number of user/assistant pairs kept in the rolling window.
fn default_max_history_pairs() -> usize {
    2
}

/// Keyword search over persisted history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_characters")]
    pub max_characters: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_characters: default_max_characters(),
            max_results: default_max_results(),
        }
    }
}

fn default_max_characters() -> usize {
    1000
}

fn default_max_results() -> usize {
    3
}

/// Relational store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Default SQLite file, relative to the working directory.
fn default_database_path() -> String {
    "db/store.db".to_string()
}

/// Tiered long-term memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// JSONL file backing the similarity index; in-memory only when unset.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    #[serde(default = "default_materialize_patterns")]
    pub materialize_patterns: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            context_limit: default_context_limit(),
            materialize_patterns: default_materialize_patterns(),
        }
    }
}

/// Default number of memories recalled per tier.
fn default_context_limit() -> usize {
    3
}

fn default_materialize_patterns() -> bool {
    true
}

/// Chat loop behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Plain chat with memory-augmented prompts.
    #[default]
    Basic,
    /// Chat where the model may request history search and profile updates.
    Agentic,
}

/// Chat loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default = "default_max_function_calls")]
    pub max_function_calls: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::default(),
            max_function_calls: default_max_function_calls(),
        }
    }
}

/// Default cap on model-requested function calls per turn.
fn default_max_function_calls() -> usize {
    3
}

/// Profile used to seed an empty user table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSeedConfig {
    #[serde(default = "default_user_name")]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub location: String,
}

impl Default for UserSeedConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            last_name: String::new(),
            occupation: String::new(),
            location: String::new(),
        }
    }
}

fn default_user_name() -> String {
    "Guest".to_string()
}
