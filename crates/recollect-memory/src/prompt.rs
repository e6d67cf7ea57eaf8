//! System prompt assembly for chat turns.

use recollect_protocol::{ConversationTurn, Role};

/// Which prompt layout to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptMode {
    /// Conversation only.
    #[default]
    Basic,
    /// Conversation plus function calling instructions.
    Agentic,
}

/// Result of one function call made earlier in the current turn.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResult {
    pub function: String,
    pub result: serde_json::Value,
}

const CORE_DIRECTIVES: &str = "You are a helpful assistant with persistent memory. Maintain conversation continuity, provide accurate responses, and reference past interactions when relevant.";

const TOOL_INSTRUCTIONS: &str = r#"## Available Functions

1. search_chat_history(search_term: str) - Search through the user's previous conversations
   - Use this when:
     * The user asks "What did we talk about..." or "Do you remember when..."
     * You need context from previous conversations to answer the current question
     * The user references something from past chats
   - The search_term should be a clear, specific keyword or phrase
   - Returns matching conversations with questions, answers, and timestamps

2. add_user_info_to_database(name, last_name, email, age, gender, location, occupation, interests) - Update user information
   - Use this when the user shares or changes personal details that differ from the profile above
   - Only include the fields that need to be updated
   - All parameters are optional; interests is a list of strings

When you need to use a function, respond with ONLY a JSON object in this exact format:
{
  "function": "function_name",
  "arguments": {
    "arg1": "value1"
  }
}

Examples:
- User: "What did we discuss about Python?" -> {"function": "search_chat_history", "arguments": {"search_term": "Python"}}
- User: "Update my name to John" -> {"function": "add_user_info_to_database", "arguments": {"name": "John"}}
- User: "I'm 30 years old and live in New York" -> {"function": "add_user_info_to_database", "arguments": {"age": 30, "location": "New York"}}

Do not include any other text when calling a function. If a function result below confirms success, or the call limit is reached, do not call it again. After receiving the function result, answer the user naturally and never mention function-calling syntax."#;

/// Renders the layered system prompt: directives, user profile, summary,
/// recent messages, recalled memories, and in agentic mode the function
/// instructions and results.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    mode: PromptMode,
    user_profile: String,
    summary: Option<String>,
    recent: Vec<ConversationTurn>,
    memory_context: String,
    function_results: Vec<FunctionResult>,
}

impl PromptBuilder {
    pub fn new(mode: PromptMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn user_profile(mut self, profile: impl Into<String>) -> Self {
        self.user_profile = profile.into();
        self
    }

    pub fn summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|text| !text.trim().is_empty());
        self
    }

    pub fn recent(mut self, turns: &[ConversationTurn]) -> Self {
        self.recent = turns.to_vec();
        self
    }

    pub fn memory_context(mut self, context: impl Into<String>) -> Self {
        self.memory_context = context.into();
        self
    }

    pub fn function_results(mut self, results: &[FunctionResult]) -> Self {
        self.function_results = results.to_vec();
        self
    }

    /// Render the system prompt.
    pub fn build(&self) -> String {
        let mut sections = vec![
            format!("## Core Directives\n{CORE_DIRECTIVES}"),
            format!("## User Profile\n{}", self.user_profile.trim()),
            format!(
                "## Conversation Summary\n{}",
                self.summary.as_deref().unwrap_or("No previous conversations.")
            ),
            format!("## Recent Messages\n{}", render_recent(&self.recent)),
        ];
        if !self.memory_context.trim().is_empty() {
            sections.push(format!(
                "## Long-Term Memory\n{}",
                self.memory_context.trim()
            ));
        }
        if self.mode == PromptMode::Agentic {
            sections.push(TOOL_INSTRUCTIONS.to_string());
            if !self.function_results.is_empty() {
                let lines: Vec<String> = self
                    .function_results
                    .iter()
                    .map(|entry| format!("- {}: {}", entry.function, entry.result))
                    .collect();
                sections.push(format!(
                    "## Previous Function Results:\n{}",
                    lines.join("\n")
                ));
            }
        }
        sections.join("\n\n")
    }
}

/// Combine a system prompt with the message the model should answer.
pub fn compose_request(system_prompt: &str, message: &str) -> String {
    format!("{system_prompt}\n\n## User Message\n{message}")
}

fn render_recent(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "No previous messages.".to_string();
    }
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::User => format!("User: {}", turn.content),
            Role::Assistant => format!("Assistant: {}", turn.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
