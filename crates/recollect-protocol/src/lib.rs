//! Shared types for Recollect conversations, call outcomes, and generation.

mod generation;
mod tool;

pub use generation::{GenerationError, GenerationGateway};
pub use tool::ToolError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Turn authored by the user.
    User,
    /// Turn authored by the assistant.
    Assistant,
}

impl Role {
    /// Lowercase label used in prompts and stored metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the rolling conversation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who said it.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ConversationTurn {
    /// Build a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A user message together with the assistant reply it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPair {
    pub user: String,
    pub assistant: String,
}

impl ChatPair {
    /// Build a pair from its two halves.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    /// Expand the pair into its user and assistant turns.
    pub fn into_turns(self) -> [ConversationTurn; 2] {
        [
            ConversationTurn::user(self.user),
            ConversationTurn::assistant(self.assistant),
        ]
    }
}

/// Identity of the conversation a component is working for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Row id of the owning user, when one is known.
    pub user_id: Option<i64>,
    /// Opaque identifier of the chat session.
    pub session_id: String,
}

impl SessionContext {
    /// Build a context for the given user and session.
    pub fn new(user_id: Option<i64>, session_id: impl Into<String>) -> Self {
        Self {
            user_id,
            session_id: session_id.into(),
        }
    }
}

/// Status half of a callable operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Successful,
    Failed,
}

impl CallStatus {
    /// Human-readable status string surfaced to the model and the user.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Successful => "Function call successful.",
            CallStatus::Failed => "Function call failed.",
        }
    }

    /// True when the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, CallStatus::Successful)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status/result pair returned by operations exposed as model-callable functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome<T> {
    pub status: CallStatus,
    pub result: T,
}

impl<T> CallOutcome<T> {
    /// Successful outcome carrying a result.
    pub fn success(result: T) -> Self {
        Self {
            status: CallStatus::Successful,
            result,
        }
    }

    /// Failed outcome carrying the failure payload.
    pub fn failure(result: T) -> Self {
        Self {
            status: CallStatus::Failed,
            result,
        }
    }

    /// Map the result payload, keeping the status.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        CallOutcome {
            status: self.status,
            result: f(self.result),
        }
    }
}
