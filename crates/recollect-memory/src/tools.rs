//! Functions the chat model may request in agentic mode.

use crate::parse::{ParseResult, parse_json};
use crate::search::{HistorySearchIndex, SearchResult};
use crate::users::UserDirectory;
use log::{debug, info, warn};
use recollect_protocol::{CallOutcome, CallStatus, ToolError};
use serde_json::{Map, Value, json};
use std::fmt::Write as _;
use std::sync::Arc;

/// Name of the history search function.
pub const SEARCH_CHAT_HISTORY: &str = "search_chat_history";
/// Name of the profile update function.
pub const ADD_USER_INFO: &str = "add_user_info_to_database";

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: String,
    pub arguments: Map<String, Value>,
}

/// Extract a function call from model output.
///
/// Only a response that is entirely a `{"function": .., "arguments": {..}}`
/// object counts; anything else is an ordinary reply.
pub fn parse_function_call(text: &str) -> Option<FunctionCall> {
    let ParseResult::Valid(Value::Object(mut object)) = parse_json(text) else {
        return None;
    };
    let function = object.get("function")?.as_str()?.to_string();
    let Value::Object(arguments) = object.remove("arguments")? else {
        return None;
    };
    Some(FunctionCall {
        function,
        arguments,
    })
}

/// Executes model-requested functions against the history index and user row.
#[derive(Clone)]
pub struct MemoryTools {
    search: Arc<HistorySearchIndex>,
    users: UserDirectory,
}

impl MemoryTools {
    pub fn new(search: Arc<HistorySearchIndex>, users: UserDirectory) -> Self {
        Self { search, users }
    }

    /// Run `call` and return `{status, result[, message]}`.
    pub fn execute(&self, call: &FunctionCall) -> Value {
        debug!("executing function (name={})", call.function);
        match self.dispatch(call) {
            Ok(value) => value,
            Err(err) => {
                warn!("function call rejected (name={}, error={})", call.function, err);
                let result = match err {
                    ToolError::ToolNotFound(_) => "Unknown function".to_string(),
                    other => other.to_string(),
                };
                outcome_json(CallStatus::Failed, Value::from(result), None)
            }
        }
    }

    fn dispatch(&self, call: &FunctionCall) -> Result<Value, ToolError> {
        match call.function.as_str() {
            SEARCH_CHAT_HISTORY => {
                let term = call
                    .arguments
                    .get("search_term")
                    .and_then(Value::as_str)
                    .filter(|term| !term.trim().is_empty())
                    .ok_or_else(|| {
                        ToolError::InvalidArguments("search_term must be a non-empty string".into())
                    })?;
                Ok(search_json(self.search.search(term)))
            }
            ADD_USER_INFO => {
                if call.arguments.is_empty() {
                    return Err(ToolError::InvalidArguments(
                        "No user information provided to update".into(),
                    ));
                }
                let outcome = self.users.update_user_info(&call.arguments);
                if outcome.status.is_success() {
                    info!("user profile updated by function call");
                }
                Ok(outcome_json(outcome.status, Value::from(outcome.result), None))
            }
            other => Err(ToolError::ToolNotFound(other.to_string())),
        }
    }
}

/// Prompt that hands a function result back to the model.
pub fn follow_up_prompt(call: &FunctionCall, outcome: &Value) -> String {
    let succeeded = outcome.get("status").and_then(Value::as_str)
        == Some(CallStatus::Successful.as_str());
    let result = outcome.get("result").cloned().unwrap_or(Value::Null);
    if !succeeded {
        return format!(
            "The function {} failed with message: {}\nPlease inform the user about this issue and suggest alternatives if appropriate.",
            call.function,
            display_value(&result, "Unknown error")
        );
    }
    if call.function != SEARCH_CHAT_HISTORY {
        return format!(
            "The function {} was executed successfully. Result: {}\nPlease provide a natural response to the user confirming the action.",
            call.function,
            display_value(&result, "Operation completed.")
        );
    }
    let Value::Array(hits) = &result else {
        return format!(
            "The search was successful. Results: {}\nPlease provide a helpful response to the user about these search results.",
            display_value(&result, "")
        );
    };
    let term = call
        .arguments
        .get("search_term")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut summary = format!(
        "Found {} matching conversation(s) for '{}':\n",
        hits.len(),
        term
    );
    for (idx, hit) in hits.iter().enumerate() {
        let field = |key: &str| hit.get(key).and_then(Value::as_str).unwrap_or_default();
        let _ = write!(
            summary,
            "\n{}. Q: {}\n   A: {}\n   Time: {}\n",
            idx + 1,
            field("question"),
            field("answer"),
            field("timestamp")
        );
    }
    format!(
        "The search was successful. {summary}\nPlease provide a helpful response to the user about these search results."
    )
}

fn search_json(outcome: CallOutcome<SearchResult>) -> Value {
    match outcome.result {
        SearchResult::Hits(hits) => {
            let message = format!("Found {} matching conversation(s)", hits.len());
            outcome_json(outcome.status, json!(hits), Some(message))
        }
        SearchResult::Summary(text) | SearchResult::Message(text) => {
            outcome_json(outcome.status, Value::from(text), None)
        }
    }
}

fn outcome_json(status: CallStatus, result: Value, message: Option<String>) -> Value {
    let mut object = Map::new();
    object.insert("status".to_string(), Value::from(status.as_str()));
    object.insert("result".to_string(), result);
    if let Some(message) = message {
        object.insert("message".to_string(), Value::from(message));
    }
    Value::Object(object)
}

fn display_value(value: &Value, fallback: &str) -> String {
    match value {
        Value::Null => fallback.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(function: &str, arguments: Value) -> FunctionCall {
        FunctionCall {
            function: function.to_string(),
            arguments: arguments.as_object().cloned().expect("object"),
        }
    }

    #[test]
    fn parses_function_call_objects_only() {
        let parsed = parse_function_call(
            r#" {"function": "search_chat_history", "arguments": {"search_term": "rust"}} "#,
        );
        assert_eq!(
            parsed,
            Some(call(SEARCH_CHAT_HISTORY, json!({ "search_term": "rust" })))
        );
        assert_eq!(parse_function_call("Sure, here is the answer."), None);
        assert_eq!(parse_function_call(r#"{"function": "x"}"#), None);
        assert_eq!(parse_function_call(r#"{"function": "x", "arguments": []}"#), None);
    }

    #[test]
    fn follow_up_for_failure_and_success() {
        let failed = outcome_json(CallStatus::Failed, json!("No user found."), None);
        assert_eq!(
            follow_up_prompt(&call(ADD_USER_INFO, json!({ "name": "Bo" })), &failed),
            "The function add_user_info_to_database failed with message: No user found.\nPlease inform the user about this issue and suggest alternatives if appropriate."
        );
        let updated = outcome_json(CallStatus::Successful, json!("User information updated."), None);
        assert_eq!(
            follow_up_prompt(&call(ADD_USER_INFO, json!({ "name": "Bo" })), &updated),
            "The function add_user_info_to_database was executed successfully. Result: User information updated.\nPlease provide a natural response to the user confirming the action."
        );
    }

    #[test]
    fn follow_up_lists_search_hits() {
        let outcome = outcome_json(
            CallStatus::Successful,
            json!([{ "question": "q", "answer": "a", "timestamp": "t" }]),
            Some("Found 1 matching conversation(s)".to_string()),
        );
        assert_eq!(
            follow_up_prompt(&call(SEARCH_CHAT_HISTORY, json!({ "search_term": "q" })), &outcome),
            "The search was successful. Found 1 matching conversation(s) for 'q':\n\n1. Q: q\n   A: a\n   Time: t\n\nPlease provide a helpful response to the user about these search results."
        );
    }
}
