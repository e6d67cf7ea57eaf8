//! Defensive parsing of structured model output.

use recollect_protocol::ChatPair;
use serde_json::Value;

/// Outcome of interpreting model text as structured data.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult<T> {
    Valid(T),
    Invalid(String),
}

impl<T> ParseResult<T> {
    /// Chain another fallible interpretation onto a valid result.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> ParseResult<U>) -> ParseResult<U> {
        match self {
            ParseResult::Valid(value) => f(value),
            ParseResult::Invalid(reason) => ParseResult::Invalid(reason),
        }
    }

    /// Convert into a `Result` with the rejection reason as the error.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            ParseResult::Valid(value) => Ok(value),
            ParseResult::Invalid(reason) => Err(reason),
        }
    }
}

/// Parse model text as JSON, tolerating surrounding whitespace and a Markdown fence.
pub fn parse_json(text: &str) -> ParseResult<Value> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return ParseResult::Invalid("empty response".to_string());
    }
    match serde_json::from_str(body) {
        Ok(value) => ParseResult::Valid(value),
        Err(err) => ParseResult::Invalid(format!("response is not valid JSON: {err}")),
    }
}

/// Interpret model text as a list of `{user, assistant}` pairs.
///
/// A single object is accepted as a one-element list. Every element must
/// carry string `user` and `assistant` fields.
pub fn parse_chat_pairs(text: &str) -> ParseResult<Vec<ChatPair>> {
    parse_json(text).and_then(|value| {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(_) => vec![value],
            _ => return ParseResult::Invalid("expected a JSON array of pairs".to_string()),
        };
        let mut pairs = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let user = item.get("user").and_then(Value::as_str);
            let assistant = item.get("assistant").and_then(Value::as_str);
            match (user, assistant) {
                (Some(user), Some(assistant)) => pairs.push(ChatPair::new(user, assistant)),
                _ => {
                    return ParseResult::Invalid(format!(
                        "pair {idx} is missing 'user' or 'assistant'"
                    ));
                }
            }
        }
        ParseResult::Valid(pairs)
    })
}

/// Strip a leading/trailing Markdown code fence (with optional language tag).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim(),
    }
}
