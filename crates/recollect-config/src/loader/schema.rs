//! Schema checks for Recollect JSON5 layers.
//!
//! Layers are partial, so every key is optional; a present key must be known
//! and carry the expected JSON type. The schema is two levels deep: a fixed
//! set of sections, each a flat table of fields.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Expected JSON shape of a field.
#[derive(Clone, Copy)]
enum Kind {
    Text,
    Flag,
    Count,
    Table,
    OneOf(&'static [&'static str]),
}

impl Kind {
    fn accepts(self, value: &Value) -> Result<(), &'static str> {
        let (ok, expected) = match self {
            Kind::Text => (value.is_string(), "expected string"),
            Kind::Flag => (value.is_boolean(), "expected bool"),
            Kind::Count => (value.is_u64(), "expected non-negative integer"),
            Kind::Table => (value.is_object(), "expected object"),
            Kind::OneOf(choices) => match value.as_str() {
                Some(text) if choices.contains(&text) => (true, ""),
                Some(_) => (false, "unsupported value"),
                None => (false, "expected string"),
            },
        };
        if ok { Ok(()) } else { Err(expected) }
    }
}

type Fields = &'static [(&'static str, Kind)];

const SECTIONS: &[(&str, Fields)] = &[
    (
        "llm",
        &[
            ("provider", Kind::OneOf(&["gemini", "ollama"])),
            ("chat_model", Kind::Text),
            ("summary_model", Kind::Text),
            ("reflection_model", Kind::Text),
            ("api_key_env", Kind::Text),
            ("endpoint", Kind::Text),
            ("timeout_secs", Kind::Count),
            ("options", Kind::Table),
        ],
    ),
    (
        "history",
        &[("max_tokens", Kind::Count), ("max_history_pairs", Kind::Count)],
    ),
    (
        "search",
        &[("max_characters", Kind::Count), ("max_results", Kind::Count)],
    ),
    ("database", &[("path", Kind::Text)]),
    (
        "memory",
        &[
            ("enabled", Kind::Flag),
            ("path", Kind::Text),
            ("context_limit", Kind::Count),
            ("materialize_patterns", Kind::Flag),
        ],
    ),
    (
        "chat",
        &[
            ("mode", Kind::OneOf(&["basic", "agentic"])),
            ("max_function_calls", Kind::Count),
        ],
    ),
    (
        "user",
        &[
            ("name", Kind::Text),
            ("last_name", Kind::Text),
            ("occupation", Kind::Text),
            ("location", Kind::Text),
        ],
    ),
];

/// Check one layer (or the merged document) against the schema.
pub(super) fn check_layer(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let root = as_table(value, layer, "root")?;
    for (key, section) in root {
        if key == "$schema" {
            Kind::Text
                .accepts(section)
                .map_err(|message| schema_error(layer, key, message))?;
            continue;
        }
        let Some((_, fields)) = SECTIONS.iter().find(|(name, _)| *name == key.as_str()) else {
            return Err(schema_error(layer, key, "unknown key"));
        };
        check_section(section, *fields, layer, key)?;
    }
    Ok(())
}

fn check_section(
    value: &Value,
    fields: Fields,
    layer: &str,
    section: &str,
) -> Result<(), ConfigError> {
    for (key, field) in as_table(value, layer, section)? {
        let location = format!("{section}.{key}");
        let Some((_, kind)) = fields.iter().find(|(name, _)| *name == key.as_str()) else {
            return Err(schema_error(layer, &location, "unknown key"));
        };
        kind.accepts(field)
            .map_err(|message| schema_error(layer, &location, message))?;
    }
    Ok(())
}

fn as_table<'a>(
    value: &'a Value,
    layer: &str,
    location: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| schema_error(layer, location, "expected object"))
}

fn schema_error(layer: &str, location: &str, message: &str) -> ConfigError {
    ConfigError::Schema {
        location: format!("{layer}:{location}"),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn accepts_partial_layers() {
        assert!(check_layer(&json!({}), "t").is_ok());
        let layer = json!({ "$schema": "x", "chat": { "mode": "agentic" } });
        assert!(check_layer(&layer, "t").is_ok());
    }

    #[test]
    fn names_the_offending_location() {
        let err = check_layer(&json!({ "memory": { "enabled": 1 } }), "cwd(a)").unwrap_err();
        assert_eq!(err.to_string(), "invalid config at cwd(a):memory.enabled: expected bool");

        let err = check_layer(&json!({ "chat": "agentic" }), "t").unwrap_err();
        assert_eq!(err.to_string(), "invalid config at t:chat: expected object");

        let err = check_layer(&json!([]), "t").unwrap_err();
        assert_eq!(err.to_string(), "invalid config at t:root: expected object");
    }
}
