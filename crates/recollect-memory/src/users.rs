//! User profile row backing prompt personalization and profile updates.

use crate::error::MemoryError;
use crate::persistence::{Fetch, PersistenceGateway, SqlValue};
use log::{debug, info, warn};
use recollect_protocol::CallOutcome;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Profile columns, in display order. Also the set of keys accepted by updates.
const PROFILE_FIELDS: &[&str] = &[
    "name",
    "last_name",
    "email",
    "age",
    "gender",
    "location",
    "occupation",
    "interests",
];

const SELECT_USER: &str = "SELECT id, name, last_name, email, age, gender, location, occupation, interests \
     FROM user_info ORDER BY id ASC LIMIT 1";

const SEED_USER: &str = "INSERT INTO user_info (name, last_name, occupation, location) \
     SELECT ?, ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM user_info)";

/// Profile used to create the first user row.
#[derive(Debug, Clone, Default)]
pub struct UserSeed {
    pub name: String,
    pub last_name: String,
    pub occupation: String,
    pub location: String,
}

/// Non-empty profile fields of the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub fields: Vec<(String, String)>,
}

impl UserInfo {
    /// Value of a profile field, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == key)
            .map(|(_, value)| value.as_str())
    }

    /// One `key: value` line per field, for prompts.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reads and updates the single user row.
#[derive(Clone)]
pub struct UserDirectory {
    gateway: Arc<dyn PersistenceGateway>,
}

impl UserDirectory {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Create the first user from `seed` when the table is empty; returns the user id.
    pub fn ensure_user(&self, seed: &UserSeed) -> Result<i64, MemoryError> {
        self.gateway.execute(
            SEED_USER,
            &[
                SqlValue::from(seed.name.as_str()),
                SqlValue::from(seed.last_name.as_str()),
                SqlValue::from(seed.occupation.as_str()),
                SqlValue::from(seed.location.as_str()),
            ],
            Fetch::None,
        )?;
        let user = self.user_info()?.ok_or(MemoryError::MissingUser)?;
        debug!("user ready (user_id={})", user.id);
        Ok(user.id)
    }

    /// The current user with empty and NULL fields dropped.
    pub fn user_info(&self) -> Result<Option<UserInfo>, MemoryError> {
        let Some(row) = self
            .gateway
            .execute(SELECT_USER, &[], Fetch::One)?
            .into_row()
        else {
            return Ok(None);
        };
        let Some(id) = row.first().and_then(SqlValue::as_i64) else {
            return Ok(None);
        };
        let fields = PROFILE_FIELDS
            .iter()
            .zip(row.iter().skip(1))
            .filter_map(|(key, value)| {
                let text = value.to_text()?;
                (!text.trim().is_empty()).then(|| (key.to_string(), text))
            })
            .collect();
        Ok(Some(UserInfo { id, fields }))
    }

    /// Id of the current user, if one exists.
    pub fn user_id(&self) -> Result<Option<i64>, MemoryError> {
        Ok(self.user_info()?.map(|user| user.id))
    }

    /// Apply a model- or user-supplied profile update.
    ///
    /// Unknown keys reject the whole update. NULL values are ignored; list
    /// values are stored comma-joined.
    pub fn update_user_info(&self, updates: &Map<String, Value>) -> CallOutcome<String> {
        if let Some(key) = updates
            .keys()
            .find(|key| !PROFILE_FIELDS.contains(&key.as_str()))
        {
            warn!("rejected profile update (key={key})");
            let mut allowed: Vec<&str> = PROFILE_FIELDS.to_vec();
            allowed.sort_unstable();
            return CallOutcome::failure(format!(
                "Please provide a valid key from the following list: {}",
                allowed.join(", ")
            ));
        }

        let mut columns = Vec::new();
        let mut params = Vec::new();
        for key in PROFILE_FIELDS {
            let Some(value) = updates.get(*key) else {
                continue;
            };
            let Some(param) = profile_value(key, value) else {
                continue;
            };
            columns.push(format!("{key} = ?"));
            params.push(param);
        }
        if columns.is_empty() {
            return CallOutcome::failure("No valid fields to update.".to_string());
        }

        let user_id = match self.user_id() {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return CallOutcome::failure("No user found.".to_string()),
            Err(err) => return CallOutcome::failure(format!("Error: {err}")),
        };
        params.push(SqlValue::from(user_id));
        let statement = format!("UPDATE user_info SET {} WHERE id = ?", columns.join(", "));
        match self.gateway.execute(&statement, &params, Fetch::None) {
            Ok(_) => {
                info!(
                    "updated user profile (user_id={}, fields={})",
                    user_id,
                    columns.len()
                );
                CallOutcome::success("User information updated.".to_string())
            }
            Err(err) => {
                warn!("profile update failed (user_id={user_id}, error={err})");
                CallOutcome::failure(format!("Error: {err}"))
            }
        }
    }
}

/// Convert a JSON update value into a column parameter; `None` skips the field.
fn profile_value(key: &str, value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::String(text) if key == "age" => Some(
            text.trim()
                .parse::<i64>()
                .map_or_else(|_| SqlValue::from(text.as_str()), SqlValue::from),
        ),
        Value::String(text) => Some(SqlValue::from(text.as_str())),
        Value::Number(number) => Some(
            number
                .as_i64()
                .map_or_else(|| SqlValue::from(number.to_string()), SqlValue::from),
        ),
        Value::Bool(flag) => Some(SqlValue::from(flag.to_string())),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            Some(SqlValue::from(joined))
        }
        Value::Object(_) => Some(SqlValue::from(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteGateway;
    use pretty_assertions::assert_eq;
    use recollect_protocol::CallStatus;
    use serde_json::json;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(SqliteGateway::open_in_memory().expect("sqlite")))
    }

    fn seed() -> UserSeed {
        UserSeed {
            name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            occupation: "Engineer".to_string(),
            location: String::new(),
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn ensure_user_seeds_once() {
        let users = directory();
        assert_eq!(users.user_info().expect("info"), None);
        let first = users.ensure_user(&seed()).expect("seed");
        let second = users.ensure_user(&UserSeed::default()).expect("seed");
        assert_eq!(first, second);

        let info = users.user_info().expect("info").expect("user");
        assert_eq!(info.get("name"), Some("Ada"));
        assert_eq!(info.get("location"), None);
        assert_eq!(info.describe(), "name: Ada\nlast_name: Lovelace\noccupation: Engineer");
    }

    #[test]
    fn update_rejects_unknown_keys_with_sorted_list() {
        let users = directory();
        users.ensure_user(&seed()).expect("seed");
        let outcome = users.update_user_info(&object(json!({ "name": "Bo", "shoe_size": 9 })));
        assert_eq!(outcome.status, CallStatus::Failed);
        assert_eq!(
            outcome.result,
            "Please provide a valid key from the following list: age, email, gender, interests, last_name, location, name, occupation"
        );
        let info = users.user_info().expect("info").expect("user");
        assert_eq!(info.get("name"), Some("Ada"));
    }

    #[test]
    fn update_with_only_nulls_is_rejected() {
        let users = directory();
        users.ensure_user(&seed()).expect("seed");
        let outcome = users.update_user_info(&object(json!({ "age": null })));
        assert_eq!(
            outcome,
            CallOutcome::failure("No valid fields to update.".to_string())
        );
        let empty = users.update_user_info(&Map::new());
        assert_eq!(empty.status, CallStatus::Failed);
    }

    #[test]
    fn update_writes_typed_values() {
        let users = directory();
        users.ensure_user(&seed()).expect("seed");
        let outcome = users.update_user_info(&object(json!({
            "age": 30,
            "location": "New York",
            "interests": ["chess", "rust"],
        })));
        assert_eq!(
            outcome,
            CallOutcome::success("User information updated.".to_string())
        );
        let info = users.user_info().expect("info").expect("user");
        assert_eq!(info.get("age"), Some("30"));
        assert_eq!(info.get("location"), Some("New York"));
        assert_eq!(info.get("interests"), Some("chess, rust"));
    }

    #[test]
    fn update_without_user_fails() {
        let users = directory();
        let outcome = users.update_user_info(&object(json!({ "name": "Bo" })));
        assert_eq!(outcome, CallOutcome::failure("No user found.".to_string()));
    }
}
