//! Relational persistence capability used by history, summaries, and users.
//!
//! Components speak to the store through [`PersistenceGateway`], a single
//! synchronous `execute` call. Statement text lives next to the component that
//! owns the relation; the gateway only binds parameters and shapes results.

mod sqlite;

pub use sqlite::SqliteGateway;

use crate::error::PersistenceError;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue};

/// A single bound parameter or returned column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// True for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render the value as display text; NULL becomes `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(value) => Some(value.to_string()),
            SqlValue::Real(value) => Some(value.to_string()),
            SqlValue::Text(value) => Some(value.clone()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => SqliteValue::Null,
            SqlValue::Integer(value) => SqliteValue::Integer(*value),
            SqlValue::Real(value) => SqliteValue::Real(*value),
            SqlValue::Text(value) => SqliteValue::Text(value.clone()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

impl From<SqliteValue> for SqlValue {
    fn from(value: SqliteValue) -> Self {
        match value {
            SqliteValue::Null => SqlValue::Null,
            SqliteValue::Integer(value) => SqlValue::Integer(value),
            SqliteValue::Real(value) => SqlValue::Real(value),
            SqliteValue::Text(value) => SqlValue::Text(value),
            SqliteValue::Blob(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

/// Ordered column values of one result row.
pub type Row = Vec<SqlValue>;

/// How many rows the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// Execute for side effects only.
    None,
    /// First row, if any.
    One,
    /// Every row.
    All,
}

/// Result shape matching the requested [`Fetch`] mode.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Empty,
    Row(Option<Row>),
    Rows(Vec<Row>),
}

impl QueryOutput {
    /// Collapse any shape into a row list.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Empty => Vec::new(),
            QueryOutput::Row(row) => row.into_iter().collect(),
            QueryOutput::Rows(rows) => rows,
        }
    }

    /// First row of any shape.
    pub fn into_row(self) -> Option<Row> {
        self.into_rows().into_iter().next()
    }
}

/// Synchronous statement execution against a relational store.
///
/// Writes are committed before `execute` returns. Implementations serialize
/// access internally so a single gateway can be shared behind an `Arc`.
pub trait PersistenceGateway: Send + Sync {
    /// Run `statement` with positional `params`, returning rows per `fetch`.
    fn execute(
        &self,
        statement: &str,
        params: &[SqlValue],
        fetch: Fetch,
    ) -> Result<QueryOutput, PersistenceError>;
}

/// Read column `index` of `row` as text, failing on a short row.
pub(crate) fn text_column(row: &Row, index: usize) -> Result<String, PersistenceError> {
    row.get(index)
        .map(|value| value.to_text().unwrap_or_default())
        .ok_or_else(|| PersistenceError::Decode(format!("missing column {index}")))
}

/// Current UTC time in the sortable text form stored in timestamp columns.
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}
