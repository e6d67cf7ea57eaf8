//! SQLite-backed persistence gateway.

use super::{Fetch, PersistenceGateway, QueryOutput, Row, SqlValue};
use crate::error::PersistenceError;
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, params_from_iter};
use std::path::Path;

/// Tables for user profiles, persisted turns, and session summaries.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    occupation TEXT NOT NULL DEFAULT '',
    location TEXT NOT NULL DEFAULT '',
    email TEXT,
    age INTEGER,
    gender TEXT,
    interests TEXT
);

CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    timestamp TEXT NOT NULL,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    session_id TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES user_info(id)
);

CREATE INDEX IF NOT EXISTS idx_chat_history_session
    ON chat_history(session_id, timestamp);

CREATE TABLE IF NOT EXISTS summary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    session_id TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES user_info(id)
);

CREATE INDEX IF NOT EXISTS idx_summary_session
    ON summary(session_id, timestamp);
";

/// Persistence gateway over a single SQLite connection.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Open (or create) the database file and bootstrap the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("opened sqlite store (path={})", path.display());
        Self::with_connection(conn)
    }

    /// In-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PersistenceGateway for SqliteGateway {
    fn execute(
        &self,
        statement: &str,
        params: &[SqlValue],
        fetch: Fetch,
    ) -> Result<QueryOutput, PersistenceError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(statement)?;
        let columns = stmt.column_count();
        debug!(
            "executing statement (fetch={:?}, params={}, columns={})",
            fetch,
            params.len(),
            columns
        );
        match fetch {
            Fetch::None => {
                stmt.execute(params_from_iter(params.iter()))?;
                Ok(QueryOutput::Empty)
            }
            Fetch::One => {
                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                let row = match rows.next()? {
                    Some(row) => Some(read_row(row, columns)?),
                    None => None,
                };
                Ok(QueryOutput::Row(row))
            }
            Fetch::All => {
                let mut rows = stmt.query(params_from_iter(params.iter()))?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(read_row(row, columns)?);
                }
                Ok(QueryOutput::Rows(out))
            }
        }
    }
}

fn read_row(row: &rusqlite::Row<'_>, columns: usize) -> Result<Row, PersistenceError> {
    (0..columns)
        .map(|index| {
            row.get::<_, rusqlite::types::Value>(index)
                .map(SqlValue::from)
                .map_err(PersistenceError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn open_creates_parent_dirs_and_schema() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("store.db");
        let gateway = SqliteGateway::open(&path).expect("open");
        assert!(path.exists());

        let tables = gateway
            .execute(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
                Fetch::All,
            )
            .expect("tables")
            .into_rows();
        let names: Vec<_> = tables
            .iter()
            .filter_map(|row| row[0].as_str().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["chat_history", "summary", "user_info"]);
    }

    #[test]
    fn execute_binds_params_and_shapes_rows() {
        let gateway = SqliteGateway::open_in_memory().expect("open");
        gateway
            .execute(
                "INSERT INTO user_info (name, age) VALUES (?, ?)",
                &[SqlValue::from("Ada"), SqlValue::from(None::<i64>)],
                Fetch::None,
            )
            .expect("insert");

        let row = gateway
            .execute("SELECT name, age FROM user_info", &[], Fetch::One)
            .expect("select")
            .into_row()
            .expect("row");
        assert_eq!(row, vec![SqlValue::from("Ada"), SqlValue::Null]);

        let missing = gateway
            .execute(
                "SELECT name FROM user_info WHERE id = ?",
                &[SqlValue::from(99_i64)],
                Fetch::One,
            )
            .expect("select");
        assert_eq!(missing, QueryOutput::Row(None));
    }

    #[test]
    fn reopening_keeps_existing_rows() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("store.db");
        {
            let gateway = SqliteGateway::open(&path).expect("open");
            gateway
                .execute(
                    "INSERT INTO user_info (name) VALUES (?)",
                    &[SqlValue::from("Ada")],
                    Fetch::None,
                )
                .expect("insert");
        }
        let gateway = SqliteGateway::open(&path).expect("reopen");
        let rows = gateway
            .execute("SELECT id FROM user_info", &[], Fetch::All)
            .expect("select")
            .into_rows();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn statement_errors_surface_as_sqlite_errors() {
        let gateway = SqliteGateway::open_in_memory().expect("open");
        let err = gateway
            .execute("SELECT * FROM missing_table", &[], Fetch::All)
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Sqlite(_)));
    }
}
