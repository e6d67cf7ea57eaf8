//! Durable record of every question/answer pair.

use crate::error::MemoryError;
use crate::persistence::{Fetch, PersistenceGateway, SqlValue, text_column, timestamp_now};
use log::debug;
use recollect_protocol::ChatPair;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const INSERT_TURN: &str = "INSERT INTO chat_history (user_id, timestamp, question, answer, session_id) \
     VALUES (?, ?, ?, ?, ?)";

const LATEST_PAIRS: &str = "SELECT question, answer FROM chat_history \
     WHERE session_id = ? ORDER BY timestamp DESC, id DESC LIMIT ?";

const MATCH_TURNS: &str = "SELECT question, answer, timestamp, user_id, session_id FROM chat_history \
     WHERE question LIKE ? ESCAPE '\\' OR answer LIKE ? ESCAPE '\\' \
     ORDER BY timestamp ASC, id ASC LIMIT ?";

/// One stored question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTurn {
    pub user_id: Option<i64>,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub timestamp: String,
}

/// Append-only accessor for the `chat_history` relation.
#[derive(Clone)]
pub struct TurnStore {
    gateway: Arc<dyn PersistenceGateway>,
}

impl TurnStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Persist a pair stamped with the current time.
    pub fn append(
        &self,
        user_id: i64,
        session_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<PersistedTurn, MemoryError> {
        let turn = PersistedTurn {
            user_id: Some(user_id),
            session_id: session_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: timestamp_now(),
        };
        self.gateway.execute(
            INSERT_TURN,
            &[
                SqlValue::from(user_id),
                SqlValue::from(turn.timestamp.as_str()),
                SqlValue::from(question),
                SqlValue::from(answer),
                SqlValue::from(session_id),
            ],
            Fetch::None,
        )?;
        debug!(
            "persisted turn (session_id={}, question_len={}, answer_len={})",
            session_id,
            question.len(),
            answer.len()
        );
        Ok(turn)
    }

    /// The `num_pairs` most recent pairs of a session, oldest first.
    pub fn latest_pairs(
        &self,
        session_id: &str,
        num_pairs: usize,
    ) -> Result<Vec<ChatPair>, MemoryError> {
        if num_pairs == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(num_pairs).unwrap_or(i64::MAX);
        let rows = self
            .gateway
            .execute(
                LATEST_PAIRS,
                &[SqlValue::from(session_id), SqlValue::from(limit)],
                Fetch::All,
            )?
            .into_rows();
        let mut pairs = rows
            .iter()
            .map(|row| -> Result<ChatPair, MemoryError> {
                Ok(ChatPair::new(text_column(row, 0)?, text_column(row, 1)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        pairs.reverse();
        Ok(pairs)
    }

    /// Pairs whose question or answer contains `term` (ASCII case-insensitive),
    /// oldest first, at most `limit`.
    pub fn matching(&self, term: &str, limit: usize) -> Result<Vec<PersistedTurn>, MemoryError> {
        let pattern = format!("%{}%", escape_like(term));
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .gateway
            .execute(
                MATCH_TURNS,
                &[
                    SqlValue::from(pattern.as_str()),
                    SqlValue::from(pattern.as_str()),
                    SqlValue::from(limit),
                ],
                Fetch::All,
            )?
            .into_rows();
        rows.iter()
            .map(|row| -> Result<PersistedTurn, MemoryError> {
                Ok(PersistedTurn {
                    question: text_column(row, 0)?,
                    answer: text_column(row, 1)?,
                    timestamp: text_column(row, 2)?,
                    user_id: row.get(3).and_then(SqlValue::as_i64),
                    session_id: text_column(row, 4)?,
                })
            })
            .collect()
    }
}

/// Escape LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
