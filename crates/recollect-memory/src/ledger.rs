//! Append-only ledger of session summaries.

use crate::error::MemoryError;
use crate::persistence::{Fetch, PersistenceGateway, SqlValue, text_column, timestamp_now};
use log::{debug, warn};
use std::sync::Arc;

const LATEST_SUMMARY: &str = "SELECT summary_text FROM summary \
     WHERE session_id = ? ORDER BY timestamp DESC, id DESC LIMIT 1";

const INSERT_SUMMARY: &str =
    "INSERT INTO summary (user_id, session_id, summary_text, timestamp) VALUES (?, ?, ?, ?)";

/// Durable summaries; the latest one per session seeds the next.
#[derive(Clone)]
pub struct SummaryLedger {
    gateway: Arc<dyn PersistenceGateway>,
}

impl SummaryLedger {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Most recent summary text for the session.
    pub fn latest_summary(&self, session_id: &str) -> Result<Option<String>, MemoryError> {
        let row = self
            .gateway
            .execute(LATEST_SUMMARY, &[SqlValue::from(session_id)], Fetch::One)?
            .into_row();
        row.map(|row| text_column(&row, 0))
            .transpose()
            .map_err(MemoryError::from)
    }

    /// Append a summary. Returns `false` without writing when the text is
    /// blank or no user is known.
    pub fn append_summary(
        &self,
        user_id: Option<i64>,
        session_id: &str,
        text: &str,
    ) -> Result<bool, MemoryError> {
        if text.trim().is_empty() {
            debug!("skipping empty summary (session_id={})", session_id);
            return Ok(false);
        }
        let Some(user_id) = user_id else {
            warn!("no user found; summary not saved (session_id={})", session_id);
            return Ok(false);
        };
        self.gateway.execute(
            INSERT_SUMMARY,
            &[
                SqlValue::from(user_id),
                SqlValue::from(session_id),
                SqlValue::from(text),
                SqlValue::from(timestamp_now()),
            ],
            Fetch::None,
        )?;
        debug!(
            "saved summary (session_id={}, summary_len={})",
            session_id,
            text.len()
        );
        Ok(true)
    }
}
