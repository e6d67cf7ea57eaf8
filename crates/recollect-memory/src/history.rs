//! Rolling conversation window with token-budgeted compaction and a durable
//! summary cadence.
//!
//! The tracker owns the in-memory window for one session. Every pair is also
//! written to the [`TurnStore`]; summaries written to the [`SummaryLedger`]
//! are computed from what was persisted, not from the window.

use crate::error::MemoryError;
use crate::ledger::SummaryLedger;
use crate::measure::TextMeasure;
use crate::parse::{ParseResult, parse_chat_pairs};
use crate::persistence::PersistenceGateway;
use crate::policy::HistoryPolicy;
use crate::turns::TurnStore;
use log::{debug, info, warn};
use recollect_protocol::{ChatPair, ConversationTurn, GenerationGateway, SessionContext};
use std::fmt::Write as _;
use std::sync::Arc;

/// What happened to the window during a compaction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// The window holds only the pairs that are always kept.
    NothingToCompact,
    /// Older turns were replaced by the model's condensed pairs.
    Compacted {
        replaced_turns: usize,
        summarized_pairs: usize,
    },
    /// Generation or parsing failed; the window is unchanged.
    Failed(String),
}

/// Result of recording one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// The pair reached the durable store.
    pub persisted: bool,
    /// Token count of the window right after the append.
    pub tokens_before: usize,
    /// Token count once any compaction finished.
    pub tokens_after: usize,
    /// Compaction attempt, when the budget was exceeded.
    pub compaction: Option<CompactionOutcome>,
}

/// Result of a summary cadence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryUpdate {
    /// Fewer pairs than the cadence since the last summary.
    NotDue { pending: usize },
    /// Not enough persisted pairs to be worth summarizing.
    InsufficientHistory { available: usize },
    /// A new summary was written and the cadence counter reset.
    Saved,
    /// Summary generation or storage failed; the counter is kept.
    Failed(String),
}

/// Tracks one session's conversation window, its persistence, and summaries.
pub struct ConversationHistoryTracker {
    context: SessionContext,
    policy: HistoryPolicy,
    turns: TurnStore,
    summaries: SummaryLedger,
    generation: Arc<dyn GenerationGateway>,
    rolling_history: Vec<ConversationTurn>,
    pairs_since_last_summary: usize,
}

impl ConversationHistoryTracker {
    pub fn new(
        context: SessionContext,
        policy: HistoryPolicy,
        persistence: Arc<dyn PersistenceGateway>,
        generation: Arc<dyn GenerationGateway>,
    ) -> Self {
        Self {
            context,
            policy,
            turns: TurnStore::new(persistence.clone()),
            summaries: SummaryLedger::new(persistence),
            generation,
            rolling_history: Vec::new(),
            pairs_since_last_summary: 0,
        }
    }

    /// Session this tracker records for.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Current window, oldest first.
    pub fn rolling_history(&self) -> &[ConversationTurn] {
        &self.rolling_history
    }

    /// Persisted pairs since the last successful summary.
    pub fn pairs_since_last_summary(&self) -> usize {
        self.pairs_since_last_summary
    }

    /// Token count of the window as it would be sent to a model.
    pub fn token_count(&self) -> usize {
        TextMeasure::tokens(&render_history(&self.rolling_history))
    }

    /// Record a user/assistant pair.
    ///
    /// The window is trimmed to the newest `max_history_pairs` pairs, the pair
    /// is persisted, and compaction runs when the window exceeds the token
    /// budget. A persistence failure is logged and does not undo the append.
    pub fn add_turn(
        &mut self,
        user_message: &str,
        assistant_response: &str,
        max_history_pairs: usize,
    ) -> TurnReport {
        self.rolling_history.push(ConversationTurn::user(user_message));
        self.rolling_history.push(ConversationTurn::assistant(assistant_response));
        self.enforce_window(max_history_pairs);

        let persisted = match self.persist_pair(user_message, assistant_response) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "failed to persist turn (session_id={}, error={})",
                    self.context.session_id, err
                );
                false
            }
        };
        if persisted {
            self.pairs_since_last_summary += 1;
        }

        let tokens_before = self.token_count();
        let mut compaction = None;
        if tokens_before > self.policy.max_tokens {
            info!(
                "history over token budget (session_id={}, tokens={}, max_tokens={})",
                self.context.session_id, tokens_before, self.policy.max_tokens
            );
            compaction = Some(self.compact());
            self.enforce_window(max_history_pairs);
        }

        TurnReport {
            persisted,
            tokens_before,
            tokens_after: self.token_count(),
            compaction,
        }
    }

    /// Condense everything but the newest `policy.max_history_pairs` pairs.
    ///
    /// Never fails outward: on any error the window is left untouched.
    pub fn compact(&mut self) -> CompactionOutcome {
        let keep = self
            .policy
            .max_history_pairs
            .saturating_mul(2)
            .min(self.rolling_history.len());
        let split = self.rolling_history.len() - keep;
        if split == 0 {
            debug!(
                "nothing to compact (session_id={}, turns={})",
                self.context.session_id,
                self.rolling_history.len()
            );
            return CompactionOutcome::NothingToCompact;
        }

        let prompt = compaction_prompt(&self.rolling_history[..split]);
        let response = match self.generation.generate(&self.policy.summary_model, &prompt) {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "compaction generation failed (session_id={}, error={})",
                    self.context.session_id, err
                );
                return CompactionOutcome::Failed(err.to_string());
            }
        };

        let pairs = match parse_chat_pairs(&response) {
            ParseResult::Valid(pairs) => pairs,
            ParseResult::Invalid(reason) => {
                warn!(
                    "compaction response rejected (session_id={}, reason={})",
                    self.context.session_id, reason
                );
                return CompactionOutcome::Failed(reason);
            }
        };

        let summarized_pairs = pairs.len();
        let recent = self.rolling_history.split_off(split);
        self.rolling_history = pairs
            .into_iter()
            .flat_map(ChatPair::into_turns)
            .chain(recent)
            .collect();
        info!(
            "compacted history (session_id={}, replaced_turns={}, summarized_pairs={})",
            self.context.session_id, split, summarized_pairs
        );
        CompactionOutcome::Compacted {
            replaced_turns: split,
            summarized_pairs,
        }
    }

    /// The `num_pairs` most recent persisted pairs of `session_id`, oldest first.
    pub fn get_latest_chat_pairs(
        &self,
        session_id: &str,
        num_pairs: usize,
    ) -> Result<Vec<ChatPair>, MemoryError> {
        self.turns.latest_pairs(session_id, num_pairs)
    }

    /// Latest durable summary for this session; lookup errors read as none.
    pub fn latest_summary(&self) -> Option<String> {
        match self.summaries.latest_summary(&self.context.session_id) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(
                    "failed to read summary (session_id={}, error={})",
                    self.context.session_id, err
                );
                None
            }
        }
    }

    /// Write a new session summary once `max_history_pairs` pairs have been
    /// persisted since the previous one.
    pub fn update_chat_summary(&mut self, max_history_pairs: usize) -> SummaryUpdate {
        if self.pairs_since_last_summary < max_history_pairs {
            return SummaryUpdate::NotDue {
                pending: self.pairs_since_last_summary,
            };
        }

        let session_id = self.context.session_id.clone();
        let pairs = match self
            .turns
            .latest_pairs(&session_id, max_history_pairs.saturating_mul(2))
        {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!("failed to load pairs for summary (session_id={session_id}, error={err})");
                return SummaryUpdate::Failed(err.to_string());
            }
        };
        if pairs.len() <= max_history_pairs {
            debug!(
                "not enough history to summarize (session_id={}, pairs={})",
                session_id,
                pairs.len()
            );
            return SummaryUpdate::InsufficientHistory {
                available: pairs.len(),
            };
        }

        let previous = match self.summaries.latest_summary(&session_id) {
            Ok(previous) => previous,
            Err(err) => {
                warn!("failed to read previous summary (session_id={session_id}, error={err})");
                return SummaryUpdate::Failed(err.to_string());
            }
        };
        let prompt = summary_prompt(previous.as_deref(), &pairs);
        let text = match self.generation.generate(&self.policy.summary_model, &prompt) {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                warn!("summary generation failed (session_id={session_id}, error={err})");
                return SummaryUpdate::Failed(err.to_string());
            }
        };

        match self
            .summaries
            .append_summary(self.context.user_id, &session_id, &text)
        {
            Ok(true) => {
                self.pairs_since_last_summary = 0;
                info!(
                    "session summary updated (session_id={}, pairs={}, summary_len={})",
                    session_id,
                    pairs.len(),
                    text.len()
                );
                SummaryUpdate::Saved
            }
            Ok(false) => SummaryUpdate::Failed("summary was empty or no user is known".to_string()),
            Err(err) => {
                warn!("failed to save summary (session_id={session_id}, error={err})");
                SummaryUpdate::Failed(err.to_string())
            }
        }
    }

    fn persist_pair(&self, user_message: &str, assistant_response: &str) -> Result<(), MemoryError> {
        let user_id = self.context.user_id.ok_or(MemoryError::MissingUser)?;
        self.turns.append(
            user_id,
            &self.context.session_id,
            user_message,
            assistant_response,
        )?;
        Ok(())
    }

    fn enforce_window(&mut self, max_history_pairs: usize) {
        let limit = max_history_pairs.saturating_mul(2);
        if self.rolling_history.len() > limit {
            let excess = self.rolling_history.len() - limit;
            self.rolling_history.drain(..excess);
        }
    }
}

/// Serialize turns the way they are measured and shown to the model.
///
/// Each turn renders as a one-key object, `{"user": ...}` or `{"assistant": ...}`.
pub fn render_history(turns: &[ConversationTurn]) -> String {
    let entries: Vec<serde_json::Value> = turns
        .iter()
        .map(|turn| {
            let mut entry = serde_json::Map::new();
            entry.insert(
                turn.role.as_str().to_string(),
                serde_json::Value::String(turn.content.clone()),
            );
            serde_json::Value::Object(entry)
        })
        .collect();
    serde_json::Value::Array(entries).to_string()
}

fn compaction_prompt(turns: &[ConversationTurn]) -> String {
    format!(
        "Summarize the following conversation while preserving key details and the \
         conversation's tone:\n{}\n\nReturn the summarized conversation as a JSON array of \
         objects, each with a 'user' and an 'assistant' field. Return only the JSON.",
        render_history(turns)
    )
}

fn summary_prompt(previous: Option<&str>, pairs: &[ChatPair]) -> String {
    let mut prompt = String::from("Summarize the following conversation:\n\n");
    if let Some(previous) = previous {
        let _ = write!(prompt, "Previous summary:\n{previous}\n\n");
    }
    for pair in pairs {
        let _ = write!(prompt, "User: {}\nAssistant: {}\n\n", pair.user, pair.assistant);
    }
    prompt.push_str("Provide a concise summary while keeping important details.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_history_uses_role_keys() {
        let turns = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("yo")];
        assert_eq!(render_history(&turns), r#"[{"user":"hi"},{"assistant":"yo"}]"#);
        assert_eq!(render_history(&[]), "[]");
    }

    #[test]
    fn summary_prompt_includes_previous_summary_and_pairs() {
        let prompt = summary_prompt(Some("earlier"), &[ChatPair::new("q", "a")]);
        assert!(prompt.starts_with("Summarize the following conversation:\n\n"));
        assert!(prompt.contains("Previous summary:\nearlier\n\n"));
        assert!(prompt.contains("User: q\nAssistant: a\n\n"));
        assert!(prompt.ends_with("keeping important details."));

        let without = summary_prompt(None, &[]);
        assert!(!without.contains("Previous summary"));
    }

    #[test]
    fn compaction_prompt_embeds_rendered_turns() {
        let prompt = compaction_prompt(&[ConversationTurn::user("old question")]);
        assert!(prompt.contains(r#"[{"user":"old question"}]"#));
        assert!(prompt.contains("'user'"));
    }
}
