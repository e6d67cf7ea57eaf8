//! Keyword search over persisted conversation history.

use crate::measure::TextMeasure;
use crate::persistence::PersistenceGateway;
use crate::policy::SearchPolicy;
use crate::turns::{PersistedTurn, TurnStore};
use log::{debug, info, warn};
use recollect_protocol::{CallOutcome, GenerationGateway};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message returned when nothing matched.
pub const NO_RESULTS_MESSAGE: &str = "No results found. Please try again with a different word.";

/// One matching stored pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub question: String,
    pub answer: String,
    pub timestamp: String,
}

impl From<PersistedTurn> for SearchHit {
    fn from(turn: PersistedTurn) -> Self {
        Self {
            question: turn.question,
            answer: turn.answer,
            timestamp: turn.timestamp,
        }
    }
}

/// Payload of a search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    /// Raw hits, small enough to return verbatim.
    Hits(Vec<SearchHit>),
    /// Model-written condensation of an oversized result set.
    Summary(String),
    /// Explanation for an empty or failed search.
    Message(String),
}

/// Serialized form of a result set; its length decides whether to summarize.
///
/// Hits render as a JSON array of `[question, answer, timestamp]` triples.
pub fn serialize_hits(hits: &[SearchHit]) -> String {
    let triples: Vec<[&str; 3]> = hits
        .iter()
        .map(|hit| [hit.question.as_str(), hit.answer.as_str(), hit.timestamp.as_str()])
        .collect();
    serde_json::to_string(&triples).unwrap_or_default()
}

/// Searches the `chat_history` relation and condenses oversized results.
pub struct HistorySearchIndex {
    turns: TurnStore,
    generation: Arc<dyn GenerationGateway>,
    policy: SearchPolicy,
}

impl HistorySearchIndex {
    pub fn new(
        persistence: Arc<dyn PersistenceGateway>,
        generation: Arc<dyn GenerationGateway>,
        policy: SearchPolicy,
    ) -> Self {
        Self {
            turns: TurnStore::new(persistence),
            generation,
            policy,
        }
    }

    /// Find stored pairs whose question or answer contains `search_term`.
    ///
    /// Failures never escape: they come back as a failed outcome whose
    /// result explains what went wrong.
    pub fn search(&self, search_term: &str) -> CallOutcome<SearchResult> {
        let hits: Vec<SearchHit> = match self.turns.matching(search_term, self.policy.max_results)
        {
            Ok(turns) => turns.into_iter().map(SearchHit::from).collect(),
            Err(err) => {
                warn!("history search failed (term={search_term:?}, error={err})");
                return CallOutcome::failure(SearchResult::Message(format!("Error: {err}")));
            }
        };
        if hits.is_empty() {
            debug!("history search found nothing (term={search_term:?})");
            return CallOutcome::failure(SearchResult::Message(NO_RESULTS_MESSAGE.to_string()));
        }

        let rendered = serialize_hits(&hits);
        let length = TextMeasure::characters(&rendered);
        if length <= self.policy.max_characters {
            debug!(
                "history search returning hits (term={:?}, hits={}, chars={})",
                search_term,
                hits.len(),
                length
            );
            return CallOutcome::success(SearchResult::Hits(hits));
        }

        info!(
            "summarizing oversized search result (term={:?}, chars={}, max_characters={})",
            search_term, length, self.policy.max_characters
        );
        let prompt = format!(
            "Summarize the following conversation within {} characters\n{}",
            self.policy.max_characters, rendered
        );
        match self.generation.generate(&self.policy.summary_model, &prompt) {
            Ok(summary) => CallOutcome::success(SearchResult::Summary(summary.trim().to_string())),
            Err(err) => {
                warn!("search summary failed (term={search_term:?}, error={err})");
                CallOutcome::failure(SearchResult::Message(format!("Error: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hit(question: &str) -> SearchHit {
        SearchHit {
            question: question.to_string(),
            answer: "a".to_string(),
            timestamp: "t".to_string(),
        }
    }

    #[test]
    fn serialize_hits_renders_triples() {
        assert_eq!(serialize_hits(&[]), "[]");
        assert_eq!(serialize_hits(&[hit("q")]), r#"[["q","a","t"]]"#);
    }

    #[test]
    fn search_result_serializes_untagged() {
        let hits = SearchResult::Hits(vec![hit("q")]);
        assert_eq!(
            serde_json::to_value(&hits).expect("json"),
            serde_json::json!([{ "question": "q", "answer": "a", "timestamp": "t" }])
        );
        let summary = SearchResult::Summary("short".to_string());
        assert_eq!(serde_json::to_value(&summary).expect("json"), serde_json::json!("short"));
    }
}
