//! Long-term memory split into working, episodic, semantic, and procedural
//! tiers on top of a [`SimilaritySearch`] index.
//!
//! New conversation content lands in the working tier. Consolidation asks a
//! reflection model for durable insights, files them into the other tiers,
//! and archives the working memories it read.

mod session;

pub use session::{MemorySession, UserProfile};

use crate::error::MemoryError;
use crate::parse::{ParseResult, parse_json};
use crate::policy::ConsolidationPolicy;
use crate::similarity::{Document, Metadata, MetadataFilter, Selection, SimilaritySearch};
use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use recollect_protocol::GenerationGateway;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tier a memory belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Raw recent conversation content.
    Working,
    /// Past experiences and interactions.
    Episodic,
    /// Durable facts about the user.
    Semantic,
    /// Preferences and behavioral patterns.
    Procedural,
    /// Any other tag; stored as given with no special handling.
    Other(String),
}

impl MemoryType {
    pub fn as_str(&self) -> &str {
        match self {
            MemoryType::Working => "working",
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
            MemoryType::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "working" => MemoryType::Working,
            "episodic" => MemoryType::Episodic,
            "semantic" => MemoryType::Semantic,
            "procedural" => MemoryType::Procedural,
            other => MemoryType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub timestamp: String,
    pub metadata: Metadata,
    pub embedding: Option<Vec<f32>>,
}

impl From<Document> for Memory {
    fn from(document: Document) -> Self {
        let memory_type = document
            .metadata
            .get("memory_type")
            .and_then(Value::as_str)
            .map_or_else(|| MemoryType::Other("unknown".to_string()), MemoryType::parse);
        let timestamp = document
            .metadata
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            id: document.id,
            content: document.content,
            memory_type,
            timestamp,
            metadata: document.metadata,
            embedding: document.embedding,
        }
    }
}

/// Result of a consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    /// Working memories archived.
    pub consolidated: usize,
    /// Ids of memories created from insights.
    pub created: Vec<String>,
}

/// Kind of insight returned by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightKind {
    Fact,
    Experience,
    Pattern,
}

/// One insight extracted from working memories.
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub kind: InsightKind,
    pub content: String,
    pub confidence: Option<f64>,
    pub importance: Option<String>,
}

/// Interpret reflection output as a list of insights.
///
/// The response must be a JSON array; entries with an unknown type or
/// without content are skipped.
pub fn parse_insights(text: &str) -> ParseResult<Vec<Insight>> {
    parse_json(text).and_then(|value| {
        let Value::Array(items) = value else {
            return ParseResult::Invalid("expected a JSON array of insights".to_string());
        };
        let insights = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let insight = insight_from_value(item);
                if insight.is_none() {
                    debug!("skipping malformed insight (index={idx})");
                }
                insight
            })
            .collect();
        ParseResult::Valid(insights)
    })
}

fn insight_from_value(item: &Value) -> Option<Insight> {
    let kind = match item.get("type").and_then(Value::as_str)? {
        "fact" => InsightKind::Fact,
        "experience" => InsightKind::Experience,
        "pattern" => InsightKind::Pattern,
        _ => return None,
    };
    let content = item.get("content").and_then(Value::as_str)?.trim();
    if content.is_empty() {
        return None;
    }
    Some(Insight {
        kind,
        content: content.to_string(),
        confidence: item.get("confidence").and_then(Value::as_f64),
        importance: item
            .get("importance")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn reflection_prompt(contents: &[String]) -> String {
    format!(
        "Analyze these conversation memories and extract key insights.\n\n\
         Memories:\n{}\n\n\
         Extract:\n\
         1. Important facts about the user (semantic memory)\n\
         2. Significant experiences or interactions (episodic memory)\n\
         3. Patterns in preferences or behavior (procedural memory)\n\n\
         Return as JSON array with format:\n\
         [{{\"type\": \"fact|experience|pattern\", \"content\": \"...\", \"confidence\": 0.0-1.0, \"importance\": \"low|medium|high\"}}]\n",
        contents.join("\n")
    )
}

static MEMORY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Short id derived from content, the current time, and a process-local counter.
fn memory_id(content: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let sequence = MEMORY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(16);
    id
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Tiered memory store over a similarity index.
pub struct TieredMemoryStore {
    index: Arc<dyn SimilaritySearch>,
    generation: Option<Arc<dyn GenerationGateway>>,
    policy: ConsolidationPolicy,
}

impl TieredMemoryStore {
    /// Reflection only runs when both `generation` and a reflection model are set.
    pub fn new(
        index: Arc<dyn SimilaritySearch>,
        generation: Option<Arc<dyn GenerationGateway>>,
        policy: ConsolidationPolicy,
    ) -> Self {
        Self {
            index,
            generation,
            policy,
        }
    }

    /// Store `content` in `memory_type` and return its id.
    ///
    /// `memory_type`, `timestamp`, and `access_count = 0` are stamped over
    /// any caller-provided values of the same keys.
    pub fn add_memory(
        &self,
        content: &str,
        memory_type: MemoryType,
        metadata: Metadata,
    ) -> Result<String, MemoryError> {
        let id = memory_id(content);
        let mut metadata = metadata;
        metadata.insert(
            "memory_type".to_string(),
            Value::from(memory_type.as_str()),
        );
        metadata.insert("timestamp".to_string(), Value::from(iso_now()));
        metadata.insert("access_count".to_string(), Value::from(0));
        self.index.add(&id, content, metadata)?;
        debug!("added memory (id={id}, memory_type={memory_type})");
        Ok(id)
    }

    /// Up to `limit` memories most similar to `query`, restricted to
    /// `memory_types` unless it is empty.
    ///
    /// Every returned memory has its stored `access_count` incremented; the
    /// returned metadata reflects the state before the increment.
    pub fn search_memories(
        &self,
        query: &str,
        memory_types: &[MemoryType],
        limit: usize,
    ) -> Result<Vec<Memory>, MemoryError> {
        let filter = (!memory_types.is_empty()).then(|| {
            MetadataFilter::In(
                "memory_type".to_string(),
                memory_types
                    .iter()
                    .map(|memory_type| Value::from(memory_type.as_str()))
                    .collect(),
            )
        });
        let documents = self.index.query(query, limit, filter.as_ref())?;
        let memories: Vec<Memory> = documents.into_iter().map(Memory::from).collect();
        for memory in &memories {
            if let Err(err) = self.increment_access_count(memory) {
                warn!(
                    "failed to record memory access (id={}, error={})",
                    memory.id, err
                );
            }
        }
        Ok(memories)
    }

    /// Memory stored under `id`.
    pub fn get_memory(&self, id: &str) -> Option<Memory> {
        match self.index.get(&Selection::Ids(vec![id.to_string()])) {
            Ok(documents) => documents.into_iter().next().map(Memory::from),
            Err(err) => {
                warn!("memory lookup failed (id={id}, error={err})");
                None
            }
        }
    }

    /// Merge `updates` into the metadata of `id` and stamp `last_updated`.
    ///
    /// Returns false when the memory does not exist or the write failed.
    pub fn update_memory(&self, id: &str, updates: Metadata) -> bool {
        let Some(memory) = self.get_memory(id) else {
            return false;
        };
        let mut metadata = memory.metadata;
        metadata.extend(updates);
        metadata.insert("last_updated".to_string(), Value::from(iso_now()));
        match self.index.update(&[memory.id], &[metadata]) {
            Ok(()) => true,
            Err(err) => {
                warn!("memory update failed (id={id}, error={err})");
                false
            }
        }
    }

    /// Turn unarchived working memories into long-term memories.
    ///
    /// Every gathered working memory is archived and counted whether or not
    /// reflection succeeded.
    pub fn consolidate_memories(&self) -> ConsolidationReport {
        let filter = MetadataFilter::And(vec![
            MetadataFilter::eq("memory_type", MemoryType::Working.as_str()),
            MetadataFilter::ne("archived", true),
        ]);
        let working = match self.index.get(&Selection::Where(filter)) {
            Ok(documents) => documents,
            Err(err) => {
                warn!("failed to gather working memories (error={err})");
                return ConsolidationReport::default();
            }
        };
        if working.is_empty() {
            debug!("no working memories to consolidate");
            return ConsolidationReport::default();
        }

        let mut report = ConsolidationReport::default();
        let contents: Vec<String> = working.iter().map(|doc| doc.content.clone()).collect();
        for insight in self.reflect(&contents) {
            if let Some(id) = self.materialize(&insight) {
                report.created.push(id);
            }
        }

        for document in &working {
            let mut archived = Metadata::new();
            archived.insert("archived".to_string(), Value::Bool(true));
            if !self.update_memory(&document.id, archived) {
                warn!("failed to archive working memory (id={})", document.id);
            }
            report.consolidated += 1;
        }
        info!(
            "consolidated working memories (consolidated={}, created={})",
            report.consolidated,
            report.created.len()
        );
        report
    }

    fn increment_access_count(&self, memory: &Memory) -> Result<(), MemoryError> {
        let mut metadata = memory.metadata.clone();
        let count = metadata
            .get("access_count")
            .and_then(Value::as_u64)
            .unwrap_or_default();
        metadata.insert("access_count".to_string(), Value::from(count + 1));
        self.index.update(std::slice::from_ref(&memory.id), &[metadata])
    }

    fn reflect(&self, contents: &[String]) -> Vec<Insight> {
        let (Some(generation), Some(model)) = (&self.generation, &self.policy.reflection_model)
        else {
            debug!("reflection unavailable; archiving without insights");
            return Vec::new();
        };
        let response = match generation.generate(model, &reflection_prompt(contents)) {
            Ok(response) => response,
            Err(err) => {
                warn!("reflection failed (model={model}, error={err})");
                return Vec::new();
            }
        };
        match parse_insights(&response) {
            ParseResult::Valid(insights) => insights,
            ParseResult::Invalid(reason) => {
                warn!("discarding reflection output (reason={reason})");
                Vec::new()
            }
        }
    }

    fn materialize(&self, insight: &Insight) -> Option<String> {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Value::from("consolidation"));
        let memory_type = match insight.kind {
            InsightKind::Fact => {
                let confidence = insight.confidence.unwrap_or(self.policy.default_confidence);
                metadata.insert("confidence".to_string(), Value::from(confidence));
                MemoryType::Semantic
            }
            InsightKind::Experience => {
                let importance = insight
                    .importance
                    .clone()
                    .unwrap_or_else(|| self.policy.default_importance.clone());
                metadata.insert("importance".to_string(), Value::from(importance));
                MemoryType::Episodic
            }
            InsightKind::Pattern if self.policy.materialize_patterns => {
                let confidence = insight.confidence.unwrap_or(self.policy.default_confidence);
                metadata.insert("confidence".to_string(), Value::from(confidence));
                MemoryType::Procedural
            }
            InsightKind::Pattern => return None,
        };
        match self.add_memory(&insight.content, memory_type, metadata) {
            Ok(id) => Some(id),
            Err(err) => {
                warn!("failed to store insight (error={err})");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::LocalSimilarityIndex;
    use pretty_assertions::assert_eq;
    use recollect_protocol::GenerationError;
    use serde_json::json;

    struct CannedReflection(&'static str);

    impl GenerationGateway for CannedReflection {
        fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    fn store(reflection: Option<&'static str>) -> TieredMemoryStore {
        let generation = reflection
            .map(|text| Arc::new(CannedReflection(text)) as Arc<dyn GenerationGateway>);
        TieredMemoryStore::new(
            Arc::new(LocalSimilarityIndex::in_memory()),
            generation,
            ConsolidationPolicy {
                reflection_model: Some("reflect".to_string()),
                ..ConsolidationPolicy::default()
            },
        )
    }

    #[test]
    fn memory_type_round_trips_tags() {
        for tag in ["working", "episodic", "semantic", "procedural", "dream"] {
            assert_eq!(MemoryType::parse(tag).as_str(), tag);
        }
        assert_eq!(MemoryType::parse("dream"), MemoryType::Other("dream".to_string()));
    }

    #[test]
    fn add_memory_stamps_metadata() {
        let store = store(None);
        let mut metadata = Metadata::new();
        metadata.insert("access_count".to_string(), json!(7));
        metadata.insert("role".to_string(), json!("user"));
        let id = store
            .add_memory("likes tea", MemoryType::Semantic, metadata)
            .expect("add");
        assert_eq!(id.len(), 16);

        let memory = store.get_memory(&id).expect("memory");
        assert_eq!(memory.memory_type, MemoryType::Semantic);
        assert_eq!(memory.metadata["access_count"], json!(0));
        assert_eq!(memory.metadata["role"], json!("user"));
        assert!(!memory.timestamp.is_empty());
    }

    #[test]
    fn ids_differ_for_identical_content() {
        let store = store(None);
        let first = store
            .add_memory("same", MemoryType::Working, Metadata::new())
            .expect("add");
        let second = store
            .add_memory("same", MemoryType::Working, Metadata::new())
            .expect("add");
        assert_ne!(first, second);
    }

    #[test]
    fn update_memory_merges_and_stamps() {
        let store = store(None);
        let id = store
            .add_memory("note", MemoryType::Episodic, Metadata::new())
            .expect("add");
        let mut updates = Metadata::new();
        updates.insert("importance".to_string(), json!("high"));
        assert!(store.update_memory(&id, updates));
        assert!(!store.update_memory("missing", Metadata::new()));

        let memory = store.get_memory(&id).expect("memory");
        assert_eq!(memory.metadata["importance"], json!("high"));
        assert_eq!(memory.metadata["access_count"], json!(0));
        assert!(memory.metadata.contains_key("last_updated"));
        assert_eq!(store.get_memory("missing"), None);
    }

    #[test]
    fn search_filters_by_tier() {
        let store = store(None);
        store
            .add_memory("tea is green", MemoryType::Semantic, Metadata::new())
            .expect("add");
        store
            .add_memory("tea party last week", MemoryType::Episodic, Metadata::new())
            .expect("add");

        let semantic = store
            .search_memories("tea", &[MemoryType::Semantic], 5)
            .expect("search");
        assert_eq!(semantic.len(), 1);
        assert_eq!(semantic[0].content, "tea is green");

        let all = store.search_memories("tea", &[], 5).expect("search");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn consolidation_creates_tiered_memories_and_archives() {
        let store = store(Some(
            r#"[
                {"type": "fact", "content": "User is a chemist", "confidence": 0.9},
                {"type": "experience", "content": "Discussed lab safety"},
                {"type": "pattern", "content": "Prefers short answers"},
                {"type": "rumor", "content": "ignored"},
                {"content": "no type"}
            ]"#,
        ));
        store
            .add_memory("[user]: I am a chemist", MemoryType::Working, Metadata::new())
            .expect("add");
        store
            .add_memory("[assistant]: Noted", MemoryType::Working, Metadata::new())
            .expect("add");

        let report = store.consolidate_memories();
        assert_eq!(report.consolidated, 2);
        assert_eq!(report.created.len(), 3);

        let fact = store.get_memory(&report.created[0]).expect("fact");
        assert_eq!(fact.memory_type, MemoryType::Semantic);
        assert_eq!(fact.metadata["confidence"], json!(0.9));
        let experience = store.get_memory(&report.created[1]).expect("experience");
        assert_eq!(experience.memory_type, MemoryType::Episodic);
        assert_eq!(experience.metadata["importance"], json!("medium"));
        let pattern = store.get_memory(&report.created[2]).expect("pattern");
        assert_eq!(pattern.memory_type, MemoryType::Procedural);

        assert_eq!(store.consolidate_memories(), ConsolidationReport::default());
    }

    #[test]
    fn consolidation_archives_when_reflection_is_garbage() {
        let store = store(Some("I could not find anything"));
        store
            .add_memory("[user]: hi", MemoryType::Working, Metadata::new())
            .expect("add");
        let report = store.consolidate_memories();
        assert_eq!(
            report,
            ConsolidationReport {
                consolidated: 1,
                created: Vec::new(),
            }
        );
    }

    #[test]
    fn parse_insights_rejects_non_arrays() {
        assert!(matches!(
            parse_insights(r#"{"type": "fact"}"#),
            ParseResult::Invalid(_)
        ));
        let ParseResult::Valid(insights) =
            parse_insights("```json\n[{\"type\":\"fact\",\"content\":\" x \"}]\n```")
        else {
            panic!("expected valid insights");
        };
        assert_eq!(insights[0].content, "x");
        assert_eq!(insights[0].kind, InsightKind::Fact);
    }
}
