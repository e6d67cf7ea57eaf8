use super::{ConsolidationReport, Memory, MemoryType, TieredMemoryStore};
use crate::similarity::Metadata;
use chrono::Local;
use log::{debug, warn};
use recollect_protocol::Role;
use serde::Serialize;
use serde_json::Value;

/// Facts and preferences remembered about one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub facts: Vec<String>,
    pub preferences: Vec<String>,
}

/// Chat-facing wrapper that feeds a [`TieredMemoryStore`] and renders its
/// contents back into prompt context.
///
/// Store failures are logged and degrade to empty results.
pub struct MemorySession {
    store: TieredMemoryStore,
    session_id: String,
}

impl MemorySession {
    pub fn new(store: TieredMemoryStore) -> Self {
        Self {
            store,
            session_id: new_session_id(),
        }
    }

    pub fn store(&self) -> &TieredMemoryStore {
        &self.store
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record a chat message in working memory. Returns the new memory id.
    pub fn process_message(&self, role: Role, content: &str, user_id: &str) -> Option<String> {
        let mut metadata = Metadata::new();
        metadata.insert("user_id".to_string(), Value::from(user_id));
        metadata.insert("session_id".to_string(), Value::from(self.session_id.as_str()));
        metadata.insert("role".to_string(), Value::from(role.as_str()));
        let content = format!("[{}]: {}", role.as_str(), content);
        match self
            .store
            .add_memory(&content, MemoryType::Working, metadata)
        {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(
                    "failed to record message in working memory (session_id={}, error={})",
                    self.session_id, err
                );
                None
            }
        }
    }

    /// Long-term memories relevant to `query`, rendered as labeled sections.
    ///
    /// Returns an empty string when nothing matched.
    pub fn get_relevant_context(&self, query: &str, limit: usize) -> String {
        let sections = [
            ("Known facts:", self.search(query, MemoryType::Semantic, limit)),
            ("Past interactions:", self.search(query, MemoryType::Episodic, limit)),
            ("User preferences:", self.search(query, MemoryType::Procedural, 1)),
        ];
        sections
            .iter()
            .filter(|(_, memories)| !memories.is_empty())
            .map(|(label, memories)| {
                let lines: Vec<String> = memories
                    .iter()
                    .map(|memory| format!("- {}", memory.content))
                    .collect();
                format!("{label}\n{}", lines.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Consolidate working memories and start a new session id.
    pub fn end_session(&mut self) -> ConsolidationReport {
        let report = self.store.consolidate_memories();
        let previous = std::mem::replace(&mut self.session_id, new_session_id());
        debug!(
            "memory session rotated (previous={}, current={})",
            previous, self.session_id
        );
        report
    }

    /// What the store remembers about `user_id`.
    pub fn get_user_profile(&self, user_id: &str) -> UserProfile {
        let contents = |memories: Vec<Memory>| {
            memories
                .into_iter()
                .map(|memory| memory.content)
                .collect::<Vec<_>>()
        };
        UserProfile {
            facts: contents(self.search(&format!("user {user_id}"), MemoryType::Semantic, 10)),
            preferences: contents(self.search(
                &format!("user {user_id} preferences"),
                MemoryType::Procedural,
                5,
            )),
        }
    }

    fn search(&self, query: &str, memory_type: MemoryType, limit: usize) -> Vec<Memory> {
        match self
            .store
            .search_memories(query, std::slice::from_ref(&memory_type), limit)
        {
            Ok(memories) => memories,
            Err(err) => {
                warn!("memory search failed (memory_type={memory_type}, error={err})");
                Vec::new()
            }
        }
    }
}

fn new_session_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
