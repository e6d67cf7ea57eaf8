//! Tiered memory store integration tests.

use pretty_assertions::assert_eq;
use recollect_memory::{
    ConsolidationPolicy, ConsolidationReport, LocalSimilarityIndex, MemorySession, MemoryType,
    Metadata, TieredMemoryStore,
};
use recollect_protocol::{GenerationGateway, Role};
use recollect_test_utils::{FailingGeneration, RecordingGeneration};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn store_with(
    index: Arc<LocalSimilarityIndex>,
    generation: Arc<dyn GenerationGateway>,
) -> TieredMemoryStore {
    TieredMemoryStore::new(
        index,
        Some(generation),
        ConsolidationPolicy {
            reflection_model: Some("reflection-model".to_string()),
            ..ConsolidationPolicy::default()
        },
    )
}

/// No working memories means no reflection call and no writes.
#[test]
fn consolidation_without_working_memories_is_a_no_op() {
    let index = Arc::new(LocalSimilarityIndex::in_memory());
    let (generation, prompts) = RecordingGeneration::new("[]");
    let store = store_with(index.clone(), Arc::new(generation));
    let id = store
        .add_memory("User is left-handed", MemoryType::Semantic, Metadata::new())
        .expect("add");
    let before = store.get_memory(&id).expect("memory");

    assert_eq!(store.consolidate_memories(), ConsolidationReport::default());
    assert!(prompts.lock().is_empty());
    assert_eq!(index.len(), 1);
    assert_eq!(store.get_memory(&id), Some(before));
}

/// Each search returning a memory bumps its access count by one.
#[test]
fn access_count_tracks_search_hits_only() {
    let store = store_with(
        Arc::new(LocalSimilarityIndex::in_memory()),
        Arc::new(FailingGeneration),
    );
    let id = store
        .add_memory("User enjoys hiking", MemoryType::Episodic, Metadata::new())
        .expect("add");
    let count = || store.get_memory(&id).expect("memory").metadata["access_count"].clone();
    assert_eq!(count(), json!(0));

    let first = store
        .search_memories("hiking", &[MemoryType::Episodic], 5)
        .expect("search");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].metadata["access_count"], json!(0));
    assert_eq!(count(), json!(1));

    store
        .search_memories("hiking trips", &[], 5)
        .expect("search");
    assert_eq!(count(), json!(2));

    let mut updates = Metadata::new();
    updates.insert("importance".to_string(), json!("high"));
    assert!(store.update_memory(&id, updates));
    assert_eq!(count(), json!(2));

    let none = store
        .search_memories("hiking", &[MemoryType::Semantic], 5)
        .expect("search");
    assert!(none.is_empty());
    assert_eq!(count(), json!(2));
}

/// Reflection failure still archives every working memory.
#[test]
fn failed_reflection_archives_working_memories() {
    let index = Arc::new(LocalSimilarityIndex::in_memory());
    let store = store_with(index, Arc::new(FailingGeneration));
    let ids: Vec<String> = ["[user]: hi", "[assistant]: hello"]
        .into_iter()
        .map(|content| {
            store
                .add_memory(content, MemoryType::Working, Metadata::new())
                .expect("add")
        })
        .collect();

    let report = store.consolidate_memories();
    assert_eq!(report.consolidated, 2);
    assert!(report.created.is_empty());
    for id in ids {
        let memory = store.get_memory(&id).expect("memory");
        assert_eq!(memory.memory_type, MemoryType::Working);
        assert_eq!(memory.metadata["archived"], json!(true));
    }
    assert_eq!(store.consolidate_memories(), ConsolidationReport::default());
}

/// A session over a file-backed index remembers facts across restarts.
#[test]
fn session_memories_survive_reopen() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("memory").join("memories.jsonl");
    let reflection = r#"[{"type": "fact", "content": "User 42 lives in Lisbon", "confidence": 0.95}]"#;

    {
        let index = Arc::new(LocalSimilarityIndex::open(&path).expect("open"));
        let (generation, _prompts) = RecordingGeneration::new(reflection);
        let mut session = MemorySession::new(store_with(index, Arc::new(generation)));
        session.process_message(Role::User, "I moved to Lisbon last year", "42");
        session.process_message(Role::Assistant, "Lisbon is lovely!", "42");
        let report = session.end_session();
        assert_eq!(report.consolidated, 2);
        assert_eq!(report.created.len(), 1);
    }

    let index = Arc::new(LocalSimilarityIndex::open(&path).expect("reopen"));
    let session = MemorySession::new(store_with(index, Arc::new(FailingGeneration)));
    assert_eq!(
        session.get_relevant_context("Lisbon", 3),
        "Known facts:\n- User 42 lives in Lisbon"
    );
    assert_eq!(
        session.get_user_profile("42").facts,
        vec!["User 42 lives in Lisbon".to_string()]
    );
}
