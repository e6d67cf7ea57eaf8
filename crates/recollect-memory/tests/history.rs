//! Rolling window, compaction, and summary cadence integration tests.

use pretty_assertions::assert_eq;
use recollect_memory::{
    CompactionOutcome, ConversationHistoryTracker, HistoryPolicy, PersistenceGateway,
    SqliteGateway, SummaryUpdate, UserDirectory, UserSeed,
};
use recollect_protocol::{ChatPair, ConversationTurn, GenerationGateway, SessionContext};
use recollect_test_utils::{FailingPersistence, FixedGeneration, RecordingGeneration, ScriptedGeneration};
use std::sync::Arc;

fn database() -> (Arc<dyn PersistenceGateway>, i64) {
    let gateway: Arc<dyn PersistenceGateway> =
        Arc::new(SqliteGateway::open_in_memory().expect("sqlite"));
    let user_id = UserDirectory::new(gateway.clone())
        .ensure_user(&UserSeed {
            name: "Guest".to_string(),
            ..UserSeed::default()
        })
        .expect("user");
    (gateway, user_id)
}

fn policy(max_tokens: usize, max_history_pairs: usize) -> HistoryPolicy {
    HistoryPolicy {
        max_tokens,
        max_history_pairs,
        summary_model: "summary-model".to_string(),
    }
}

fn tracker(
    persistence: Arc<dyn PersistenceGateway>,
    user_id: Option<i64>,
    policy: HistoryPolicy,
    generation: Arc<dyn GenerationGateway>,
) -> ConversationHistoryTracker {
    ConversationHistoryTracker::new(
        SessionContext::new(user_id, "session-1"),
        policy,
        persistence,
        generation,
    )
}

/// The window never holds more than `2k` turns.
#[test]
fn window_stays_bounded() {
    let (gateway, user_id) = database();
    let mut tracker = tracker(
        gateway,
        Some(user_id),
        policy(100_000, 2),
        Arc::new(FixedGeneration::new("unused")),
    );
    for idx in 0..10 {
        let report = tracker.add_turn(&format!("question {idx}"), &format!("answer {idx}"), 2);
        assert!(report.persisted);
        assert_eq!(report.compaction, None);
        assert!(tracker.rolling_history().len() <= 4);
    }
    assert_eq!(
        tracker.rolling_history().last(),
        Some(&ConversationTurn::assistant("answer 9"))
    );
}

/// Three pairs with `k = 2` keep pairs two and three in memory while pair one
/// remains in the durable store.
#[test]
fn evicted_pairs_remain_durable() {
    let (gateway, user_id) = database();
    let mut tracker = tracker(
        gateway,
        Some(user_id),
        policy(100_000, 2),
        Arc::new(FixedGeneration::new("unused")),
    );
    tracker.add_turn("q1", "a1", 2);
    tracker.add_turn("q2", "a2", 2);
    tracker.add_turn("q3", "a3", 2);

    assert_eq!(
        tracker.rolling_history(),
        &[
            ConversationTurn::user("q2"),
            ConversationTurn::assistant("a2"),
            ConversationTurn::user("q3"),
            ConversationTurn::assistant("a3"),
        ]
    );
    let pairs = tracker
        .get_latest_chat_pairs("session-1", 3)
        .expect("pairs");
    assert_eq!(
        pairs,
        vec![
            ChatPair::new("q1", "a1"),
            ChatPair::new("q2", "a2"),
            ChatPair::new("q3", "a3"),
        ]
    );
    assert_eq!(
        tracker.get_latest_chat_pairs("session-1", 1).expect("pairs"),
        vec![ChatPair::new("q3", "a3")]
    );
}

/// Compaction replaces only the turns older than the kept tail.
#[test]
fn compaction_preserves_recent_turns() {
    let (gateway, user_id) = database();
    let generation = ScriptedGeneration::new(Vec::<String>::new())
        .with_fallback(r#"[{"user": "earlier topics", "assistant": "condensed"}]"#);
    let mut tracker = tracker(
        gateway,
        Some(user_id),
        policy(1, 1),
        Arc::new(generation.clone()),
    );

    let first = tracker.add_turn("q1 about tea", "a1 about tea", 3);
    assert_eq!(first.compaction, Some(CompactionOutcome::NothingToCompact));

    let second = tracker.add_turn("q2 about coffee", "a2 about coffee", 3);
    assert_eq!(
        second.compaction,
        Some(CompactionOutcome::Compacted {
            replaced_turns: 2,
            summarized_pairs: 1,
        })
    );
    assert_eq!(
        tracker.rolling_history(),
        &[
            ConversationTurn::user("earlier topics"),
            ConversationTurn::assistant("condensed"),
            ConversationTurn::user("q2 about coffee"),
            ConversationTurn::assistant("a2 about coffee"),
        ]
    );

    let prompts = generation.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].0, "summary-model");
    assert!(prompts[0].1.contains("q1 about tea"));
    assert!(!prompts[0].1.contains("q2 about coffee"));
}

/// A malformed compaction response leaves the window untouched.
#[test]
fn malformed_compaction_keeps_window() {
    let (gateway, user_id) = database();
    let mut tracker = tracker(
        gateway,
        Some(user_id),
        policy(1, 1),
        Arc::new(FixedGeneration::new("I cannot produce JSON today.")),
    );
    tracker.add_turn("q1", "a1", 3);
    let before = tracker.rolling_history().to_vec();
    let outcome = tracker.compact();
    assert_eq!(outcome, CompactionOutcome::NothingToCompact);

    let report = tracker.add_turn("q2", "a2", 3);
    assert!(matches!(report.compaction, Some(CompactionOutcome::Failed(_))));
    let mut expected = before;
    expected.push(ConversationTurn::user("q2"));
    expected.push(ConversationTurn::assistant("a2"));
    assert_eq!(tracker.rolling_history(), expected.as_slice());
}

/// Below the cadence nothing is written and the counter is unchanged.
#[test]
fn summary_cadence_guards_writes() {
    let (gateway, user_id) = database();
    let (generation, prompts) = RecordingGeneration::new("The user chatted about numbers.");
    let mut tracker = tracker(
        gateway,
        Some(user_id),
        policy(100_000, 2),
        Arc::new(generation),
    );

    tracker.add_turn("one", "1", 2);
    assert_eq!(tracker.update_chat_summary(2), SummaryUpdate::NotDue { pending: 1 });
    assert_eq!(tracker.pairs_since_last_summary(), 1);
    assert_eq!(tracker.latest_summary(), None);

    tracker.add_turn("two", "2", 2);
    assert_eq!(
        tracker.update_chat_summary(2),
        SummaryUpdate::InsufficientHistory { available: 2 }
    );
    assert_eq!(tracker.pairs_since_last_summary(), 2);
    assert!(prompts.lock().is_empty());

    tracker.add_turn("three", "3", 2);
    assert_eq!(tracker.update_chat_summary(2), SummaryUpdate::Saved);
    assert_eq!(tracker.pairs_since_last_summary(), 0);
    assert_eq!(
        tracker.latest_summary().as_deref(),
        Some("The user chatted about numbers.")
    );
    let seen = prompts.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1.contains("three"));
}

/// A failed write is reported, not counted, and does not stop compaction.
#[test]
fn persistence_failure_still_compacts() {
    let (gateway, user_id) = database();
    let failing: Arc<dyn PersistenceGateway> =
        Arc::new(FailingPersistence::on("INSERT INTO chat_history", gateway));
    let generation = ScriptedGeneration::new(Vec::<String>::new())
        .with_fallback(r#"{"user": "summary q", "assistant": "summary a"}"#);
    let mut tracker = tracker(failing, Some(user_id), policy(1, 1), Arc::new(generation));

    tracker.add_turn("q1", "a1", 3);
    let report = tracker.add_turn("q2", "a2", 3);
    assert!(!report.persisted);
    assert_eq!(tracker.pairs_since_last_summary(), 0);
    assert!(matches!(
        report.compaction,
        Some(CompactionOutcome::Compacted { .. })
    ));
    assert_eq!(
        tracker.get_latest_chat_pairs("session-1", 5).expect("pairs"),
        Vec::<ChatPair>::new()
    );
}

/// Without a known user nothing is persisted.
#[test]
fn missing_user_skips_persistence() {
    let (gateway, _user_id) = database();
    let mut tracker = tracker(
        gateway,
        None,
        policy(100_000, 2),
        Arc::new(FixedGeneration::new("unused")),
    );
    let report = tracker.add_turn("q", "a", 2);
    assert!(!report.persisted);
    assert_eq!(tracker.rolling_history().len(), 2);
    assert_eq!(tracker.pairs_since_last_summary(), 0);
}
