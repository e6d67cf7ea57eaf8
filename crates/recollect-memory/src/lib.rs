//! Conversation memory for Recollect: rolling history with compaction,
//! durable summaries, keyword search, user profiles, and tiered long-term
//! memory.

pub mod error;
pub mod history;
pub mod ledger;
pub mod measure;
pub mod parse;
pub mod persistence;
pub mod policy;
pub mod prompt;
pub mod search;
pub mod session;
pub mod similarity;
pub mod tiered;
pub mod tools;
pub mod turns;
pub mod users;

/// Memory and persistence error types.
pub use error::{MemoryError, PersistenceError};
/// Rolling window tracker and its outcomes.
pub use history::{
    CompactionOutcome, ConversationHistoryTracker, SummaryUpdate, TurnReport, render_history,
};
/// Durable summary accessor.
pub use ledger::SummaryLedger;
/// Text length measures.
pub use measure::TextMeasure;
/// Defensive parsing of model output.
pub use parse::{ParseResult, parse_chat_pairs, parse_json};
/// Relational persistence gateway and the SQLite adapter.
pub use persistence::{Fetch, PersistenceGateway, QueryOutput, Row, SqlValue, SqliteGateway};
/// History, search, and consolidation policies.
pub use policy::{ConsolidationPolicy, HistoryPolicy, SearchPolicy};
/// System prompt assembly.
pub use prompt::{FunctionResult, PromptBuilder, PromptMode, compose_request};
/// Keyword search over persisted history.
pub use search::{HistorySearchIndex, NO_RESULTS_MESSAGE, SearchHit, SearchResult};
/// Per-session context object.
pub use session::{CALL_LIMIT_MESSAGE, ChatReply, ChatSession, ChatSettings, RecordedTurn};
/// Similarity search interface and the local index.
pub use similarity::{
    Document, LocalSimilarityIndex, Metadata, MetadataFilter, Selection, SimilaritySearch,
};
/// Tiered long-term memory.
pub use tiered::{
    ConsolidationReport, Insight, InsightKind, Memory, MemorySession, MemoryType,
    TieredMemoryStore, UserProfile, parse_insights,
};
/// Function calling in agentic mode.
pub use tools::{
    ADD_USER_INFO, FunctionCall, MemoryTools, SEARCH_CHAT_HISTORY, follow_up_prompt,
    parse_function_call,
};
/// Persisted conversation pairs.
pub use turns::{PersistedTurn, TurnStore};
/// User profile row.
pub use users::{UserDirectory, UserInfo, UserSeed};
