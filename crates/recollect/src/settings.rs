//! Config mapping into runtime settings and policies.

use recollect_config::{ChatMode, RecollectConfig, UserSeedConfig};
use recollect_memory::{
    ChatSettings, ConsolidationPolicy, HistoryPolicy, PromptMode, SearchPolicy, UserSeed,
};

/// Translate config into settings for one chat session.
pub(crate) fn chat_settings_from_config(config: &RecollectConfig) -> ChatSettings {
    ChatSettings {
        mode: prompt_mode_from_config(config.chat.mode),
        chat_model: config.llm.chat_model.clone(),
        max_function_calls: config.chat.max_function_calls,
        memory_context_limit: config.memory.context_limit,
        history: history_policy_from_config(config),
        search: search_policy_from_config(config),
    }
}

/// Translate history config into the compaction policy.
pub(crate) fn history_policy_from_config(config: &RecollectConfig) -> HistoryPolicy {
    HistoryPolicy {
        max_tokens: config.history.max_tokens,
        max_history_pairs: config.history.max_history_pairs,
        summary_model: config.llm.summary_model.clone(),
    }
}

/// Translate search config into the search policy.
pub(crate) fn search_policy_from_config(config: &RecollectConfig) -> SearchPolicy {
    SearchPolicy {
        max_characters: config.search.max_characters,
        max_results: config.search.max_results,
        summary_model: config.llm.summary_model.clone(),
    }
}

/// Reflection falls back to the summary model when no dedicated model is set.
pub(crate) fn consolidation_policy_from_config(config: &RecollectConfig) -> ConsolidationPolicy {
    ConsolidationPolicy {
        reflection_model: Some(
            config
                .llm
                .reflection_model
                .clone()
                .unwrap_or_else(|| config.llm.summary_model.clone()),
        ),
        materialize_patterns: config.memory.materialize_patterns,
        ..ConsolidationPolicy::default()
    }
}

pub(crate) fn user_seed_from_config(config: &UserSeedConfig) -> UserSeed {
    UserSeed {
        name: config.name.clone(),
        last_name: config.last_name.clone(),
        occupation: config.occupation.clone(),
        location: config.location.clone(),
    }
}

fn prompt_mode_from_config(mode: ChatMode) -> PromptMode {
    match mode {
        ChatMode::Basic => PromptMode::Basic,
        ChatMode::Agentic => PromptMode::Agentic,
    }
}
