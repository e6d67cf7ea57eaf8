//! Runtime policies for history compaction, search, and consolidation.

/// Rolling window and compaction settings for a conversation.
#[derive(Debug, Clone)]
pub struct HistoryPolicy {
    /// Token budget for the rolling window before compaction runs.
    pub max_tokens: usize,
    /// Pairs kept verbatim at the tail of the window.
    pub max_history_pairs: usize,
    /// Model used for compaction and session summaries.
    pub summary_model: String,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            max_history_pairs: 2,
            summary_model: "gemini-2.0-flash".to_string(),
        }
    }
}

/// Keyword search settings.
#[derive(Debug, Clone)]
pub struct SearchPolicy {
    /// Largest serialized result set returned verbatim.
    pub max_characters: usize,
    /// Maximum number of matching turns returned.
    pub max_results: usize,
    /// Model used to condense oversized result sets.
    pub summary_model: String,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            max_characters: 1000,
            max_results: 3,
            summary_model: "gemini-2.0-flash".to_string(),
        }
    }
}

/// Working-memory consolidation settings.
#[derive(Debug, Clone)]
pub struct ConsolidationPolicy {
    /// Model used to extract insights; reflection is skipped when `None`.
    pub reflection_model: Option<String>,
    /// Turn `pattern` insights into procedural memories.
    pub materialize_patterns: bool,
    /// Confidence recorded for facts that do not state one.
    pub default_confidence: f64,
    /// Importance recorded for experiences that do not state one.
    pub default_importance: String,
}

impl Default for ConsolidationPolicy {
    fn default() -> Self {
        Self {
            reflection_model: None,
            materialize_patterns: true,
            default_confidence: 0.8,
            default_importance: "medium".to_string(),
        }
    }
}
