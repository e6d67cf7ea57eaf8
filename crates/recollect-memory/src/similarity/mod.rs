//! Similarity search capability behind the tiered memory store.

mod local;

pub use local::LocalSimilarityIndex;

use crate::error::MemoryError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open metadata map attached to every stored document.
pub type Metadata = Map<String, Value>;

/// A stored document as returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// Vector computed by the index, when it exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Similarity to the query; only set on query results.
    #[serde(default, skip_serializing)]
    pub score: Option<f32>,
}

/// Predicate over document metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    /// Key is present and equal to the value.
    Eq(String, Value),
    /// Key is absent or differs from the value.
    Ne(String, Value),
    /// Key is present and equal to one of the values.
    In(String, Vec<Value>),
    /// Every inner filter matches.
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        MetadataFilter::Eq(key.into(), value.into())
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> Self {
        MetadataFilter::Ne(key.into(), value.into())
    }

    /// True when `metadata` satisfies the filter.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            MetadataFilter::Eq(key, value) => metadata.get(key) == Some(value),
            MetadataFilter::Ne(key, value) => metadata.get(key) != Some(value),
            MetadataFilter::In(key, values) => metadata
                .get(key)
                .is_some_and(|found| values.contains(found)),
            MetadataFilter::And(filters) => filters.iter().all(|filter| filter.matches(metadata)),
        }
    }
}

/// Which documents a `get` call returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Ids(Vec<String>),
    Where(MetadataFilter),
}

/// Store of documents ranked by similarity to free text.
pub trait SimilaritySearch: Send + Sync {
    /// Store `content` under `id`, replacing any previous document with that id.
    fn add(&self, id: &str, content: &str, metadata: Metadata) -> Result<(), MemoryError>;

    /// Up to `n_results` documents matching `filter`, most similar first.
    fn query(
        &self,
        text: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, MemoryError>;

    /// Documents selected by id or metadata, in insertion order.
    fn get(&self, selection: &Selection) -> Result<Vec<Document>, MemoryError>;

    /// Replace the metadata of each listed document; unknown ids are skipped.
    fn update(&self, ids: &[String], metadatas: &[Metadata]) -> Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Metadata {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn filters_match_metadata() {
        let meta = metadata(json!({ "memory_type": "working", "access_count": 2 }));
        assert!(MetadataFilter::eq("memory_type", "working").matches(&meta));
        assert!(!MetadataFilter::eq("memory_type", "semantic").matches(&meta));
        assert!(MetadataFilter::ne("archived", true).matches(&meta));
        assert!(
            MetadataFilter::In(
                "memory_type".to_string(),
                vec![json!("semantic"), json!("working")]
            )
            .matches(&meta)
        );
        assert!(
            !MetadataFilter::And(vec![
                MetadataFilter::eq("memory_type", "working"),
                MetadataFilter::eq("access_count", 3),
            ])
            .matches(&meta)
        );
    }
}
