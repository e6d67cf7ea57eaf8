//! In-process similarity index using term-frequency cosine ranking, with
//! optional JSONL persistence.

use super::{Document, Metadata, MetadataFilter, Selection, SimilaritySearch};
use crate::error::MemoryError;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Similarity index held in memory and optionally mirrored to a JSONL file.
#[derive(Debug, Default)]
pub struct LocalSimilarityIndex {
    documents: RwLock<Vec<Document>>,
    path: Option<PathBuf>,
}

impl LocalSimilarityIndex {
    /// Volatile index with nothing on disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Index mirrored to `path`; existing documents are loaded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let documents = load_documents(&path)?;
        info!(
            "opened similarity index (path={}, documents={})",
            path.display(),
            documents.len()
        );
        Ok(Self {
            documents: RwLock::new(documents),
            path: Some(path),
        })
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, documents: &[Document]) -> Result<(), MemoryError> {
        match &self.path {
            Some(path) => write_documents(path, documents),
            None => Ok(()),
        }
    }
}

impl SimilaritySearch for LocalSimilarityIndex {
    fn add(&self, id: &str, content: &str, metadata: Metadata) -> Result<(), MemoryError> {
        let mut documents = self.documents.write();
        let document = Document {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
            embedding: None,
            score: None,
        };
        match documents.iter_mut().find(|existing| existing.id == id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        self.persist(&documents)?;
        debug!("indexed document (id={}, content_len={})", id, content.len());
        Ok(())
    }

    fn query(
        &self,
        text: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, MemoryError> {
        let query_terms = term_frequencies(text);
        let documents = self.documents.read();
        let mut ranked: Vec<Document> = documents
            .iter()
            .filter(|document| filter.is_none_or(|filter| filter.matches(&document.metadata)))
            .map(|document| Document {
                score: Some(cosine(&query_terms, &term_frequencies(&document.content))),
                ..document.clone()
            })
            .collect();
        ranked.sort_by(|left, right| {
            right
                .score
                .unwrap_or_default()
                .total_cmp(&left.score.unwrap_or_default())
        });
        ranked.truncate(n_results);
        Ok(ranked)
    }

    fn get(&self, selection: &Selection) -> Result<Vec<Document>, MemoryError> {
        let documents = self.documents.read();
        let selected = documents
            .iter()
            .filter(|document| match selection {
                Selection::Ids(ids) => ids.contains(&document.id),
                Selection::Where(filter) => filter.matches(&document.metadata),
            })
            .cloned()
            .collect();
        Ok(selected)
    }

    fn update(&self, ids: &[String], metadatas: &[Metadata]) -> Result<(), MemoryError> {
        if ids.len() != metadatas.len() {
            return Err(MemoryError::Similarity(format!(
                "update expects one metadata per id (ids={}, metadatas={})",
                ids.len(),
                metadatas.len()
            )));
        }
        let mut documents = self.documents.write();
        let mut updated = 0;
        for (id, metadata) in ids.iter().zip(metadatas) {
            if let Some(document) = documents.iter_mut().find(|document| &document.id == id) {
                document.metadata = metadata.clone();
                updated += 1;
            }
        }
        if updated > 0 {
            self.persist(&documents)?;
        }
        debug!("updated document metadata (requested={}, updated={})", ids.len(), updated);
        Ok(())
    }
}

/// Lowercased alphanumeric term counts.
fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut terms = HashMap::new();
    for term in text
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|term| !term.is_empty())
    {
        *terms.entry(term.to_lowercase()).or_insert(0.0) += 1.0;
    }
    terms
}

fn cosine(left: &HashMap<String, f32>, right: &HashMap<String, f32>) -> f32 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let dot: f32 = left
        .iter()
        .filter_map(|(term, weight)| right.get(term).map(|other| weight * other))
        .sum();
    let norm = |terms: &HashMap<String, f32>| terms.values().map(|w| w * w).sum::<f32>().sqrt();
    dot / (norm(left) * norm(right))
}

fn load_documents(path: &Path) -> Result<Vec<Document>, MemoryError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(OpenOptions::new().read(true).open(path)?);
    let mut documents = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        documents.push(serde_json::from_str(&line)?);
    }
    Ok(documents)
}

/// Rewrite the index file atomically.
fn write_documents(path: &Path, documents: &[Document]) -> Result<(), MemoryError> {
    let temp_path = path.with_extension("jsonl.tmp");
    {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_path)?;
        for document in documents {
            writeln!(file, "{}", serde_json::to_string(document)?)?;
        }
    }
    std::fs::rename(temp_path, path)?;
    Ok(())
}
