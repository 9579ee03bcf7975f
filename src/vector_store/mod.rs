//! Vector store abstraction.
//!
//! An [`IndexEntry`] exists if and only if its chunk was successfully
//! embedded. Re-ingesting a source must call [`VectorStore::delete_by_source`]
//! before upserting so no stale or duplicate entries survive.
//!
//! Similarity is cosine. Ranking is score descending; ties break to the lower
//! `sequence_index`, then lexicographic `source_id`, so results are fully
//! deterministic and observable.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::error::Result;
use crate::job::Modality;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk with its persisted embedding, keyed by chunk ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this entry was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            chunk,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Optional constraints applied during search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Restrict hits to one source.
    pub source_id: Option<String>,
    /// Restrict hits to one media type.
    pub modality: Option<Modality>,
}

impl SearchFilter {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(source_id) = &self.source_id {
            if &chunk.source_id != source_id {
                return false;
            }
        }
        if let Some(modality) = self.modality {
            if chunk.modality != modality {
                return false;
            }
        }
        true
    }
}

/// Summary of one indexed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSource {
    pub source_id: String,
    pub modality: Modality,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// When the source was last indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace entries, keyed by chunk ID.
    async fn upsert_batch(&self, entries: &[IndexEntry]) -> Result<usize>;

    /// Remove every entry belonging to a source. Returns the count removed.
    async fn delete_by_source(&self, source_id: &str) -> Result<usize>;

    /// Nearest-neighbor search with a score threshold and optional filters.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>>;

    /// All chunks of a source, ordered by sequence index.
    async fn get_by_source(&self, source_id: &str) -> Result<Vec<Chunk>>;

    /// Summaries of all indexed sources, most recently indexed first.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Total number of index entries.
    async fn entry_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Order results by score descending, breaking ties deterministically.
pub(crate) fn rank(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
            .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn chunk(source_id: &str, sequence_index: u32, text: &str) -> Chunk {
        Chunk {
            id: Chunk::make_id(source_id, sequence_index),
            source_id: source_id.to_string(),
            modality: Modality::Audio,
            sequence_index,
            text: text.to_string(),
            char_span: (0, text.len()),
            start_seconds: sequence_index as f64 * 30.0,
            end_seconds: (sequence_index + 1) as f64 * 30.0,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[]), 0.0);
    }

    #[test]
    fn test_rank_tie_break_prefers_earlier_sequence() {
        let mut results = vec![
            ScoredChunk {
                chunk: chunk("s", 3, "later"),
                score: 0.5,
            },
            ScoredChunk {
                chunk: chunk("s", 1, "earlier"),
                score: 0.5,
            },
            ScoredChunk {
                chunk: chunk("s", 2, "best"),
                score: 0.9,
            },
        ];
        rank(&mut results);
        assert_eq!(results[0].chunk.sequence_index, 2);
        assert_eq!(results[1].chunk.sequence_index, 1);
        assert_eq!(results[2].chunk.sequence_index, 3);
    }

    #[test]
    fn test_filter_matching() {
        let c = chunk("demo", 0, "x");

        assert!(SearchFilter::default().matches(&c));
        assert!(SearchFilter {
            source_id: Some("demo".into()),
            modality: Some(Modality::Audio),
        }
        .matches(&c));
        assert!(!SearchFilter {
            source_id: Some("other".into()),
            modality: None,
        }
        .matches(&c));
        assert!(!SearchFilter {
            source_id: None,
            modality: Some(Modality::Video),
        }
        .matches(&c));
    }
}
