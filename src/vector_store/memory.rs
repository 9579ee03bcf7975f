//! In-memory vector store implementation.
//!
//! Useful for testing and small corpora.

use super::{
    cosine_similarity, rank, IndexEntry, IndexedSource, ScoredChunk, SearchFilter, VectorStore,
};
use crate::chunking::Chunk;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector store.
pub struct MemoryVectorStore {
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut store = self.entries.write().unwrap();
        for entry in entries {
            store.insert(entry.chunk.id.clone(), entry.clone());
        }
        Ok(entries.len())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
        let mut store = self.entries.write().unwrap();
        let initial_len = store.len();
        store.retain(|_, entry| entry.chunk.source_id != source_id);
        Ok(initial_len - store.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let store = self.entries.read().unwrap();

        let mut results: Vec<ScoredChunk> = store
            .values()
            .filter(|entry| filter.matches(&entry.chunk))
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .filter(|r| r.score >= min_score)
            .collect();

        rank(&mut results);
        results.truncate(top_k);

        Ok(results)
    }

    async fn get_by_source(&self, source_id: &str) -> Result<Vec<Chunk>> {
        let store = self.entries.read().unwrap();
        let mut chunks: Vec<Chunk> = store
            .values()
            .filter(|entry| entry.chunk.source_id == source_id)
            .map(|entry| entry.chunk.clone())
            .collect();
        chunks.sort_by_key(|c| c.sequence_index);
        Ok(chunks)
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let store = self.entries.read().unwrap();

        let mut sources: HashMap<String, IndexedSource> = HashMap::new();
        for entry in store.values() {
            let summary = sources
                .entry(entry.chunk.source_id.clone())
                .or_insert_with(|| IndexedSource {
                    source_id: entry.chunk.source_id.clone(),
                    modality: entry.chunk.modality,
                    chunk_count: 0,
                    indexed_at: entry.indexed_at,
                });
            summary.chunk_count += 1;
            if entry.indexed_at > summary.indexed_at {
                summary.indexed_at = entry.indexed_at;
            }
        }

        let mut sources: Vec<IndexedSource> = sources.into_values().collect();
        sources.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(sources)
    }

    async fn entry_count(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::chunk;
    use super::*;

    fn entry(source_id: &str, sequence_index: u32, text: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry::new(chunk(source_id, sequence_index, text), embedding)
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                entry("s1", 0, "hello world", vec![1.0, 0.0, 0.0]),
                entry("s1", 1, "goodbye world", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.entry_count().await.unwrap(), 2);

        let results = store
            .search(&[1.0, 0.0, 0.0], 10, 0.0, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "hello world");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_marker_chunk_ranks_first() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                entry("s1", 0, "unrelated noise", vec![0.1, 0.9, 0.2]),
                entry("s1", 1, "XYZZY-MARKER", vec![0.9, 0.1, 0.0]),
                entry("s2", 0, "other noise", vec![0.2, 0.8, 0.3]),
            ])
            .await
            .unwrap();

        // Query vector equal to the marker's embedding.
        let results = store
            .search(&[0.9, 0.1, 0.0], 1, 0.0, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "XYZZY-MARKER");
    }

    #[tokio::test]
    async fn test_min_score_threshold() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[entry("s1", 0, "orthogonal", vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();

        let results = store
            .search(&[1.0, 0.0, 0.0], 10, 0.5, &SearchFilter::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_source_filter() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                entry("s1", 0, "from one", vec![1.0, 0.0, 0.0]),
                entry("s2", 0, "from two", vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = SearchFilter {
            source_id: Some("s2".to_string()),
            modality: None,
        };
        let results = store.search(&[1.0, 0.0, 0.0], 10, 0.0, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source_id, "s2");
    }

    #[tokio::test]
    async fn test_delete_then_upsert_is_idempotent() {
        let store = MemoryVectorStore::new();

        // First ingestion run.
        store
            .upsert_batch(&[
                entry("s1", 0, "first", vec![1.0, 0.0, 0.0]),
                entry("s1", 1, "second", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        // Re-run: delete-then-upsert with identical content.
        let deleted = store.delete_by_source("s1").await.unwrap();
        assert_eq!(deleted, 2);
        store
            .upsert_batch(&[
                entry("s1", 0, "first", vec![1.0, 0.0, 0.0]),
                entry("s1", 1, "second", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let chunks = store.get_by_source("s1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["s1#0000", "s1#0001"]
        );
    }

    #[tokio::test]
    async fn test_list_sources_aggregates() {
        let store = MemoryVectorStore::new();
        store
            .upsert_batch(&[
                entry("s1", 0, "a", vec![1.0]),
                entry("s1", 1, "b", vec![1.0]),
                entry("s2", 0, "c", vec![1.0]),
            ])
            .await
            .unwrap();

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);
        let s1 = sources.iter().find(|s| s.source_id == "s1").unwrap();
        assert_eq!(s1.chunk_count, 2);
    }
}
