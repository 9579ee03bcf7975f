//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 BLOBs and cosine similarity is
//! computed in Rust. For large corpora, consider the sqlite-vec extension or a
//! dedicated vector database; the trait boundary makes that swap local.

use super::{
    cosine_similarity, rank, IndexEntry, IndexedSource, ScoredChunk, SearchFilter, VectorStore,
};
use crate::chunking::Chunk;
use crate::error::{LeteError, Result};
use crate::job::Modality;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_entries (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    modality TEXT NOT NULL,
    sequence_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    span_start INTEGER NOT NULL,
    span_end INTEGER NOT NULL,
    start_seconds REAL NOT NULL,
    end_seconds REAL NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_source_id ON index_entries(source_id);
"#;

/// SQLite-backed vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) the index database at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LeteError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize an embedding to little-endian bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize an embedding from little-endian bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<IndexEntry> {
    let modality: String = row.get(2)?;
    let metadata: String = row.get(9)?;
    let embedding: Vec<u8> = row.get(10)?;
    let indexed_at: String = row.get(11)?;

    Ok(IndexEntry {
        chunk: Chunk {
            id: row.get(0)?,
            source_id: row.get(1)?,
            modality: modality.parse().unwrap_or(Modality::Audio),
            sequence_index: row.get::<_, i64>(3)? as u32,
            text: row.get(4)?,
            char_span: (
                row.get::<_, i64>(5)? as usize,
                row.get::<_, i64>(6)? as usize,
            ),
            start_seconds: row.get(7)?,
            end_seconds: row.get(8)?,
            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        },
        embedding: SqliteVectorStore::bytes_to_embedding(&embedding),
        indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert_batch(&self, entries: &[IndexEntry]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for entry in entries {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO index_entries
                (id, source_id, modality, sequence_index, text, span_start, span_end,
                 start_seconds, end_seconds, metadata, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    entry.chunk.id,
                    entry.chunk.source_id,
                    entry.chunk.modality.as_str(),
                    entry.chunk.sequence_index as i64,
                    entry.chunk.text,
                    entry.chunk.char_span.0 as i64,
                    entry.chunk.char_span.1 as i64,
                    entry.chunk.start_seconds,
                    entry.chunk.end_seconds,
                    serde_json::to_string(&entry.chunk.metadata)?,
                    Self::embedding_to_bytes(&entry.embedding),
                    entry.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        debug!("Upserted {} index entries", entries.len());
        Ok(entries.len())
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM index_entries WHERE source_id = ?1",
            params![source_id],
        )?;
        debug!("Deleted {} entries for source {}", deleted, source_id);
        Ok(deleted)
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let conn = self.lock()?;

        // Narrow by filters in SQL, score the remainder in Rust.
        let mut sql = String::from(
            "SELECT id, source_id, modality, sequence_index, text, span_start, span_end, \
             start_seconds, end_seconds, metadata, embedding, indexed_at FROM index_entries \
             WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(source_id) = &filter.source_id {
            sql.push_str(" AND source_id = ?");
            args.push(Box::new(source_id.clone()));
        }
        if let Some(modality) = filter.modality {
            sql.push_str(" AND modality = ?");
            args.push(Box::new(modality.as_str().to_string()));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let entries = stmt
            .query_map(params.as_slice(), row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut results: Vec<ScoredChunk> = entries
            .into_iter()
            .map(|entry| ScoredChunk {
                score: cosine_similarity(query_embedding, &entry.embedding),
                chunk: entry.chunk,
            })
            .filter(|r| r.score >= min_score)
            .collect();

        rank(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn get_by_source(&self, source_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, modality, sequence_index, text, span_start, span_end, \
             start_seconds, end_seconds, metadata, embedding, indexed_at FROM index_entries \
             WHERE source_id = ?1 ORDER BY sequence_index",
        )?;
        let entries = stmt
            .query_map(params![source_id], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries.into_iter().map(|e| e.chunk).collect())
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, modality, COUNT(*), MAX(indexed_at) FROM index_entries \
             GROUP BY source_id ORDER BY MAX(indexed_at) DESC",
        )?;
        let sources = stmt
            .query_map([], |row| {
                let modality: String = row.get(1)?;
                let indexed_at: String = row.get(3)?;
                Ok(IndexedSource {
                    source_id: row.get(0)?,
                    modality: modality.parse().unwrap_or(Modality::Audio),
                    chunk_count: row.get::<_, i64>(2)? as u32,
                    indexed_at: DateTime::parse_from_rfc3339(&indexed_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    async fn entry_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM index_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::chunk;
    use super::*;

    fn entry(source_id: &str, sequence_index: u32, text: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry::new(chunk(source_id, sequence_index, text), embedding)
    }

    #[test]
    fn test_embedding_byte_roundtrip() {
        let original = vec![0.5f32, -1.25, 3.75, 0.0];
        let bytes = SqliteVectorStore::embedding_to_bytes(&original);
        let restored = SqliteVectorStore::bytes_to_embedding(&bytes);
        assert_eq!(original, restored);
    }

    #[tokio::test]
    async fn test_upsert_search_roundtrip() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                entry("s1", 0, "hello world", vec![1.0, 0.0]),
                entry("s1", 1, "something else", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.entry_count().await.unwrap(), 2);

        let results = store
            .search(&[1.0, 0.0], 1, 0.0, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "hello world");
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_replace_on_same_id() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert_batch(&[entry("s1", 0, "old text", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert_batch(&[entry("s1", 0, "new text", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.entry_count().await.unwrap(), 1);
        let chunks = store.get_by_source("s1").await.unwrap();
        assert_eq!(chunks[0].text, "new text");
    }

    #[tokio::test]
    async fn test_delete_by_source() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                entry("s1", 0, "a", vec![1.0]),
                entry("s1", 1, "b", vec![1.0]),
                entry("s2", 0, "c", vec![1.0]),
            ])
            .await
            .unwrap();

        let deleted = store.delete_by_source("s1").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.entry_count().await.unwrap(), 1);
        assert!(store.get_by_source("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_modality_filter_in_sql() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let mut video_chunk = chunk("v1", 0, "frame caption");
        video_chunk.modality = Modality::Video;
        store
            .upsert_batch(&[
                IndexEntry::new(video_chunk, vec![1.0, 0.0]),
                entry("a1", 0, "speech", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = SearchFilter {
            source_id: None,
            modality: Some(Modality::Video),
        };
        let results = store.search(&[1.0, 0.0], 10, 0.0, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source_id, "v1");
    }

    #[tokio::test]
    async fn test_list_sources() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                entry("s1", 0, "a", vec![1.0]),
                entry("s1", 1, "b", vec![1.0]),
            ])
            .await
            .unwrap();

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source_id, "s1");
        assert_eq!(sources[0].chunk_count, 2);
    }
}
