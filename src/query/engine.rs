//! The retrieval-augmented query engine.

use super::prompt::{render_prompt, SYSTEM_PROMPT};
use super::{Answer, Generator, QueryRequest, SourceChunk};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::VectorStore;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answers questions against the index.
///
/// Stateless per request: embed the question, retrieve candidates, assemble a
/// grounded prompt, generate. Queries are read-only with respect to the store
/// and run concurrently with ingestion.
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    default_top_k: usize,
    min_score: f32,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        default_top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            generator,
            default_top_k: default_top_k.max(1),
            min_score,
        }
    }

    /// Answer a question.
    ///
    /// Empty or below-threshold retrieval is not an error: it yields an
    /// explicit insufficient-evidence answer so the model never free-wheels
    /// on an empty context.
    #[instrument(skip(self, request), fields(question = %request.question))]
    pub async fn ask(&self, request: &QueryRequest) -> Result<Answer> {
        info!("Processing question");

        let query_embedding = self.embedder.embed(&request.question).await?;

        let top_k = request.top_k.unwrap_or(self.default_top_k);
        let hits = self
            .vector_store
            .search(
                &query_embedding,
                top_k,
                self.min_score,
                &request.filters.clone().into(),
            )
            .await?;

        if hits.is_empty() {
            debug!("No evidence above threshold");
            return Ok(Answer::insufficient_evidence());
        }

        let sources: Vec<SourceChunk> = hits.iter().map(SourceChunk::from).collect();
        let prompt = render_prompt(&request.question, &sources);

        let answer = self.generator.generate(SYSTEM_PROMPT, &prompt).await?;

        debug!("Answered with {} evidence chunks", sources.len());

        Ok(Answer {
            answer,
            evidence: sources.iter().map(|s| s.chunk_id.clone()).collect(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LeteError;
    use crate::job::Modality;
    use crate::query::{QueryFilters, INSUFFICIENT_EVIDENCE_ANSWER};
    use crate::vector_store::{IndexEntry, MemoryVectorStore};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Embeds text as a deterministic letter-frequency vector, so identical
    /// texts are identical vectors and similarity behaves sensibly.
    pub(crate) struct CountingEmbedder;

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut vector = vec![0.0f32; 26];
            for b in text.bytes() {
                if b.is_ascii_alphabetic() {
                    vector[(b.to_ascii_lowercase() - b'a') as usize] += 1.0;
                }
            }
            Ok(vector)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    /// Echoes the prompt back, so tests can inspect what was generated from.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
            Ok(format!("generated from: {}", prompt))
        }
    }

    /// Fails the test if the generator is ever invoked.
    struct UnreachableGenerator;

    #[async_trait]
    impl Generator for UnreachableGenerator {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
            Err(LeteError::Query(
                "generator must not be called without evidence".to_string(),
            ))
        }
    }

    async fn seeded_store() -> Arc<MemoryVectorStore> {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = CountingEmbedder;
        let texts = [
            ("meeting", 0u32, "the quarterly revenue target was raised"),
            ("meeting", 1u32, "lunch options were discussed at length"),
        ];
        let mut entries = Vec::new();
        for (source_id, seq, text) in texts {
            let chunk = crate::chunking::Chunk {
                id: crate::chunking::Chunk::make_id(source_id, seq),
                source_id: source_id.to_string(),
                modality: Modality::Audio,
                sequence_index: seq,
                text: text.to_string(),
                char_span: (0, text.len()),
                start_seconds: seq as f64 * 30.0,
                end_seconds: (seq + 1) as f64 * 30.0,
                metadata: HashMap::new(),
            };
            let embedding = embedder.embed(text).await.unwrap();
            entries.push(IndexEntry::new(chunk, embedding));
        }
        store.upsert_batch(&entries).await.unwrap();
        store
    }

    fn request(question: &str) -> QueryRequest {
        QueryRequest {
            question: question.to_string(),
            filters: QueryFilters::default(),
            top_k: None,
        }
    }

    #[tokio::test]
    async fn test_answer_carries_evidence_in_prompt_order() {
        let engine = QueryEngine::new(
            Arc::new(CountingEmbedder),
            seeded_store().await,
            Arc::new(EchoGenerator),
            5,
            0.0,
        );

        let answer = engine
            .ask(&request("the quarterly revenue target was raised"))
            .await
            .unwrap();

        assert!(!answer.evidence.is_empty());
        assert_eq!(answer.evidence[0], "meeting#0000");
        assert!(answer.answer.contains("quarterly revenue target"));
        assert_eq!(answer.evidence.len(), answer.sources.len());
    }

    #[tokio::test]
    async fn test_empty_index_yields_insufficient_evidence() {
        let engine = QueryEngine::new(
            Arc::new(CountingEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(UnreachableGenerator),
            5,
            0.25,
        );

        let answer = engine.ask(&request("anything at all")).await.unwrap();
        assert_eq!(answer.answer, INSUFFICIENT_EVIDENCE_ANSWER);
        assert!(answer.evidence.is_empty());
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_source_filter_limits_evidence() {
        let engine = QueryEngine::new(
            Arc::new(CountingEmbedder),
            seeded_store().await,
            Arc::new(EchoGenerator),
            5,
            0.0,
        );

        let mut req = request("revenue target");
        req.filters.source_id = Some("absent-source".to_string());

        let answer = engine.ask(&req).await.unwrap();
        assert_eq!(answer.answer, INSUFFICIENT_EVIDENCE_ANSWER);
    }
}
