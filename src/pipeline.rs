//! Per-job pipeline execution.
//!
//! A worker hands a job ID to [`IngestionPipeline::run`], which walks the
//! stages `extract -> chunk -> embed -> index`, appending a named artifact
//! after each successful stage. A stage failure moves the job to `failed`
//! with a stage-tagged error while artifacts from completed stages are kept.
//!
//! Every stage is idempotent: chunk IDs are deterministic and indexing is
//! delete-then-upsert, so re-running a redelivered job cannot corrupt or
//! duplicate the index.

use crate::chunking::{Chunk, TextChunker};
use crate::embedding::Embedder;
use crate::error::{LeteError, Result};
use crate::extract::{ExtractorSet, TextUnit, TextUnitKind};
use crate::job::{Job, SqliteJobStore};
use crate::vector_store::{IndexEntry, VectorStore};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A stage-tagged failure, recorded on the job before it goes terminal.
struct StageFailure {
    stage: &'static str,
    error: LeteError,
}

impl StageFailure {
    fn at(stage: &'static str) -> impl FnOnce(LeteError) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

/// Executes the ingestion stages for one job at a time.
pub struct IngestionPipeline {
    extractors: ExtractorSet,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    job_store: Arc<SqliteJobStore>,
}

impl IngestionPipeline {
    pub fn new(
        extractors: ExtractorSet,
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        job_store: Arc<SqliteJobStore>,
    ) -> Self {
        Self {
            extractors,
            chunker,
            embedder,
            vector_store,
            job_store,
        }
    }

    /// Run a job to a terminal state.
    ///
    /// The `running` transition happens before any external call so pollers
    /// never see a stale `queued` while work is underway. Stage failures are
    /// recorded on the job, not returned; the error path here is reserved for
    /// the job store itself being unavailable.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: Uuid) -> Result<()> {
        let job = self
            .job_store
            .get(job_id)?
            .ok_or_else(|| LeteError::JobNotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            // Redelivered after completion; at-least-once makes this normal.
            info!("Job already terminal, skipping");
            return Ok(());
        }

        self.job_store.mark_running(job_id)?;

        match self.run_stages(&job).await {
            Ok(indexed) => {
                info!("Job succeeded with {} index entries", indexed);
                self.job_store.mark_succeeded(job_id)?;
            }
            Err(failure) => {
                let message = format!("{}: {}", failure.stage, failure.error);
                warn!("Job failed at {}", message);
                self.job_store.mark_failed(job_id, &message)?;
            }
        }
        Ok(())
    }

    async fn run_stages(&self, job: &Job) -> std::result::Result<usize, StageFailure> {
        // --- extract ---
        let units = self
            .extractors
            .for_modality(job.modality)
            .extract(&job.media_path, &job.metadata)
            .await
            .map_err(StageFailure::at("extract"))?;

        if units.is_empty() {
            return Err(StageFailure {
                stage: "extract",
                error: LeteError::Media("no text could be extracted from the media".into()),
            });
        }
        self.record_extract_artifacts(job, &units)
            .map_err(StageFailure::at("extract"))?;

        // --- chunk ---
        let chunks = self
            .chunker
            .chunk(&job.source_id, job.modality, &units, &job.metadata);
        self.job_store
            .append_artifact(job.id, "chunk", &format!("{} chunks", chunks.len()))
            .map_err(StageFailure::at("chunk"))?;

        // --- embed ---
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(StageFailure::at("embed"))?;

        if embeddings.len() != chunks.len() {
            return Err(StageFailure {
                stage: "embed",
                error: LeteError::IndexConsistency(format!(
                    "{} chunks but {} embeddings",
                    chunks.len(),
                    embeddings.len()
                )),
            });
        }
        self.job_store
            .append_artifact(job.id, "embed", &format!("{} embeddings", embeddings.len()))
            .map_err(StageFailure::at("embed"))?;

        // --- index ---
        let indexed = self
            .index_chunks(&job.source_id, chunks, embeddings)
            .await
            .map_err(StageFailure::at("index"))?;
        self.job_store
            .append_artifact(job.id, "index", &format!("{} entries", indexed))
            .map_err(StageFailure::at("index"))?;

        Ok(indexed)
    }

    /// Record what extraction produced: the transcript text and caption count.
    fn record_extract_artifacts(&self, job: &Job, units: &[TextUnit]) -> Result<()> {
        let transcript = units
            .iter()
            .filter(|u| u.kind == TextUnitKind::Speech)
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if !transcript.is_empty() {
            self.job_store
                .append_artifact(job.id, "transcript", &transcript)?;
        }

        let captions = units
            .iter()
            .filter(|u| u.kind == TextUnitKind::Caption)
            .count();
        if captions > 0 {
            self.job_store
                .append_artifact(job.id, "captions", &format!("{} captions", captions))?;
        }
        Ok(())
    }

    /// Replace a source's index entries: delete everything first so a re-run
    /// can never leave duplicates or stale chunks behind.
    async fn index_chunks(
        &self,
        source_id: &str,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize> {
        self.vector_store.delete_by_source(source_id).await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry::new(chunk, embedding))
            .collect();

        self.vector_store
            .upsert_batch(&entries)
            .await
            .map_err(|e| LeteError::IndexConsistency(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::Result;
    use crate::extract::Extractor;
    use crate::job::{JobStatus, Modality};
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    struct StaticExtractor {
        units: Vec<TextUnit>,
    }

    #[async_trait]
    impl Extractor for StaticExtractor {
        async fn extract(
            &self,
            _media_path: &Path,
            _metadata: &HashMap<String, String>,
        ) -> Result<Vec<TextUnit>> {
            Ok(self.units.clone())
        }
    }

    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
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

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(LeteError::OpenAI("connection reset".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(LeteError::OpenAI("connection reset".into()))
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    fn speech_units() -> Vec<TextUnit> {
        vec![
            TextUnit::speech("the quarterly revenue target was raised".into(), 0.0, 30.0),
            TextUnit::speech("marketing will hire two new people".into(), 30.0, 60.0),
        ]
    }

    fn static_extractors(units: Vec<TextUnit>) -> ExtractorSet {
        let extractor = Arc::new(StaticExtractor { units });
        ExtractorSet::with_extractors(extractor.clone(), extractor.clone(), extractor)
    }

    fn pipeline_with(
        units: Vec<TextUnit>,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        job_store: Arc<SqliteJobStore>,
    ) -> IngestionPipeline {
        let settings = Settings::default();
        IngestionPipeline::new(
            static_extractors(units),
            TextChunker::new(settings.chunking.target_chars, settings.chunking.overlap_units),
            embedder,
            vector_store,
            job_store,
        )
    }

    fn queued_job(source_id: &str, modality: Modality, store: &SqliteJobStore) -> Job {
        let job = Job::new(
            source_id.to_string(),
            modality,
            PathBuf::from("/tmp/fake.mp4"),
            HashMap::new(),
        );
        store.create(&job).unwrap();
        job
    }

    #[tokio::test]
    async fn test_successful_run_records_artifacts() {
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let vector_store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline_with(
            speech_units(),
            Arc::new(HashEmbedder),
            vector_store.clone(),
            job_store.clone(),
        );

        let job = queued_job("demo1", Modality::Audio, &job_store);
        pipeline.run(job.id).await.unwrap();

        let finished = job_store.get(job.id).unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Succeeded);
        assert!(finished
            .artifact("transcript")
            .unwrap()
            .detail
            .contains("quarterly revenue"));
        assert!(finished.artifact("chunk").is_some());
        assert!(finished.artifact("embed").is_some());
        assert!(finished.artifact("index").is_some());
        assert!(vector_store.entry_count().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_embed_failure_keeps_extract_artifact() {
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let pipeline = pipeline_with(
            speech_units(),
            Arc::new(FailingEmbedder),
            Arc::new(MemoryVectorStore::new()),
            job_store.clone(),
        );

        let job = queued_job("demo2", Modality::Audio, &job_store);
        pipeline.run(job.id).await.unwrap();

        let failed = job_store.get(job.id).unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        // Stage-tagged error, not a generic failure.
        assert!(failed.error.as_deref().unwrap().starts_with("embed:"));
        // The extraction artifact survived the later failure.
        assert!(failed.artifact("transcript").is_some());
        assert!(failed.artifact("index").is_none());
    }

    #[tokio::test]
    async fn test_reingestion_is_idempotent() {
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let vector_store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline_with(
            speech_units(),
            Arc::new(HashEmbedder),
            vector_store.clone(),
            job_store.clone(),
        );

        let first = queued_job("demo3", Modality::Audio, &job_store);
        pipeline.run(first.id).await.unwrap();
        let ids_after_first: Vec<String> = vector_store
            .get_by_source("demo3")
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.clone())
            .collect();

        // Same source, identical content, second job.
        let second = queued_job("demo3", Modality::Audio, &job_store);
        pipeline.run(second.id).await.unwrap();
        let ids_after_second: Vec<String> = vector_store
            .get_by_source("demo3")
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.clone())
            .collect();

        assert_eq!(ids_after_first, ids_after_second);
        assert_eq!(
            vector_store.entry_count().await.unwrap(),
            ids_after_first.len()
        );
    }

    #[tokio::test]
    async fn test_rerun_of_terminal_job_is_a_no_op() {
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let vector_store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline_with(
            speech_units(),
            Arc::new(HashEmbedder),
            vector_store.clone(),
            job_store.clone(),
        );

        let job = queued_job("demo4", Modality::Audio, &job_store);
        pipeline.run(job.id).await.unwrap();
        let first_updated = job_store.get(job.id).unwrap().unwrap().updated_at;

        // Redelivery after completion must not touch the job.
        pipeline.run(job.id).await.unwrap();
        let after = job_store.get(job.id).unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Succeeded);
        assert_eq!(after.updated_at, first_updated);
    }

    #[tokio::test]
    async fn test_empty_extraction_fails_extract_stage() {
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let pipeline = pipeline_with(
            Vec::new(),
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorStore::new()),
            job_store.clone(),
        );

        let job = queued_job("demo5", Modality::Image, &job_store);
        pipeline.run(job.id).await.unwrap();

        let failed = job_store.get(job.id).unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.as_deref().unwrap().starts_with("extract:"));
    }
}
