//! The engine: submission front door, worker pool, and query entry point.
//!
//! Submission is cheap and synchronous: validate, persist a Job record,
//! publish a reference to the queue, return the ID. All heavy work happens on
//! the worker lanes.

use crate::backoff::RetryPolicy;
use crate::captioning::OpenAICaptioner;
use crate::chunking::TextChunker;
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{LeteError, Result};
use crate::extract::ExtractorSet;
use crate::job::{Job, Modality, SqliteJobStore};
use crate::pipeline::IngestionPipeline;
use crate::query::{Answer, Generator, OpenAIGenerator, QueryEngine, QueryRequest};
use crate::queue::{Lane, QueueMessage, TaskQueue};
use crate::transcription::WhisperTranscriber;
use crate::vector_store::{IndexedSource, MemoryVectorStore, SqliteVectorStore, VectorStore};
use crate::worker::spawn_worker;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use uuid::Uuid;

/// A request to ingest one media file.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Declared media type; decides the pipeline and the lane.
    pub modality: Modality,
    /// Stable identifier for the source; generated when absent.
    pub source_id: Option<String>,
    /// Path to the media file. A reference is queued, never the bytes.
    pub media_path: PathBuf,
    /// Opaque metadata carried through to chunks (e.g. a language hint).
    pub metadata: HashMap<String, String>,
}

/// Ties the stores, the queue, the pipeline, and the query engine together.
pub struct Engine {
    settings: Settings,
    queue: Arc<TaskQueue>,
    job_store: Arc<SqliteJobStore>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    pipeline: Arc<IngestionPipeline>,
    query_engine: QueryEngine,
}

impl Engine {
    /// Build an engine with the default OpenAI-backed capabilities.
    pub fn new(settings: Settings) -> Result<Self> {
        let retry = RetryPolicy::new(settings.retry.max_attempts, settings.retry.base_delay_ms);

        let transcriber = Arc::new(WhisperTranscriber::with_config(
            &settings.transcription.model,
            retry,
        ));
        let captioner = Arc::new(OpenAICaptioner::with_config(
            &settings.captioning.model,
            retry,
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            retry,
        ));
        let generator: Arc<dyn Generator> = Arc::new(OpenAIGenerator::with_config(
            &settings.query.model,
            retry,
        ));

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider.as_str() {
            "memory" => Arc::new(MemoryVectorStore::new()),
            _ => Arc::new(SqliteVectorStore::new(&settings.index_db_path())?),
        };
        let job_store = Arc::new(SqliteJobStore::new(&settings.jobs_db_path())?);

        let extractors = ExtractorSet::new(&settings, transcriber, captioner);

        Self::with_components(
            settings,
            extractors,
            embedder,
            vector_store,
            job_store,
            generator,
        )
    }

    /// Build an engine from explicit components (capability injection for
    /// tests, alternative providers).
    pub fn with_components(
        settings: Settings,
        extractors: ExtractorSet,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        job_store: Arc<SqliteJobStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(
            settings.chunking.target_chars,
            settings.chunking.overlap_units,
        );
        let pipeline = Arc::new(IngestionPipeline::new(
            extractors,
            chunker,
            embedder.clone(),
            vector_store.clone(),
            job_store.clone(),
        ));
        let query_engine = QueryEngine::new(
            embedder.clone(),
            vector_store.clone(),
            generator,
            settings.query.top_k,
            settings.query.min_score,
        );

        Ok(Self {
            settings,
            queue: Arc::new(TaskQueue::new()),
            job_store,
            vector_store,
            embedder,
            pipeline,
            query_engine,
        })
    }

    /// Validate a submission, persist the Job, and enqueue it.
    ///
    /// Returns immediately; validation failures are rejected here and never
    /// reach the queue.
    #[instrument(skip(self, request), fields(modality = %request.modality))]
    pub fn submit(&self, request: SubmitRequest) -> Result<Job> {
        if !request.media_path.is_file() {
            return Err(LeteError::InvalidInput(format!(
                "media file not found: {}",
                request.media_path.display()
            )));
        }

        let source_id = request
            .source_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let job = Job::new(
            source_id,
            request.modality,
            request.media_path,
            request.metadata,
        );
        self.job_store.create(&job)?;
        self.queue.enqueue(QueueMessage {
            job_id: job.id,
            modality: job.modality,
        });

        info!("Queued job {} for source {}", job.id, job.source_id);
        Ok(job)
    }

    /// Look up a job's current state and artifacts.
    pub fn job(&self, id: Uuid) -> Result<Option<Job>> {
        self.job_store.get(id)
    }

    /// Recently updated jobs, for operational listings.
    pub fn recent_jobs(&self, limit: usize) -> Result<Vec<Job>> {
        self.job_store.list_recent(limit)
    }

    /// Answer a question against the index.
    pub async fn ask(&self, request: &QueryRequest) -> Result<Answer> {
        self.query_engine.ask(request).await
    }

    /// Summaries of everything currently indexed.
    pub async fn sources(&self) -> Result<Vec<IndexedSource>> {
        self.vector_store.list_sources().await
    }

    /// Raw similarity search: embed the query text and rank index entries.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
        filter: &crate::vector_store::SearchFilter,
    ) -> Result<Vec<crate::vector_store::ScoredChunk>> {
        let query_embedding = self.embedder.embed(query).await?;
        self.vector_store
            .search(&query_embedding, top_k, min_score, filter)
            .await
    }

    /// Direct access to the vector store (used by the search command).
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// The engine's settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Spawn the configured worker pool; returns the join handles.
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for worker_id in 0..self.settings.queue.general_workers.max(1) {
            handles.push(spawn_worker(
                worker_id,
                Lane::General,
                self.queue.clone(),
                self.pipeline.clone(),
            ));
        }
        for worker_id in 0..self.settings.queue.accelerator_workers.max(1) {
            handles.push(spawn_worker(
                worker_id,
                Lane::Accelerator,
                self.queue.clone(),
                self.pipeline.clone(),
            ));
        }
        handles
    }

    /// Re-enqueue jobs that were queued or leased when a prior process died.
    ///
    /// Redelivery is safe: the pipeline is idempotent end to end.
    pub fn requeue_incomplete(&self) -> Result<usize> {
        let incomplete = self.job_store.list_incomplete()?;
        let count = incomplete.len();
        for job in incomplete {
            self.queue.enqueue(QueueMessage {
                job_id: job.id,
                modality: job.modality,
            });
        }
        if count > 0 {
            info!("Requeued {} incomplete job(s)", count);
        }
        Ok(count)
    }

    /// Close the queue; workers finish in-flight jobs, drain, and stop.
    pub fn shutdown(&self) {
        self.queue.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::extract::{Extractor, TextUnit};
    use crate::job::JobStatus;
    use crate::query::QueryFilters;
    use async_trait::async_trait;
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;

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

    struct EchoGenerator;

    #[async_trait]
    impl crate::query::Generator for EchoGenerator {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
            Ok(format!("answer based on: {}", prompt))
        }
    }

    fn video_units() -> Vec<TextUnit> {
        vec![
            TextUnit::speech("welcome to the quarterly all hands".into(), 0.0, 12.0),
            TextUnit::caption("a slide titled revenue goals".into(), 7.0),
            TextUnit::speech("our revenue target went up twenty percent".into(), 12.0, 25.0),
        ]
    }

    fn test_engine(units: Vec<TextUnit>) -> (Engine, tempfile::NamedTempFile) {
        let extractor = Arc::new(StaticExtractor { units });
        let extractors =
            ExtractorSet::with_extractors(extractor.clone(), extractor.clone(), extractor);
        let engine = Engine::with_components(
            Settings::default(),
            extractors,
            Arc::new(HashEmbedder),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(SqliteJobStore::in_memory().unwrap()),
            Arc::new(EchoGenerator),
        )
        .unwrap();

        let mut media = tempfile::NamedTempFile::new().unwrap();
        media.write_all(b"fake media bytes").unwrap();
        (engine, media)
    }

    async fn wait_for_terminal(engine: &Engine, job_id: Uuid) -> Job {
        for _ in 0..200 {
            let job = engine.job(job_id).unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached a terminal state", job_id);
    }

    #[tokio::test]
    async fn test_end_to_end_video_ingestion_and_query() {
        let (engine, media) = test_engine(video_units());
        let engine = Arc::new(engine);
        let workers = engine.spawn_workers();

        // Submit returns immediately with a queued job.
        let job = engine
            .submit(SubmitRequest {
                modality: Modality::Video,
                source_id: Some("demo1".into()),
                media_path: media.path().to_path_buf(),
                metadata: HashMap::new(),
            })
            .unwrap();
        assert_eq!(job.source_id, "demo1");

        // Poll status until the worker finishes.
        let finished = wait_for_terminal(&engine, job.id).await;
        assert_eq!(finished.status, JobStatus::Succeeded);
        assert!(finished
            .artifact("transcript")
            .unwrap()
            .detail
            .contains("revenue target"));

        // The query path cites the ingested source.
        let answer = engine
            .ask(&QueryRequest {
                question: "our revenue target went up twenty percent".into(),
                filters: QueryFilters::default(),
                top_k: None,
            })
            .await
            .unwrap();
        assert!(!answer.evidence.is_empty());
        assert!(answer.evidence.iter().any(|id| id.starts_with("demo1#")));

        engine.shutdown();
        for handle in workers {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_submission_rejects_missing_file() {
        let (engine, _media) = test_engine(video_units());
        let result = engine.submit(SubmitRequest {
            modality: Modality::Audio,
            source_id: None,
            media_path: PathBuf::from("/nonexistent/file.mp3"),
            metadata: HashMap::new(),
        });
        assert!(matches!(result, Err(LeteError::InvalidInput(_))));
        // Nothing was enqueued or persisted.
        assert!(engine.recent_jobs(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submission_generates_source_id() {
        let (engine, media) = test_engine(video_units());
        let job = engine
            .submit(SubmitRequest {
                modality: Modality::Image,
                source_id: None,
                media_path: media.path().to_path_buf(),
                metadata: HashMap::new(),
            })
            .unwrap();
        assert!(!job.source_id.is_empty());
    }

    #[tokio::test]
    async fn test_restart_requeues_incomplete_jobs() {
        let extractor = Arc::new(StaticExtractor {
            units: video_units(),
        });
        let job_store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let vector_store = Arc::new(MemoryVectorStore::new());

        let build_engine = |job_store: Arc<SqliteJobStore>,
                            vector_store: Arc<MemoryVectorStore>,
                            extractor: Arc<StaticExtractor>| {
            Engine::with_components(
                Settings::default(),
                ExtractorSet::with_extractors(
                    extractor.clone(),
                    extractor.clone(),
                    extractor,
                ),
                Arc::new(HashEmbedder),
                vector_store,
                job_store,
                Arc::new(EchoGenerator),
            )
            .unwrap()
        };

        let mut media = tempfile::NamedTempFile::new().unwrap();
        media.write_all(b"fake media bytes").unwrap();

        // First process: submit with no workers running, then "crash".
        let first = build_engine(job_store.clone(), vector_store.clone(), extractor.clone());
        let job = first
            .submit(SubmitRequest {
                modality: Modality::Audio,
                source_id: Some("stalled".into()),
                media_path: media.path().to_path_buf(),
                metadata: HashMap::new(),
            })
            .unwrap();
        drop(first);

        // Second process: the fresh queue is empty until the store is scanned.
        let second = Arc::new(build_engine(job_store, vector_store, extractor));
        let requeued = second.requeue_incomplete().unwrap();
        assert_eq!(requeued, 1);

        let workers = second.spawn_workers();
        let finished = wait_for_terminal(&second, job.id).await;
        assert_eq!(finished.status, JobStatus::Succeeded);

        second.shutdown();
        for handle in workers {
            handle.await.unwrap();
        }
    }
}
