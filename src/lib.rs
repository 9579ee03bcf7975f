//! Lete - Asynchronous Multimodal Ingestion and RAG
//!
//! An engine for making "dark" media searchable: video, audio, and images go in,
//! grounded natural-language answers come out.
//!
//! The name "Lete" comes from the Norwegian word for "to search."
//!
//! # Overview
//!
//! Lete allows you to:
//! - Submit video, audio, and image files for asynchronous ingestion
//! - Track each ingestion job through its pipeline stages
//! - Build a searchable vector index from transcripts and frame captions
//! - Ask questions and get AI-powered answers with citations
//!
//! # Architecture
//!
//! The library is organized around a job pipeline and a query path:
//!
//! - `config` - Configuration management
//! - `job` - Job records and the durable job store
//! - `queue` - Task router and at-least-once work queue (two lanes)
//! - `worker` - Worker loops pulling jobs from the lanes
//! - `media` - ffmpeg-based audio normalization and frame sampling
//! - `extract` - Per-modality extractors producing timestamped text units
//! - `transcription` - Speech-to-text capability
//! - `captioning` - Image/frame captioning capability
//! - `chunking` - Deterministic chunking of text units
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector index abstraction
//! - `query` - Retrieval-augmented question answering
//! - `pipeline` - Per-job stage execution
//! - `engine` - Submission front door tying it all together
//!
//! # Example
//!
//! ```rust,no_run
//! use lete::config::Settings;
//! use lete::engine::{Engine, SubmitRequest};
//! use lete::job::Modality;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let engine = Arc::new(Engine::new(settings)?);
//!     let _workers = engine.spawn_workers();
//!
//!     let job = engine.submit(SubmitRequest {
//!         modality: Modality::Audio,
//!         source_id: Some("standup-2026-01".into()),
//!         media_path: "meeting.mp3".into(),
//!         metadata: Default::default(),
//!     })?;
//!     println!("queued job {}", job.id);
//!
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod captioning;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod job;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod transcription;
pub mod vector_store;
pub mod worker;

pub use error::{LeteError, Result};
