//! Job records: the durable unit of ingestion work.
//!
//! A Job is created by the front door at submission time, mutated only by the
//! worker executing it, and never deleted by the core. Status transitions are
//! monotonic (`queued -> running -> {succeeded, failed}`); once terminal, a Job
//! is immutable except for artifact inspection.

mod store;

pub use store::SqliteJobStore;

use crate::queue::{route, Lane};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Media type of an ingestion job.
///
/// A closed set: dispatch on modality is exhaustive, so adding a variant
/// forces every match site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Video,
    Audio,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Video => "video",
            Modality::Audio => "audio",
            Modality::Image => "image",
        }
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(Modality::Video),
            "audio" => Ok(Modality::Audio),
            "image" => Ok(Modality::Image),
            _ => Err(format!("Unsupported modality: {}", s)),
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named output recorded by a completed pipeline stage.
///
/// Artifacts from stages that completed are retained even when a later stage
/// fails, so a failed job still shows how far it got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageArtifact {
    /// Stage or artifact name (e.g. "transcript", "chunk", "index").
    pub stage: String,
    /// Human-readable description or content of the output.
    pub detail: String,
    /// When the artifact was recorded.
    pub created_at: DateTime<Utc>,
}

impl StageArtifact {
    pub fn new(stage: &str, detail: &str) -> Self {
        Self {
            stage: stage.to_string(),
            detail: detail.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A single unit of ingestion work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID.
    pub id: Uuid,
    /// Caller-supplied identifier for the source media.
    pub source_id: String,
    /// Media type, decides the processing pipeline and the queue lane.
    pub modality: Modality,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Queue lane this job was routed to.
    pub lane: Lane,
    /// Path to the source media file.
    pub media_path: PathBuf,
    /// Opaque caller metadata (e.g. a language hint).
    pub metadata: HashMap<String, String>,
    /// Ordered outputs of completed pipeline stages.
    pub stage_artifacts: Vec<StageArtifact>,
    /// Stage-tagged error message if the job failed.
    pub error: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job. The lane is derived from the modality.
    pub fn new(
        source_id: String,
        modality: Modality,
        media_path: PathBuf,
        metadata: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_id,
            modality,
            status: JobStatus::Queued,
            lane: route(modality),
            media_path,
            metadata,
            stage_artifacts: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find an artifact by stage name.
    pub fn artifact(&self, stage: &str) -> Option<&StageArtifact> {
        self.stage_artifacts.iter().find(|a| a.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued_and_routed() {
        let job = Job::new(
            "demo".to_string(),
            Modality::Video,
            PathBuf::from("/tmp/demo.mp4"),
            HashMap::new(),
        );
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.lane, Lane::Accelerator);
        assert!(job.stage_artifacts.is_empty());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_modality_parse() {
        assert_eq!("VIDEO".parse::<Modality>().unwrap(), Modality::Video);
        assert!("text".parse::<Modality>().is_err());
    }
}
