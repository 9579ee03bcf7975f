//! SQLite-backed job record store.
//!
//! Status transitions are enforced in SQL (`UPDATE ... WHERE status IN (...)`)
//! so that concurrent workers cannot resurrect a terminal job and readers never
//! observe a partial write.

use super::{Job, JobStatus, StageArtifact};
use crate::error::{LeteError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    modality TEXT NOT NULL,
    status TEXT NOT NULL,
    lane TEXT NOT NULL,
    media_path TEXT NOT NULL,
    metadata TEXT NOT NULL,
    stage_artifacts TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_source_id ON jobs(source_id);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
"#;

/// Durable job record store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the job database at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized job store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory job store (useful for testing).
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
            .map_err(|e| LeteError::JobStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Persist a freshly created job.
    pub fn create(&self, job: &Job) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO jobs
            (id, source_id, modality, status, lane, media_path, metadata,
             stage_artifacts, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                job.id.to_string(),
                job.source_id,
                job.modality.as_str(),
                job.status.as_str(),
                job.lane.as_str(),
                job.media_path.to_string_lossy(),
                serde_json::to_string(&job.metadata)?,
                serde_json::to_string(&job.stage_artifacts)?,
                job.error,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        debug!("Created job {} ({})", job.id, job.source_id);
        Ok(())
    }

    /// Fetch a job by ID.
    pub fn get(&self, id: uuid::Uuid) -> Result<Option<Job>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, source_id, modality, status, lane, media_path, metadata, \
             stage_artifacts, error, created_at, updated_at FROM jobs WHERE id = ?1",
            params![id.to_string()],
            row_to_job,
        )
        .optional()
        .map_err(LeteError::from)
    }

    /// List the most recently updated jobs.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Job>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, modality, status, lane, media_path, metadata, \
             stage_artifacts, error, created_at, updated_at FROM jobs \
             ORDER BY updated_at DESC LIMIT ?1",
        )?;
        let jobs = stmt
            .query_map(params![limit as i64], row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Jobs that never reached a terminal state, oldest first.
    ///
    /// Used on startup to requeue work that was queued or leased when the
    /// process died; at-least-once delivery makes the re-run safe.
    pub fn list_incomplete(&self) -> Result<Vec<Job>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, modality, status, lane, media_path, metadata, \
             stage_artifacts, error, created_at, updated_at FROM jobs \
             WHERE status IN ('queued', 'running') ORDER BY created_at",
        )?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Transition a job to `running`.
    ///
    /// Allowed from `queued` and (for queue redelivery) from `running`.
    /// The transition is immediately visible to pollers.
    pub fn mark_running(&self, id: uuid::Uuid) -> Result<()> {
        self.transition(id, JobStatus::Running, &["queued", "running"], None)
    }

    /// Transition a running job to `succeeded`.
    pub fn mark_succeeded(&self, id: uuid::Uuid) -> Result<()> {
        self.transition(id, JobStatus::Succeeded, &["running"], None)
    }

    /// Transition a job to `failed` with a stage-tagged error message.
    pub fn mark_failed(&self, id: uuid::Uuid, error: &str) -> Result<()> {
        self.transition(id, JobStatus::Failed, &["queued", "running"], Some(error))
    }

    fn transition(
        &self,
        id: uuid::Uuid,
        to: JobStatus,
        allowed_from: &[&str],
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let placeholders = allowed_from
            .iter()
            .map(|s| format!("'{}'", s))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE jobs SET status = ?1, error = COALESCE(?2, error), updated_at = ?3 \
             WHERE id = ?4 AND status IN ({})",
            placeholders
        );
        let changed = conn.execute(
            &sql,
            params![
                to.as_str(),
                error,
                chrono::Utc::now().to_rfc3339(),
                id.to_string()
            ],
        )?;

        if changed == 0 {
            return Err(LeteError::InvalidTransition(format!(
                "job {} cannot move to {} from its current state",
                id, to
            )));
        }
        debug!("Job {} -> {}", id, to);
        Ok(())
    }

    /// Append a named artifact to a running job.
    pub fn append_artifact(&self, id: uuid::Uuid, stage: &str, detail: &str) -> Result<()> {
        let conn = self.lock()?;
        let current: Option<String> = conn
            .query_row(
                "SELECT stage_artifacts FROM jobs WHERE id = ?1 AND status = 'running'",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(current) = current else {
            return Err(LeteError::InvalidTransition(format!(
                "job {} is not running; artifacts are frozen",
                id
            )));
        };

        let mut artifacts: Vec<StageArtifact> = serde_json::from_str(&current)?;
        artifacts.push(StageArtifact::new(stage, detail));

        conn.execute(
            "UPDATE jobs SET stage_artifacts = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(&artifacts)?,
                chrono::Utc::now().to_rfc3339(),
                id.to_string()
            ],
        )?;
        Ok(())
    }
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get(0)?;
    let modality: String = row.get(2)?;
    let status: String = row.get(3)?;
    let lane: String = row.get(4)?;
    let media_path: String = row.get(5)?;
    let metadata: String = row.get(6)?;
    let artifacts: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Job {
        id: id.parse().unwrap_or_default(),
        source_id: row.get(1)?,
        modality: modality.parse().unwrap_or(super::Modality::Audio),
        status: status.parse().unwrap_or(JobStatus::Failed),
        lane: lane.parse().unwrap_or(crate::queue::Lane::General),
        media_path: media_path.into(),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        stage_artifacts: serde_json::from_str(&artifacts).unwrap_or_default(),
        error: row.get(8)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}
