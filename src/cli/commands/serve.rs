//! HTTP API server: the submission front door plus the worker pool.
//!
//! Submission creates a Job and returns its ID immediately; the worker lanes
//! do the heavy lifting. Queries run concurrently with ingestion.

use crate::cli::Output;
use crate::config::Settings;
use crate::engine::{Engine, SubmitRequest};
use crate::error::LeteError;
use crate::job::{Job, Modality};
use crate::query::QueryRequest;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new(settings)?);

    // Jobs left over from an unclean shutdown become eligible again.
    let requeued = engine.requeue_incomplete()?;
    if requeued > 0 {
        Output::info(&format!("Requeued {} incomplete job(s)", requeued));
    }

    let _workers = engine.spawn_workers();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/jobs/{job_id}", get(job_status))
        .route("/query", post(query))
        .route("/sources", get(sources))
        .layer(cors)
        .with_state(engine);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lete API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ingest", "POST /ingest");
    Output::kv("Job status", "GET  /jobs/:job_id");
    Output::kv("Query", "POST /query");
    Output::kv("Sources", "GET  /sources");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IngestRequest {
    /// Media type; unsupported values are rejected at deserialization.
    modality: Modality,
    /// Stable source identifier (generated if omitted).
    #[serde(default)]
    source_id: Option<String>,
    /// Path to the media file; a reference, never the bytes.
    path: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Serialize)]
struct IngestResponse {
    job_id: Uuid,
    source_id: String,
    status: String,
}

#[derive(Serialize)]
struct JobStatusResponse {
    job_id: Uuid,
    source_id: String,
    modality: String,
    status: String,
    lane: String,
    stage_artifacts: Vec<ArtifactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
struct ArtifactInfo {
    stage: String,
    detail: String,
    created_at: String,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            source_id: job.source_id,
            modality: job.modality.as_str().to_string(),
            status: job.status.as_str().to_string(),
            lane: job.lane.as_str().to_string(),
            stage_artifacts: job
                .stage_artifacts
                .into_iter()
                .map(|a| ArtifactInfo {
                    stage: a.stage,
                    detail: a.detail,
                    created_at: a.created_at.to_rfc3339(),
                })
                .collect(),
            error: job.error,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceInfo>,
    total: usize,
}

#[derive(Serialize)]
struct SourceInfo {
    source_id: String,
    modality: String,
    chunk_count: u32,
    indexed_at: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_status(e: &LeteError) -> StatusCode {
    match e {
        LeteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ingest(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    let result = engine.submit(SubmitRequest {
        modality: req.modality,
        source_id: req.source_id,
        media_path: req.path.into(),
        metadata: req.metadata,
    });

    match result {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(IngestResponse {
                job_id: job.id,
                source_id: job.source_id,
                status: job.status.as_str().to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn job_status(
    State(engine): State<Arc<Engine>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = job_id.parse::<Uuid>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("not a valid job ID: {}", job_id),
            }),
        )
            .into_response();
    };

    match engine.job(id) {
        Ok(Some(job)) => Json(JobStatusResponse::from(job)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no job with ID {}", job_id),
            }),
        )
            .into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn query(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    match engine.ask(&req).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn sources(State(engine): State<Arc<Engine>>) -> impl IntoResponse {
    match engine.sources().await {
        Ok(sources) => Json(SourcesResponse {
            total: sources.len(),
            sources: sources
                .into_iter()
                .map(|s| SourceInfo {
                    source_id: s.source_id,
                    modality: s.modality.as_str().to_string(),
                    chunk_count: s.chunk_count,
                    indexed_at: s.indexed_at.to_rfc3339(),
                })
                .collect(),
        })
        .into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
