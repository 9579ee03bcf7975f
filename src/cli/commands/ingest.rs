//! Ingest command - submit a file and watch the job through its stages.

use crate::cli::preflight::{check, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::{Engine, SubmitRequest};
use crate::job::{JobStatus, Modality};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Submit a media file and wait for the pipeline to finish.
pub async fn run_ingest(
    modality: &str,
    path: &str,
    source_id: Option<String>,
    metadata_pairs: &[String],
    settings: Settings,
) -> anyhow::Result<()> {
    let modality: Modality = modality
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    check(Operation::Ingest)?;

    let mut metadata = HashMap::new();
    for pair in metadata_pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("metadata must be key=value, got: {}", pair))?;
        metadata.insert(key.to_string(), value.to_string());
    }

    let engine = Arc::new(Engine::new(settings)?);
    let workers = engine.spawn_workers();

    let job = engine.submit(SubmitRequest {
        modality,
        source_id,
        media_path: PathBuf::from(path),
        metadata,
    })?;

    Output::info(&format!("Queued job {} (source {})", job.id, job.source_id));

    let spinner = Output::spinner("Processing...");
    let finished = loop {
        let current = engine
            .job(job.id)?
            .ok_or_else(|| anyhow::anyhow!("job disappeared from the store"))?;
        if current.status.is_terminal() {
            break current;
        }
        if let Some(artifact) = current.stage_artifacts.last() {
            spinner.set_message(format!("Processing... ({})", artifact.stage));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };
    spinner.finish_and_clear();

    engine.shutdown();
    for handle in workers {
        let _ = handle.await;
    }

    match finished.status {
        JobStatus::Succeeded => {
            Output::success(&format!("Ingested {}", finished.source_id));
            for artifact in &finished.stage_artifacts {
                Output::kv(&artifact.stage, &preview(&artifact.detail));
            }
            Ok(())
        }
        _ => {
            Output::error(&format!(
                "Ingestion failed: {}",
                finished.error.as_deref().unwrap_or("unknown error")
            ));
            if !finished.stage_artifacts.is_empty() {
                Output::info("Stages completed before the failure:");
                for artifact in &finished.stage_artifacts {
                    Output::kv(&artifact.stage, &preview(&artifact.detail));
                }
            }
            std::process::exit(1);
        }
    }
}

fn preview(detail: &str) -> String {
    if detail.len() > 120 {
        format!("{}...", &detail[..120])
    } else {
        detail.to_string()
    }
}
