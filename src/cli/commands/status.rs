//! Status command - inspect one job's state and artifacts.

use crate::cli::Output;
use crate::config::Settings;
use crate::engine::Engine;
use uuid::Uuid;

/// Show a job's status, stage artifacts, and error if any.
pub fn run_status(job_id: &str, settings: Settings) -> anyhow::Result<()> {
    let id: Uuid = job_id
        .parse()
        .map_err(|_| anyhow::anyhow!("not a valid job ID: {}", job_id))?;

    let engine = Engine::new(settings)?;
    let Some(job) = engine.job(id)? else {
        Output::error(&format!("No job with ID {}", job_id));
        std::process::exit(1);
    };

    Output::header(&format!("Job {}", job.id));
    Output::kv("Source", &job.source_id);
    Output::kv("Modality", job.modality.as_str());
    Output::kv("Lane", job.lane.as_str());
    Output::kv("Status", job.status.as_str());
    Output::kv("Created", &job.created_at.to_rfc3339());
    Output::kv("Updated", &job.updated_at.to_rfc3339());

    if let Some(error) = &job.error {
        Output::kv("Error", error);
    }

    if !job.stage_artifacts.is_empty() {
        println!();
        Output::info("Stage artifacts:");
        for artifact in &job.stage_artifacts {
            let detail = if artifact.detail.len() > 120 {
                format!("{}...", &artifact.detail[..120])
            } else {
                artifact.detail.clone()
            };
            Output::kv(&artifact.stage, &detail);
        }
    }

    Ok(())
}
