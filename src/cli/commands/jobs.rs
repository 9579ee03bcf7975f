//! Jobs command - list recent ingestion jobs.

use crate::cli::Output;
use crate::config::Settings;
use crate::engine::Engine;

/// Show the most recently updated jobs.
pub fn run_jobs(limit: usize, settings: Settings) -> anyhow::Result<()> {
    let engine = Engine::new(settings)?;
    let jobs = engine.recent_jobs(limit)?;

    if jobs.is_empty() {
        Output::info("No jobs yet.");
        return Ok(());
    }

    Output::header("Recent jobs");
    for job in &jobs {
        Output::list_item(&format!(
            "{} {} [{}] {} ({})",
            job.id,
            job.source_id,
            job.modality.as_str(),
            job.status.as_str(),
            job.updated_at.format("%Y-%m-%d %H:%M"),
        ));
    }

    Ok(())
}
