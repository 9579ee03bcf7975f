//! List command - show everything currently indexed.

use crate::cli::Output;
use crate::config::Settings;
use crate::engine::Engine;

/// List indexed sources.
pub async fn run_list(settings: Settings) -> anyhow::Result<()> {
    let engine = Engine::new(settings)?;
    let sources = engine.sources().await?;

    if sources.is_empty() {
        Output::info("Nothing indexed yet. Ingest something first: lete ingest audio <file>");
        return Ok(());
    }

    Output::header("Indexed sources");
    for source in &sources {
        Output::source_info(
            &source.source_id,
            source.modality.as_str(),
            source.chunk_count,
            &source.indexed_at.format("%Y-%m-%d %H:%M").to_string(),
        );
    }

    println!();
    Output::info(&format!("{} source(s)", sources.len()));
    Ok(())
}
