//! Search command - raw similarity search without answer generation.

use crate::cli::preflight::{check, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::Engine;
use crate::job::Modality;
use crate::vector_store::SearchFilter;

/// Search the index and print the ranked chunks.
pub async fn run_search(
    query: &str,
    limit: usize,
    min_score: f32,
    source: Option<String>,
    modality: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    check(Operation::Query)?;

    let modality = modality
        .map(|m| m.parse::<Modality>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let engine = Engine::new(settings)?;

    let filter = SearchFilter {
        source_id: source,
        modality,
    };
    let results = engine.search(query, limit, min_score, &filter).await?;

    if results.is_empty() {
        Output::info("No results above the score threshold.");
        return Ok(());
    }

    for result in &results {
        Output::search_result(
            &result.chunk.source_id,
            &result.chunk.format_timestamp(),
            result.score,
            &result.chunk.text,
        );
    }

    println!();
    Output::info(&format!("{} result(s)", results.len()));
    Ok(())
}
