//! Query command - ask a question against the indexed media.

use crate::cli::preflight::{check, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::Engine;
use crate::job::Modality;
use crate::query::{QueryFilters, QueryRequest};

/// Ask a question and print the cited answer.
pub async fn run_query(
    question: &str,
    source: Option<String>,
    modality: Option<String>,
    top_k: Option<usize>,
    settings: Settings,
) -> anyhow::Result<()> {
    check(Operation::Query)?;

    let modality = modality
        .map(|m| m.parse::<Modality>())
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let engine = Engine::new(settings)?;

    let spinner = Output::spinner("Thinking...");
    let answer = engine
        .ask(&QueryRequest {
            question: question.to_string(),
            filters: QueryFilters {
                source_id: source,
                modality,
            },
            top_k,
        })
        .await?;
    spinner.finish_and_clear();

    println!("{}", answer.format_for_display());
    Ok(())
}
