//! Lete CLI entry point.

use anyhow::Result;
use clap::Parser;
use lete::cli::{commands, Cli, Commands};
use lete::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("lete={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest {
            modality,
            path,
            source_id,
            metadata,
        } => {
            commands::run_ingest(modality, path, source_id.clone(), metadata, settings).await?;
        }

        Commands::Status { job_id } => {
            commands::run_status(job_id, settings)?;
        }

        Commands::Query {
            question,
            source,
            modality,
            top_k,
        } => {
            commands::run_query(question, source.clone(), modality.clone(), *top_k, settings)
                .await?;
        }

        Commands::Search {
            query,
            limit,
            min_score,
            source,
            modality,
        } => {
            commands::run_search(
                query,
                *limit,
                *min_score,
                source.clone(),
                modality.clone(),
                settings,
            )
            .await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Jobs { limit } => {
            commands::run_jobs(*limit, settings)?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
