//! CLI module for Lete.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lete - Asynchronous Multimodal Ingestion and RAG
///
/// Makes video, audio, and images searchable and answerable.
/// The name "Lete" comes from the Norwegian word for "to search."
#[derive(Parser, Debug)]
#[command(name = "lete")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a media file for ingestion and wait for it to finish
    Ingest {
        /// Media type: video, audio, or image
        modality: String,

        /// Path to the media file
        path: String,

        /// Stable source identifier (generated if omitted)
        #[arg(short, long)]
        source_id: Option<String>,

        /// Metadata entries as key=value (repeatable)
        #[arg(short, long = "meta")]
        metadata: Vec<String>,
    },

    /// Show the status and stage artifacts of an ingestion job
    Status {
        /// Job ID returned at submission
        job_id: String,
    },

    /// Ask a question and get a cited answer from the indexed media
    Query {
        /// The question to ask
        question: String,

        /// Restrict evidence to one source
        #[arg(short, long)]
        source: Option<String>,

        /// Restrict evidence to one media type (video, audio, image)
        #[arg(short, long)]
        modality: Option<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Search for relevant chunks without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Minimum similarity score (0.0-1.0)
        #[arg(long, default_value = "0.25")]
        min_score: f32,

        /// Restrict results to one source
        #[arg(short, long)]
        source: Option<String>,

        /// Restrict results to one media type
        #[arg(short, long)]
        modality: Option<String>,
    },

    /// List indexed sources
    List,

    /// List recent ingestion jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run the HTTP API server with the worker pool
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "7700")]
        port: u16,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Open the configuration file in $EDITOR
    Edit,
}
