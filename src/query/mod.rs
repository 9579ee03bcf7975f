//! Retrieval-augmented question answering.
//!
//! A query is a single request/response operation: embed the question, search
//! the index, assemble a grounded prompt from the hits, and generate a cited
//! answer. Nothing here is persisted.

mod engine;
mod generate;
mod prompt;

pub use engine::QueryEngine;
pub use generate::{Generator, OpenAIGenerator};
pub use prompt::{render_prompt, INSUFFICIENT_EVIDENCE_ANSWER, SYSTEM_PROMPT};

use crate::job::Modality;
use crate::vector_store::{ScoredChunk, SearchFilter};
use serde::{Deserialize, Serialize};

/// A natural-language question with optional retrieval constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer.
    pub question: String,
    /// Optional retrieval filters.
    #[serde(default)]
    pub filters: QueryFilters,
    /// Number of chunks to retrieve; falls back to the configured default.
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Retrieval constraints carried by a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Restrict evidence to one source.
    pub source_id: Option<String>,
    /// Restrict evidence to one media type.
    pub modality: Option<Modality>,
}

impl From<QueryFilters> for SearchFilter {
    fn from(filters: QueryFilters) -> Self {
        SearchFilter {
            source_id: filters.source_id,
            modality: filters.modality,
        }
    }
}

/// One piece of evidence backing an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceChunk {
    /// Chunk ID, stable across re-ingestion.
    pub chunk_id: String,
    /// Source the chunk came from.
    pub source_id: String,
    /// Media type of the source.
    pub modality: Modality,
    /// Citation timestamp (e.g. "02:34").
    pub timestamp: String,
    /// The chunk text that was placed in the prompt.
    pub text: String,
    /// Similarity score from retrieval.
    pub score: f32,
}

impl From<&ScoredChunk> for SourceChunk {
    fn from(result: &ScoredChunk) -> Self {
        Self {
            chunk_id: result.chunk.id.clone(),
            source_id: result.chunk.source_id.clone(),
            modality: result.chunk.modality,
            timestamp: result.chunk.format_timestamp(),
            text: result.chunk.text.clone(),
            score: result.score,
        }
    }
}

/// A generated answer with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The generated answer text.
    pub answer: String,
    /// IDs of the chunks included in the prompt, in prompt order.
    pub evidence: Vec<String>,
    /// Full evidence details for display.
    pub sources: Vec<SourceChunk>,
}

impl Answer {
    /// The graceful no-results answer; never an error.
    pub fn insufficient_evidence() -> Self {
        Self {
            answer: INSUFFICIENT_EVIDENCE_ANSWER.to_string(),
            evidence: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Format the answer with its citations for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!(
                    "\n{} [{}] @ {} (score: {:.2})",
                    source.source_id, source.modality, source.timestamp, source.score
                ));
            }
        }

        output
    }
}
