//! Prompt assembly for grounded answers.

use super::SourceChunk;

/// System instruction keeping the model inside the retrieved context.
pub const SYSTEM_PROMPT: &str = "\
You answer questions using ONLY the context provided below. \
Be accurate and concise.

RULES:
1. If the context does not contain the answer, say so plainly; do not guess.
2. Do not use outside knowledge.
3. Summarize the answer in a brief sentence before providing details.
4. Cite the sources you used by their [Source N] tags.";

/// Returned when retrieval produces nothing above the score threshold.
pub const INSUFFICIENT_EVIDENCE_ANSWER: &str =
    "I couldn't find relevant evidence in the indexed media to answer this question.";

/// Assemble the user prompt: tagged context blocks followed by the question.
pub fn render_prompt(question: &str, sources: &[SourceChunk]) -> String {
    let context = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            format!(
                "[Source {}, {}, {} @ {}]\n{}",
                i + 1,
                source.source_id,
                source.modality,
                source.timestamp,
                source.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "CONTEXT:\n---\n{}\n---\n\nQUESTION: \"{}\"\n\nBased ONLY on the context above, give a final answer that follows your rules.",
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Modality;

    #[test]
    fn test_render_prompt_tags_each_source() {
        let sources = vec![
            SourceChunk {
                chunk_id: "a#0000".into(),
                source_id: "a".into(),
                modality: Modality::Audio,
                timestamp: "00:10".into(),
                text: "first snippet".into(),
                score: 0.9,
            },
            SourceChunk {
                chunk_id: "b#0002".into(),
                source_id: "b".into(),
                modality: Modality::Video,
                timestamp: "01:30".into(),
                text: "second snippet".into(),
                score: 0.8,
            },
        ];

        let prompt = render_prompt("what happened?", &sources);
        assert!(prompt.contains("[Source 1, a, audio @ 00:10]"));
        assert!(prompt.contains("[Source 2, b, video @ 01:30]"));
        assert!(prompt.contains("first snippet"));
        assert!(prompt.contains("QUESTION: \"what happened?\""));
    }
}
