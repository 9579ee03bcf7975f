//! Deterministic chunking of extracted text units.
//!
//! Chunks pack whole text units (utterance boundaries) until the target size
//! is reached; each following chunk starts a fixed number of units back to
//! preserve context across boundaries. Chunk IDs are derived from
//! `(source_id, sequence_index)`, so re-ingesting identical content yields
//! identical IDs.

use crate::extract::TextUnit;
use crate::job::Modality;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A retrieval-sized span of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic ID: `"{source_id}#{sequence_index:04}"`.
    pub id: String,
    /// Source this chunk was derived from.
    pub source_id: String,
    /// Media type of the source.
    pub modality: Modality,
    /// Position of this chunk within the source.
    pub sequence_index: u32,
    /// Text content (units joined with single spaces).
    pub text: String,
    /// Span of this chunk in the source's canonical concatenated text.
    pub char_span: (usize, usize),
    /// Start time of the first unit in seconds.
    pub start_seconds: f64,
    /// End time of the last unit in seconds.
    pub end_seconds: f64,
    /// Opaque metadata inherited from the job.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Build the deterministic chunk ID for a position within a source.
    pub fn make_id(source_id: &str, sequence_index: u32) -> String {
        format!("{}#{:04}", source_id, sequence_index)
    }

    /// Format the chunk's start time for citation display.
    pub fn format_timestamp(&self) -> String {
        let total_seconds = self.start_seconds as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        }
    }
}

/// Packs text units into chunks of roughly `target_chars` characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    target_chars: usize,
    overlap_units: usize,
}

impl TextChunker {
    pub fn new(target_chars: usize, overlap_units: usize) -> Self {
        Self {
            target_chars: target_chars.max(1),
            overlap_units,
        }
    }

    /// Split text units into ordered chunks.
    ///
    /// Invariants:
    /// - units are never split, dropped, or reordered; a unit longer than the
    ///   target becomes its own chunk
    /// - every chunk after the first repeats the previous chunk's trailing
    ///   `overlap_units` units, so dropping that prefix from each later chunk
    ///   and concatenating reconstructs the input exactly
    /// - identical input and parameters produce identical output
    pub fn chunk(
        &self,
        source_id: &str,
        modality: Modality,
        units: &[TextUnit],
        metadata: &HashMap<String, String>,
    ) -> Vec<Chunk> {
        if units.is_empty() {
            return Vec::new();
        }

        // Offsets of each unit in the canonical text (units joined by spaces).
        let mut offsets = Vec::with_capacity(units.len());
        let mut position = 0usize;
        for (i, unit) in units.iter().enumerate() {
            if i > 0 {
                position += 1;
            }
            offsets.push((position, position + unit.text.len()));
            position += unit.text.len();
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut sequence_index = 0u32;

        loop {
            let mut end = start;
            let mut chars = 0usize;
            while end < units.len() {
                let unit_len = units[end].text.len();
                let separator = usize::from(end > start);
                // Keep packing past the target until the chunk is longer than
                // the overlap, otherwise the next chunk could not make progress.
                if chars > 0
                    && chars + separator + unit_len > self.target_chars
                    && (end - start) > self.overlap_units
                {
                    break;
                }
                chars += separator + unit_len;
                end += 1;
            }

            let text = units[start..end]
                .iter()
                .map(|u| u.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            chunks.push(Chunk {
                id: Chunk::make_id(source_id, sequence_index),
                source_id: source_id.to_string(),
                modality,
                sequence_index,
                text,
                char_span: (offsets[start].0, offsets[end - 1].1),
                start_seconds: units[start].start_seconds,
                end_seconds: units[end - 1].end_seconds,
                metadata: metadata.clone(),
            });
            sequence_index += 1;

            if end >= units.len() {
                break;
            }
            start = end - self.overlap_units;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(texts: &[&str]) -> Vec<TextUnit> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextUnit::speech(t.to_string(), i as f64 * 10.0, (i + 1) as f64 * 10.0))
            .collect()
    }

    fn chunker(target: usize, overlap: usize) -> TextChunker {
        TextChunker::new(target, overlap)
    }

    #[test]
    fn test_empty_input() {
        let chunks = chunker(100, 1).chunk("s", Modality::Audio, &[], &HashMap::new());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_single_chunk_when_under_target() {
        let input = units(&["hello there", "how are you"]);
        let chunks = chunker(100, 1).chunk("s", Modality::Audio, &input, &HashMap::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello there how are you");
        assert_eq!(chunks[0].id, "s#0000");
        assert_eq!(chunks[0].char_span, (0, 23));
    }

    #[test]
    fn test_overlap_repeats_trailing_units() {
        let input = units(&["aaaa", "bbbb", "cccc", "dddd"]);
        let chunks = chunker(9, 1).chunk("s", Modality::Audio, &input, &HashMap::new());

        // 9 chars fit two units per chunk; each chunk restarts one unit back.
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let prev_last = pair[0].text.rsplit(' ').next().unwrap();
            let next_first = pair[1].text.split(' ').next().unwrap();
            assert_eq!(prev_last, next_first);
        }
    }

    #[test]
    fn test_reconstruction_invariant() {
        // Single-word units, so units and whitespace-split words line up 1:1.
        let input = units(&[
            "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel",
        ]);
        let overlap = 1;
        let chunks = chunker(16, overlap).chunk("s", Modality::Audio, &input, &HashMap::new());
        assert!(chunks.len() > 1);

        // Drop the overlapped prefix of every chunk after the first and
        // concatenate: the canonical unit sequence must come back exactly.
        let mut reconstructed: Vec<String> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            reconstructed.extend(chunk.text.split(' ').skip(skip).map(str::to_string));
        }

        let expected: Vec<String> = input.iter().map(|u| u.text.clone()).collect();
        assert_eq!(reconstructed, expected);
    }

    #[test]
    fn test_determinism() {
        let input = units(&["alpha beta", "gamma delta", "epsilon", "zeta eta theta"]);
        let a = chunker(20, 1).chunk("s", Modality::Video, &input, &HashMap::new());
        let b = chunker(20, 1).chunk("s", Modality::Video, &input, &HashMap::new());

        let ids_a: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(
            a.iter().map(|c| &c.text).collect::<Vec<_>>(),
            b.iter().map(|c| &c.text).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_oversized_unit_gets_own_chunk() {
        let input = units(&["short", "this single unit is far longer than the target size", "tail"]);
        let chunks = chunker(10, 0).chunk("s", Modality::Audio, &input, &HashMap::new());

        assert!(chunks
            .iter()
            .any(|c| c.text == "this single unit is far longer than the target size"));
        // Nothing was truncated.
        let total: String = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for unit in &input {
            assert!(total.contains(&unit.text));
        }
    }

    #[test]
    fn test_chunk_timestamps_span_their_units() {
        let input = units(&["aaaa", "bbbb", "cccc", "dddd"]);
        let chunks = chunker(9, 0).chunk("s", Modality::Audio, &input, &HashMap::new());
        assert_eq!(chunks[0].start_seconds, 0.0);
        assert_eq!(chunks[0].end_seconds, 20.0);
        assert_eq!(chunks.last().unwrap().end_seconds, 40.0);
    }

    #[test]
    fn test_zero_overlap_partitions_exactly() {
        let input = units(&["one two", "three four", "five six", "seven"]);
        let chunks = chunker(15, 0).chunk("s", Modality::Audio, &input, &HashMap::new());

        let joined: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        assert_eq!(
            joined.join(" "),
            "one two three four five six seven"
        );
    }

    #[test]
    fn test_timestamp_formatting() {
        let mut chunk = Chunk {
            id: "s#0000".into(),
            source_id: "s".into(),
            modality: Modality::Audio,
            sequence_index: 0,
            text: "x".into(),
            char_span: (0, 1),
            start_seconds: 125.0,
            end_seconds: 130.0,
            metadata: HashMap::new(),
        };
        assert_eq!(chunk.format_timestamp(), "02:05");
        chunk.start_seconds = 3665.0;
        assert_eq!(chunk.format_timestamp(), "01:01:05");
    }
}
