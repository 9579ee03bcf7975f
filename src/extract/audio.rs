//! Audio extraction: normalize, segment, transcribe.

use super::{Extractor, TextUnit};
use crate::config::Settings;
use crate::error::{LeteError, Result};
use crate::media::{prepare_audio, split_audio};
use crate::transcription::{Transcriber, TranscriptSegment};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// Extractor for audio files (and the audio track of videos).
pub struct AudioExtractor {
    transcriber: Arc<dyn Transcriber>,
    chunk_duration_seconds: u32,
    max_concurrent: usize,
    default_language: Option<String>,
    temp_dir: PathBuf,
}

impl AudioExtractor {
    pub fn new(settings: &Settings, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            transcriber,
            chunk_duration_seconds: settings.transcription.chunk_duration_seconds,
            max_concurrent: settings.transcription.max_concurrent_chunks.max(1),
            default_language: settings.transcription.language.clone(),
            temp_dir: settings.temp_dir(),
        }
    }

    fn language<'a>(&'a self, metadata: &'a HashMap<String, String>) -> Option<&'a str> {
        metadata
            .get("language")
            .map(|s| s.as_str())
            .or(self.default_language.as_deref())
    }

    /// Transcribe all segments concurrently, failing fast on the first error.
    async fn transcribe_segments(
        &self,
        segments: Vec<(std::path::PathBuf, f64)>,
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>> {
        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>)> =
            Vec::with_capacity(segments.len());

        let mut in_flight = stream::iter(segments.into_iter().enumerate())
            .map(|(idx, (path, offset))| {
                let language = language.map(|s| s.to_string());
                async move {
                    let result = self.transcriber.transcribe(&path, language.as_deref()).await;
                    (idx, offset, result)
                }
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((idx, offset, result)) = in_flight.next().await {
            match result {
                Ok(segments) => results.push((idx, offset, segments)),
                Err(e) => {
                    return Err(LeteError::Transcription(format!(
                        "segment {} at {:.0}s failed: {}",
                        idx, offset, e
                    )));
                }
            }
        }

        // Restore playback order and re-base timestamps onto the full file.
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut merged = Vec::new();
        for (_, offset, segments) in results {
            for segment in segments {
                merged.push(TranscriptSegment::new(
                    segment.start_seconds + offset,
                    segment.end_seconds + offset,
                    segment.text,
                ));
            }
        }
        Ok(merged)
    }
}

#[async_trait]
impl Extractor for AudioExtractor {
    #[instrument(skip(self, metadata), fields(media = %media_path.display()))]
    async fn extract(
        &self,
        media_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<Vec<TextUnit>> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let workdir = tempfile::tempdir_in(&self.temp_dir)?;

        let prepared = prepare_audio(media_path, workdir.path(), "audio").await?;
        let segments =
            split_audio(&prepared, workdir.path(), self.chunk_duration_seconds).await?;

        info!("Transcribing {} audio segment(s)", segments.len());
        let transcript = self
            .transcribe_segments(segments, self.language(metadata))
            .await?;

        Ok(transcript
            .into_iter()
            .filter(|s| !s.text.is_empty())
            .map(|s| TextUnit::speech(s.text, s.start_seconds, s.end_seconds))
            .collect())
    }
}
