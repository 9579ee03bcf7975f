//! Video extraction: audio track transcription plus sampled-frame captions.

use super::{AudioExtractor, Extractor, TextUnit};
use crate::captioning::Captioner;
use crate::config::Settings;
use crate::error::{LeteError, Result};
use crate::media::extract_frames;
use crate::transcription::Transcriber;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Extractor for video files.
///
/// The audio track is demuxed and transcribed; frames are sampled at a fixed
/// interval and captioned. Both streams are merged into one sequence of text
/// units ordered by timestamp, so a chunk can mix what was said with what was
/// on screen at that moment.
pub struct VideoExtractor {
    audio: AudioExtractor,
    captioner: Arc<dyn Captioner>,
    captioning_enabled: bool,
    frame_interval_seconds: u32,
    max_concurrent_captions: usize,
    temp_dir: std::path::PathBuf,
}

impl VideoExtractor {
    pub fn new(
        settings: &Settings,
        transcriber: Arc<dyn Transcriber>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        Self {
            audio: AudioExtractor::new(settings, transcriber),
            captioner,
            captioning_enabled: settings.captioning.enabled,
            frame_interval_seconds: settings.captioning.frame_interval_seconds,
            max_concurrent_captions: settings.captioning.max_concurrent.max(1),
            temp_dir: settings.temp_dir(),
        }
    }

    async fn caption_frames(&self, media_path: &Path) -> Result<Vec<TextUnit>> {
        std::fs::create_dir_all(&self.temp_dir)?;
        let workdir = tempfile::tempdir_in(&self.temp_dir)?;
        let frames =
            extract_frames(media_path, workdir.path(), self.frame_interval_seconds).await?;

        if frames.is_empty() {
            return Ok(Vec::new());
        }

        info!("Captioning {} sampled frame(s)", frames.len());

        let mut captioned: Vec<(usize, f64, String)> = Vec::with_capacity(frames.len());
        let mut in_flight = stream::iter(frames.into_iter().enumerate())
            .map(|(idx, (path, timestamp))| async move {
                let result = self.captioner.caption(&path).await;
                (idx, timestamp, result)
            })
            .buffer_unordered(self.max_concurrent_captions);

        while let Some((idx, timestamp, result)) = in_flight.next().await {
            match result {
                Ok(caption) => captioned.push((idx, timestamp, caption)),
                Err(e) => {
                    return Err(LeteError::Captioning(format!(
                        "frame {} at {:.0}s failed: {}",
                        idx, timestamp, e
                    )));
                }
            }
        }

        captioned.sort_by_key(|(idx, _, _)| *idx);

        Ok(captioned
            .into_iter()
            .filter(|(_, _, text)| !text.is_empty())
            .map(|(_, timestamp, text)| TextUnit::caption(text, timestamp))
            .collect())
    }
}

#[async_trait]
impl Extractor for VideoExtractor {
    #[instrument(skip(self, metadata), fields(media = %media_path.display()))]
    async fn extract(
        &self,
        media_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<Vec<TextUnit>> {
        let mut units = self.audio.extract(media_path, metadata).await?;

        if self.captioning_enabled {
            units.extend(self.caption_frames(media_path).await?);
        }

        // Interleave speech and captions in playback order. The sort is
        // stable, so units sharing a timestamp keep speech-before-caption.
        units.sort_by(|a, b| {
            a.start_seconds
                .partial_cmp(&b.start_seconds)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(units)
    }
}
