//! Per-modality extraction stages.
//!
//! An extractor turns raw media into an ordered sequence of [`TextUnit`]s,
//! each carrying enough positional metadata (timestamps) for answers to cite
//! where in the source the evidence came from. Dispatch is a closed mapping
//! over [`Modality`], checked exhaustively at compile time.

mod audio;
mod image;
mod video;

pub use audio::AudioExtractor;
pub use image::ImageExtractor;
pub use video::VideoExtractor;

use crate::captioning::Captioner;
use crate::config::Settings;
use crate::error::Result;
use crate::job::Modality;
use crate::transcription::Transcriber;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Origin of a text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextUnitKind {
    /// Transcribed speech.
    Speech,
    /// A visual caption (image or sampled video frame).
    Caption,
}

/// A positionally tagged span of extracted text; the chunker's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUnit {
    /// Extracted text.
    pub text: String,
    /// Start time in seconds (0.0 for still images).
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Whether this came from speech or a visual caption.
    pub kind: TextUnitKind,
}

impl TextUnit {
    pub fn speech(text: String, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            text,
            start_seconds,
            end_seconds,
            kind: TextUnitKind::Speech,
        }
    }

    pub fn caption(text: String, timestamp_seconds: f64) -> Self {
        Self {
            text,
            start_seconds: timestamp_seconds,
            end_seconds: timestamp_seconds,
            kind: TextUnitKind::Caption,
        }
    }
}

/// Trait for per-modality extraction.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract ordered text units from a media file.
    async fn extract(
        &self,
        media_path: &Path,
        metadata: &HashMap<String, String>,
    ) -> Result<Vec<TextUnit>>;
}

/// One extractor per modality; the pipeline picks by the job's tag.
pub struct ExtractorSet {
    video: Arc<dyn Extractor>,
    audio: Arc<dyn Extractor>,
    image: Arc<dyn Extractor>,
}

impl ExtractorSet {
    /// Build the default extractor for each modality from configuration.
    pub fn new(
        settings: &Settings,
        transcriber: Arc<dyn Transcriber>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        let audio = Arc::new(AudioExtractor::new(settings, transcriber.clone()));
        Self {
            video: Arc::new(VideoExtractor::new(
                settings,
                transcriber,
                captioner.clone(),
            )),
            audio,
            image: Arc::new(ImageExtractor::new(captioner)),
        }
    }

    /// Build a set from explicit extractors (used by tests).
    pub fn with_extractors(
        video: Arc<dyn Extractor>,
        audio: Arc<dyn Extractor>,
        image: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            video,
            audio,
            image,
        }
    }

    /// The extractor responsible for a modality.
    pub fn for_modality(&self, modality: Modality) -> Arc<dyn Extractor> {
        match modality {
            Modality::Video => self.video.clone(),
            Modality::Audio => self.audio.clone(),
            Modality::Image => self.image.clone(),
        }
    }
}
