//! Speech-to-text capability.
//!
//! The transcriber is a black box behind a trait: one bounded audio file in,
//! timestamped segments out. Splitting long audio and re-basing offsets is the
//! extractor's concern, not the transcriber's.

mod whisper;

pub use whisper::WhisperTranscriber;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single segment of transcribed speech with timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a single bounded audio file into timestamped segments.
    ///
    /// `language` is an optional hint (e.g. "en", "no"); implementations may
    /// ignore it.
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let segment = TranscriptSegment::new(12.5, 18.0, "hello".to_string());
        assert!((segment.duration() - 5.5).abs() < f64::EPSILON);
    }
}
