//! Image and video-frame captioning capability.
//!
//! Like transcription, captioning is a black box behind a trait: one image in,
//! one textual description out.

mod openai;

pub use openai::OpenAICaptioner;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for visual captioning services.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe a single image file.
    async fn caption(&self, image_path: &Path) -> Result<String>;
}
