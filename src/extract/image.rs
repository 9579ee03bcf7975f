//! Image extraction: a single caption.

use super::{Extractor, TextUnit};
use crate::captioning::Captioner;
use crate::error::{LeteError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Extractor for still images.
pub struct ImageExtractor {
    captioner: Arc<dyn Captioner>,
}

impl ImageExtractor {
    pub fn new(captioner: Arc<dyn Captioner>) -> Self {
        Self { captioner }
    }
}

#[async_trait]
impl Extractor for ImageExtractor {
    #[instrument(skip(self, _metadata), fields(media = %media_path.display()))]
    async fn extract(
        &self,
        media_path: &Path,
        _metadata: &HashMap<String, String>,
    ) -> Result<Vec<TextUnit>> {
        let caption = self.captioner.caption(media_path).await?;
        if caption.is_empty() {
            return Err(LeteError::Captioning(
                "captioner returned an empty description".to_string(),
            ));
        }
        Ok(vec![TextUnit::caption(caption, 0.0)])
    }
}
