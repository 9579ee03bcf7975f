//! OpenAI vision-based captioner.

use super::Captioner;
use crate::backoff::{retry, RetryPolicy};
use crate::error::{LeteError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
    ImageUrlArgs,
};
use async_trait::async_trait;
use base64::Engine as _;
use std::path::Path;
use tracing::{debug, instrument};

/// Instruction guiding the vision model toward factual, citable descriptions.
const CAPTION_PROMPT: &str = "Provide a detailed, objective description of this image, \
noting any text, diagrams, key people, or slide content. \
Keep the description concise and factual.";

/// OpenAI chat-vision captioner.
pub struct OpenAICaptioner {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    retry_policy: RetryPolicy,
}

impl OpenAICaptioner {
    /// Create a captioner with default settings.
    pub fn new() -> Self {
        Self::with_config("gpt-4o-mini", RetryPolicy::default())
    }

    /// Create a captioner with a custom model and retry budget.
    pub fn with_config(model: &str, retry_policy: RetryPolicy) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            retry_policy,
        }
    }

    async fn request_once(&self, image_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(image_path).await?;
        let mime = match image_path.extension().and_then(|e| e.to_str()) {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            _ => "image/jpeg",
        };
        let data_url = format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(CAPTION_PROMPT)
            .build()
            .map_err(|e| LeteError::Captioning(e.to_string()))?;
        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url)
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(|e| LeteError::Captioning(e.to_string()))?,
            )
            .build()
            .map_err(|e| LeteError::Captioning(e.to_string()))?;

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            vec![text_part.into(), image_part.into()];
        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| LeteError::Captioning(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![user_message.into()])
            .build()
            .map_err(|e| LeteError::Captioning(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LeteError::OpenAI(format!("Caption API error: {}", e)))?;

        let caption = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| LeteError::Captioning("Empty caption response".to_string()))?
            .trim()
            .to_string();

        debug!("Captioned {} ({} chars)", image_path.display(), caption.len());
        Ok(caption)
    }
}

impl Default for OpenAICaptioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Captioner for OpenAICaptioner {
    #[instrument(skip(self), fields(image = %image_path.display()))]
    async fn caption(&self, image_path: &Path) -> Result<String> {
        retry(&self.retry_policy, "captioning", || {
            self.request_once(image_path)
        })
        .await
    }
}
