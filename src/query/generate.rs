//! Answer generation capability.

use crate::backoff::{retry, RetryPolicy};
use crate::error::{LeteError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::debug;

/// Trait for text generation services.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for a system instruction plus user prompt.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// OpenAI chat-based generator.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    retry_policy: RetryPolicy,
}

impl OpenAIGenerator {
    /// Create a generator with default settings.
    pub fn new() -> Self {
        Self::with_config("gpt-4o-mini", RetryPolicy::default())
    }

    /// Create a generator with a custom model and retry budget.
    pub fn with_config(model: &str, retry_policy: RetryPolicy) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            retry_policy,
        }
    }

    async fn request_once(&self, system: &str, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| LeteError::Query(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| LeteError::Query(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            // Low temperature keeps the answer inside the retrieved context.
            .temperature(0.2)
            .build()
            .map_err(|e| LeteError::Query(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LeteError::OpenAI(format!("Generation API error: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| LeteError::Query("Empty response from LLM".to_string()))?
            .clone();

        debug!("Generated {} chars", answer.len());
        Ok(answer)
    }
}

impl Default for OpenAIGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        retry(&self.retry_policy, "generation", || {
            self.request_once(system, prompt)
        })
        .await
    }
}
