
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::HostedConfig;
use crate::embeddings::{Embedder, check_vector_count, request_error};
use crate::generation::{ChatMessage, Generator, Role};
use crate::{RagError, Result};

pub const DEFAULT_HOSTED_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_HOSTED_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_HOSTED_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Blocking client for an OpenAI-compatible API (`/embeddings` and
/// `/chat/completions`), authenticated with a bearer token
#[derive(Debug, Clone)]
pub struct HostedClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    batch_size: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl HostedClient {
    /// Read the API key from the configured environment variable. A missing or
    /// blank key is reported as a missing credential before any request.
    #[inline]
    pub fn new(config: &HostedConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RagError::MissingCredential(config.api_key_env.clone()))?;

        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &HostedConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::MissingCredential(config.api_key_env.clone()));
        }

        Ok(Self {
            base_url: config.api_url()?,
            api_key,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            agent: ureq::Agent::config_builder().build().into(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RagError::Backend(format!("Failed to build URL for {}: {}", path, e)))?;
        let request_json = serde_json::to_string(body)?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| request_error(&url, &e))?;

        serde_json::from_str(&response_text).map_err(|e| {
            RagError::Backend(format!("Failed to parse response from {}: {}", url, e))
        })
    }
}

impl Embedder for HostedClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating hosted embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let mut response: EmbeddingsResponse = self.post_json(
                "embeddings",
                &EmbeddingsRequest {
                    model: &self.embedding_model,
                    input: batch,
                },
            )?;

            // The API does not promise response order
            response.data.sort_by_key(|d| d.index);
            let batch_vectors: Vec<Vec<f32>> =
                response.data.into_iter().map(|d| d.embedding).collect();
            check_vector_count(batch.len(), &batch_vectors)?;
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.embedding_model
    }
}

impl Generator for HostedClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting hosted answer from {} (prompt length: {})",
            self.chat_model,
            prompt.len()
        );

        let response: CompletionResponse = self.post_json(
            "chat/completions",
            &CompletionRequest {
                model: &self.chat_model,
                messages: vec![ChatMessage {
                    role: Role::User,
                    content: prompt,
                }],
            },
        )?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RagError::Backend("Completion response had no content".to_string()))
    }

    #[inline]
    fn model(&self) -> &str {
        &self.chat_model
    }
}
