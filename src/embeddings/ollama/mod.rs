
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::{Embedder, check_vector_count, request_error};
use crate::generation::{ChatMessage, Generator, Role};
use crate::{RagError, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "phi3:mini";

/// Blocking client for a local Ollama server. Serves both embeddings and chat.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    chat_model: String,
    batch_size: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            agent: ureq::Agent::config_builder().build().into(),
        })
    }

    /// Calls block until the server answers unless a timeout is set here
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the server is reachable and both models are pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;
        for wanted in [&self.embedding_model, &self.chat_model] {
            if !models.iter().any(|m| model_matches(&m.name, wanted)) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                return Err(RagError::Backend(format!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted, available
                )));
            }
        }

        info!(
            "Health check passed for Ollama server at {} with models {} and {}",
            self.base_url, self.embedding_model, self.chat_model
        );
        Ok(())
    }

    /// List all models the server has pulled
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| request_error(&url, &e))?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Backend(format!("Failed to parse models response: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagError::Backend(format!("Failed to build URL for {}: {}", path, e)))
    }

    fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| request_error(&url, &e))?;

        serde_json::from_str(&response_text).map_err(|e| {
            RagError::Backend(format!("Failed to parse response from {}: {}", url, e))
        })
    }
}

/// Ollama reports `nomic-embed-text:latest` for a model pulled as `nomic-embed-text`
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{}:latest", wanted))
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let response: EmbedResponse = self.post_json(
                "/api/embed",
                &EmbedRequest {
                    model: &self.embedding_model,
                    input: batch,
                },
            )?;
            check_vector_count(batch.len(), &response.embeddings)?;
            vectors.extend(response.embeddings);
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            vectors.len(),
            vectors.first().map_or(0, Vec::len)
        );
        Ok(vectors)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.embedding_model
    }
}

impl Generator for OllamaClient {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            "Requesting answer from {} (prompt length: {})",
            self.chat_model,
            prompt.len()
        );

        let response: ChatResponse = self.post_json(
            "/api/chat",
            &ChatRequest {
                model: &self.chat_model,
                messages: vec![ChatMessage {
                    role: Role::User,
                    content: prompt,
                }],
                stream: false,
            },
        )?;

        Ok(response.message.content.trim().to_string())
    }

    #[inline]
    fn model(&self) -> &str {
        &self.chat_model
    }
}
