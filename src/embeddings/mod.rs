// Embeddings module
// Text chunking plus the Ollama and hosted backends that turn chunks into vectors

pub mod chunking;
pub mod hosted;
pub mod ollama;

use tracing::warn;
use url::Url;

use crate::{RagError, Result};

pub use chunking::{Chunk, ChunkingConfig, TextSpan, chunk_documents, split_text};
pub use hosted::HostedClient;
pub use ollama::OllamaClient;

/// Maps text to fixed-dimension vectors, one per input, in input order
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Name of the embedding model, recorded in persisted indexes
    fn model(&self) -> &str;

    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::Backend("Embedding backend returned no vector".to_string()))
    }
}

/// Turn a transport or status failure into a backend error. Nothing is retried.
pub(crate) fn request_error(url: &Url, error: &ureq::Error) -> RagError {
    match error {
        ureq::Error::StatusCode(status) => {
            warn!("{} returned HTTP {}", url, status);
            RagError::Backend(format!("{} returned HTTP {}", url, status))
        }
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => {
            warn!("Could not reach {}: {}", url, error);
            RagError::Backend(format!("Could not reach {}: {}", url, error))
        }
        ureq::Error::Timeout(_) => {
            warn!("Request to {} timed out", url);
            RagError::Backend(format!("Request to {} timed out: {}", url, error))
        }
        _ => RagError::Backend(format!("Request to {} failed: {}", url, error)),
    }
}

/// Check that a backend answered with one vector per input
pub(crate) fn check_vector_count(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::Backend(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected,
            vectors.len()
        )));
    }
    Ok(())
}
