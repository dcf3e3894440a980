use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read PDF {}: {reason}", .path.display())]
    Pdf { path: PathBuf, reason: String },

    #[error("Document contains no extractable text: {0}")]
    EmptyDocument(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Missing credential: set the {0} environment variable")]
    MissingCredential(String),

    #[error("No vector index found at {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod commands;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod pipeline;
