// Ingest and query flows
// A Pipeline holds the backends; a Session holds the index and the conversation


use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{BackendKind, Config};
use crate::document::{self, Document};
use crate::embeddings::{ChunkingConfig, Embedder, HostedClient, OllamaClient, chunk_documents};
use crate::generation::{Generator, Role, build_context, build_prompt};
use crate::index::{DEFAULT_TOP_K, SearchHit, VectorIndex};
use crate::{RagError, Result};

pub const NO_INDEX_MESSAGE: &str = "Please ingest a PDF before asking questions.";
pub const EMPTY_QUESTION_MESSAGE: &str = "Please enter a question.";

/// One message in the conversation log
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Everything that lives for one interactive run: the current index, if any,
/// and the append-only conversation
#[derive(Debug, Default)]
pub struct Session {
    index: Option<VectorIndex>,
    history: Vec<ConversationTurn>,
}

impl Session {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an index loaded from disk
    #[inline]
    pub fn with_index(index: VectorIndex) -> Self {
        Self {
            index: Some(index),
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn has_index(&self) -> bool {
        self.index.as_ref().is_some_and(|index| !index.is_empty())
    }

    #[inline]
    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    #[inline]
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    fn push_turn(&mut self, role: Role, text: &str) {
        self.history.push(ConversationTurn {
            role,
            text: text.to_string(),
            at: Utc::now(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub index_id: Uuid,
    pub pages: usize,
    pub chunks: usize,
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Retrieved chunks the answer was generated from, nearest first
    pub sources: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Answered(Answer),
    /// A prerequisite is missing; nothing was sent to any backend
    Blocked(&'static str),
}

impl QueryOutcome {
    /// Text to show the user either way
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Self::Answered(answer) => &answer.text,
            Self::Blocked(message) => message,
        }
    }
}

pub struct Pipeline {
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    chunking: ChunkingConfig,
    top_k: usize,
}

impl Pipeline {
    #[inline]
    pub fn new(embedder: Box<dyn Embedder>, generator: Box<dyn Generator>) -> Self {
        Self {
            embedder,
            generator,
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Connect to the configured backend. The hosted backend fails here with
    /// [`RagError::MissingCredential`] when its API key is not set.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let pipeline = match config.backend {
            BackendKind::Ollama => {
                let client = OllamaClient::new(&config.ollama)?;
                Self::new(Box::new(client.clone()), Box::new(client))
            }
            BackendKind::Hosted => {
                let client = HostedClient::new(&config.hosted)?;
                Self::new(Box::new(client.clone()), Box::new(client))
            }
        };

        debug!(
            "Using {} backend (embeddings: {}, answers: {})",
            config.backend,
            pipeline.embedder.model(),
            pipeline.generator.model()
        );
        Ok(pipeline)
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Result<Self> {
        chunking.validate()?;
        self.chunking = chunking;
        Ok(self)
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(crate::config::ConfigError::InvalidTopK(top_k).into());
        }
        self.top_k = top_k;
        Ok(self)
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[inline]
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk and embed documents into a new index without touching any session
    #[inline]
    pub fn build_index(&self, documents: &[Document]) -> Result<VectorIndex> {
        if documents.iter().all(|d| d.text.trim().is_empty()) {
            return Err(RagError::EmptyDocument(
                "no pages with text to ingest".to_string(),
            ));
        }

        let chunks = chunk_documents(documents, &self.chunking);
        info!(
            "Embedding {} chunks from {} pages",
            chunks.len(),
            documents.len()
        );

        VectorIndex::build(chunks, self.embedder.as_ref())
    }

    /// Replace the session's index with one built from `documents`. On error
    /// the session keeps whatever index it had.
    #[inline]
    pub fn ingest(&self, session: &mut Session, documents: &[Document]) -> Result<IngestReport> {
        let index = self.build_index(documents)?;

        let report = IngestReport {
            index_id: index.manifest().id,
            pages: documents.len(),
            chunks: index.len(),
            dimension: index.manifest().dimension,
        };

        if let Some(previous) = session.index.replace(index) {
            debug!("Discarded previous index {}", previous.manifest().id);
        }

        Ok(report)
    }

    #[inline]
    pub fn ingest_pdf(&self, session: &mut Session, path: &Path) -> Result<IngestReport> {
        let documents = document::load_pdf(path)?;
        self.ingest(session, &documents)
    }

    /// Retrieve context for the question and generate an answer. Both turns are
    /// appended to the session only when an answer comes back.
    #[inline]
    pub fn query(&self, session: &mut Session, question: &str) -> Result<QueryOutcome> {
        if question.trim().is_empty() {
            return Ok(QueryOutcome::Blocked(EMPTY_QUESTION_MESSAGE));
        }

        let Some(index) = session.index.as_ref().filter(|index| !index.is_empty()) else {
            debug!("Query blocked: no index in session");
            return Ok(QueryOutcome::Blocked(NO_INDEX_MESSAGE));
        };

        let sources = index.search(question, self.top_k, self.embedder.as_ref())?;
        let context = build_context(&sources);
        let prompt = build_prompt(&context, question);

        debug!(
            "Retrieved {} chunks ({} chars of context)",
            sources.len(),
            context.len()
        );

        let text = self.generator.generate(&prompt)?;

        session.push_turn(Role::User, question);
        session.push_turn(Role::Assistant, &text);

        Ok(QueryOutcome::Answered(Answer { text, sources }))
    }
}
