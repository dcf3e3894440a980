// Vector index
// Exact nearest-neighbour search over chunk embeddings, persisted as JSON


use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embeddings::{Chunk, Embedder};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;

const INDEX_FILE_NAME: &str = "index.json";
const INDEX_TEMP_FILE_NAME: &str = "index.json.tmp";

/// Describes where an index came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Fresh for every build, so a rebuilt index is never mistaken for its predecessor
    pub id: Uuid,
    pub embedding_model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A chunk returned by a search and its cosine distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Chunks paired with their embeddings, in insertion order. Never updated in
/// place; a new document means a new index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk and return a fresh index
    #[inline]
    pub fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument("nothing to index".to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts)?;

        Self::from_parts(chunks, vectors, embedder.model())
    }

    /// Assemble an index from chunks and precomputed vectors
    #[inline]
    pub fn from_parts(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        embedding_model: &str,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::Index(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(RagError::Index("embeddings have no dimensions".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(RagError::Index(format!(
                "inconsistent embedding dimensions: expected {}, got {}",
                dimension,
                bad.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        let manifest = IndexManifest {
            id: Uuid::new_v4(),
            embedding_model: embedding_model.to_string(),
            dimension,
            created_at: Utc::now(),
        };

        info!(
            "Built vector index {} with {} entries ({} dimensions, model {})",
            manifest.id,
            entries.len(),
            dimension,
            manifest.embedding_model
        );

        Ok(Self { manifest, entries })
    }

    #[inline]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embed the query and return its `k` nearest chunks
    #[inline]
    pub fn search(&self, query: &str, k: usize, embedder: &dyn Embedder) -> Result<Vec<SearchHit>> {
        if embedder.model() != self.manifest.embedding_model {
            warn!(
                "Querying index built with {} using {}",
                self.manifest.embedding_model,
                embedder.model()
            );
        }

        let vector = embedder.embed_query(query)?;
        self.search_vector(&vector, k)
    }

    /// Return the `min(k, len)` entries closest to `vector`, nearest first.
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if vector.len() != self.manifest.dimension {
            return Err(RagError::Index(format!(
                "query has {} dimensions but the index has {}",
                vector.len(),
                self.manifest.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_distance(vector, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect();

        debug!(
            "Search returned {} of {} entries (k = {})",
            hits.len(),
            self.entries.len(),
            k
        );
        Ok(hits)
    }

    /// Whether `dir` holds a persisted index
    #[inline]
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE_NAME).is_file()
    }

    /// Write the index into `dir`, replacing any index already there
    #[inline]
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let temp_path = dir.join(INDEX_TEMP_FILE_NAME);
        let final_path = dir.join(INDEX_FILE_NAME);

        let written = fs::write(&temp_path, serde_json::to_vec(self)?)
            .and_then(|()| fs::rename(&temp_path, &final_path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!("Could not remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(e.into());
        }

        info!(
            "Persisted vector index {} ({} entries) to {}",
            self.manifest.id,
            self.entries.len(),
            final_path.display()
        );
        Ok(())
    }

    /// Read an index previously written by [`VectorIndex::persist`]
    #[inline]
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE_NAME);
        if !path.is_file() {
            return Err(RagError::IndexNotFound(dir.to_path_buf()));
        }

        let bytes = fs::read(&path)?;
        let index: Self = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::Index(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if index.entries.iter().any(|e| e.vector.len() != index.manifest.dimension) {
            return Err(RagError::Index(format!(
                "{} has vectors that do not match its dimension {}",
                path.display(),
                index.manifest.dimension
            )));
        }

        info!(
            "Loaded vector index {} with {} entries from {}",
            index.manifest.id,
            index.entries.len(),
            path.display()
        );
        Ok(index)
    }
}

/// `1 - cosine similarity`. A zero vector is treated as orthogonal to everything.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f32, 0.0_f32, 0.0_f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 1.0;
    }

    1.0 - dot / denominator
}
