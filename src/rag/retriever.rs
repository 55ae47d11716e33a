//! Top-k retrieval: embed a query string, search the vector index.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::providers::{Embedder, EmbeddingError};

use super::index::{VectorIndex, VectorIndexError};
use super::models::RetrievedChunk;

/// Default number of chunks returned per query.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index query failed: {0}")]
    Index(#[from] VectorIndexError),

    #[error("vector index lock poisoned")]
    LockPoisoned,
}

/// Thin wrapper tying the embedding client to the vector index with a
/// fixed top-k contract. Raw vectors and distances stay internal; callers
/// only see ordered chunks.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<Mutex<VectorIndex>>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<Mutex<VectorIndex>>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k: top_k.max(1),
        }
    }

    /// Return the chunks most similar to the query, best first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        // An empty store can't match anything; skip the embedding call.
        {
            let index = self.index.lock().map_err(|_| RetrieveError::LockPoisoned)?;
            if index.is_empty()? {
                return Ok(Vec::new());
            }
        }

        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = vectors.into_iter().next().ok_or_else(|| {
            RetrieveError::Embedding(EmbeddingError::Malformed(
                "service returned no vector for the query".to_string(),
            ))
        })?;

        let index = self.index.lock().map_err(|_| RetrieveError::LockPoisoned)?;
        Ok(index.query(&query_embedding, self.top_k)?)
    }
}
