//! Retrieval pipeline: chunking, vector index, retrieval, and answer
//! composition over a single shared document store.

mod answer;
mod chunker;
mod index;
mod models;
mod retriever;

pub use answer::{build_prompt, AnswerComposer};
pub use chunker::{chunk_pages, ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use index::{IndexStats, VectorIndex, VectorIndexError};
pub use models::{Answer, Chunk, ChunkMetadata, EmbeddingConfig, RetrievedChunk};
pub use retriever::{RetrieveError, Retriever, DEFAULT_TOP_K};

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::pdf::Page;
use crate::providers::{Embedder, EmbeddingError};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to index chunks: {0}")]
    Index(#[from] VectorIndexError),

    #[error("vector index lock poisoned")]
    LockPoisoned,
}

/// Summary of one document ingestion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub pages: usize,
    pub chunks: usize,
}

/// Chunk, embed, and index a document's pages.
///
/// Embedding happens before the index is touched, and the insert itself is
/// one transaction, so a failure anywhere leaves the store unchanged.
pub async fn ingest_pages(
    embedder: &dyn Embedder,
    index: &Mutex<VectorIndex>,
    pages: &[Page],
    chunking: &ChunkingConfig,
) -> Result<IngestReport, IngestError> {
    let chunks = chunk_pages(pages, chunking);
    if chunks.is_empty() {
        return Ok(IngestReport {
            pages: pages.len(),
            chunks: 0,
        });
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed(&texts).await?;

    let mut index = index.lock().map_err(|_| IngestError::LockPoisoned)?;
    index.index(&chunks, &embeddings)?;

    log::info!(
        "indexed {} chunks from {} pages",
        chunks.len(),
        pages.len()
    );

    Ok(IngestReport {
        pages: pages.len(),
        chunks: chunks.len(),
    })
}
