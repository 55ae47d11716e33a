//! Data models for the retrieval pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a chunk, capturing where in the document it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// First page (1-based) contributing text to this chunk.
    pub page_start: usize,
    /// Last page (1-based) contributing text to this chunk.
    pub page_end: usize,
    /// Start position in the concatenated document text, in characters.
    pub start_offset: usize,
    /// End position in the concatenated document text, in characters.
    pub end_offset: usize,
}

/// A chunk of document text, the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique identifier for this chunk
    pub id: Uuid,
    /// Index of this chunk within the document (for ordering)
    pub chunk_index: u32,
    /// The text content of the chunk
    pub content: String,
    /// Provenance of the chunk within its source document
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a new chunk with a generated ID.
    pub fn new(chunk_index: u32, content: String, metadata: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk_index,
            content,
            metadata,
        }
    }
}

/// Configuration for embedding generation, pinned by the vector index so a
/// store only ever holds vectors from one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider: "openai", "ollama", or "lmstudio"
    pub provider: String,
    /// Model identifier (e.g., "text-embedding-3-small")
    pub model: String,
    /// Dimensions of the embedding vectors
    pub dimensions: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    /// The chunk ID that matched
    pub chunk_id: String,
    /// Index of the chunk within its document
    pub chunk_index: u32,
    /// The matched chunk content
    pub content: String,
    /// First page the chunk covers
    pub page_start: usize,
    /// Last page the chunk covers
    pub page_end: usize,
    /// Cosine similarity to the query (higher is more similar)
    pub score: f32,
}

/// A generated answer, optionally with the chunks stuffed into the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// The generated answer text
    pub text: String,
    /// The retrieved chunks used as context, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<RetrievedChunk>>,
}
