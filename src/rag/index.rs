//! Vector store for similarity search, backed by SQLite.
//!
//! The store is in-memory by default; pointing it at a file keeps the
//! index across process restarts. Entries are only ever appended: there is
//! no update or delete of individual chunks, only [`VectorIndex::clear`].

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use super::models::{Chunk, EmbeddingConfig, RetrievedChunk};

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunk count ({chunks}) doesn't match embedding count ({embeddings})")]
    CountMismatch { chunks: usize, embeddings: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: u32, actual: u32 },

    #[error("Index was built with embedding model '{existing}' but '{requested}' is configured; clear the index or change the configuration")]
    ModelMismatch { existing: String, requested: String },
}

pub type Result<T> = std::result::Result<T, VectorIndexError>;

/// Vector index for similarity search over chunk embeddings.
///
/// Uses brute-force cosine similarity over rows in SQLite. Every stored
/// vector must come from the one embedding model pinned via
/// [`VectorIndex::configure`]; mixed-model stores are rejected up front
/// by the dimension check on insert.
#[derive(Debug)]
pub struct VectorIndex {
    conn: Connection,
    config: Option<EmbeddingConfig>,
}

impl VectorIndex {
    /// Create a volatile in-memory index. Contents are lost on drop.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) a file-backed index at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Open the index (file-backed when a path is given) and pin the
    /// embedding model, rejecting a store built with a different model.
    pub fn open_pinned(db_path: Option<&Path>, pinned: EmbeddingConfig) -> Result<Self> {
        let mut index = match db_path {
            Some(p) => Self::open(p)?,
            None => Self::in_memory()?,
        };

        match index.config() {
            Some(existing) if *existing != pinned => Err(VectorIndexError::ModelMismatch {
                existing: format!("{}/{}", existing.provider, existing.model),
                requested: format!("{}/{}", pinned.provider, pinned.model),
            }),
            Some(_) => Ok(index),
            None => {
                index.configure(pinned)?;
                Ok(index)
            }
        }
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            -- Chunks with their text content and page provenance
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                page_start INTEGER NOT NULL,
                page_end INTEGER NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            -- Embeddings stored as f32 little-endian blobs
            CREATE TABLE IF NOT EXISTS embeddings (
                chunk_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE
            );

            -- Pinned embedding model configuration
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_chunk_id ON embeddings(chunk_id);
            "#,
        )?;

        // Load pinned config if present
        let config: Option<EmbeddingConfig> = conn
            .query_row(
                "SELECT value FROM config WHERE key = 'embedding_config'",
                [],
                |row| row.get::<_, String>(0),
            )
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok());

        Ok(Self { conn, config })
    }

    /// Pin the embedding model this index holds vectors for.
    pub fn configure(&mut self, config: EmbeddingConfig) -> Result<()> {
        let config_json = serde_json::to_string(&config)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES ('embedding_config', ?1)",
            params![config_json],
        )?;

        self.config = Some(config);
        Ok(())
    }

    /// Get the pinned embedding configuration.
    pub fn config(&self) -> Option<&EmbeddingConfig> {
        self.config.as_ref()
    }

    /// Bulk-append chunks with their embeddings.
    ///
    /// The insert is atomic: either every entry lands or none does. There
    /// is no uniqueness constraint on chunk text; indexing the same
    /// document twice stores it twice.
    pub fn index(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(VectorIndexError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        // Verify embedding dimensions match the pinned config
        if let Some(config) = &self.config {
            for emb in embeddings {
                if emb.len() as u32 != config.dimensions {
                    return Err(VectorIndexError::DimensionMismatch {
                        expected: config.dimensions,
                        actual: emb.len() as u32,
                    });
                }
            }
        }

        let tx = self.conn.transaction()?;

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            tx.execute(
                "INSERT INTO chunks (id, chunk_index, content, page_start, page_end) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chunk.id.to_string(),
                    chunk.chunk_index,
                    chunk.content,
                    chunk.metadata.page_start as i64,
                    chunk.metadata.page_end as i64,
                ],
            )?;

            tx.execute(
                "INSERT INTO embeddings (chunk_id, embedding, dimensions) VALUES (?1, ?2, ?3)",
                params![
                    chunk.id.to_string(),
                    serialize_embedding(embedding),
                    embedding.len() as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Return the `k` entries most similar to the query embedding.
    ///
    /// Results are sorted by non-increasing cosine similarity; ties keep
    /// insertion order. Returns fewer than `k` when the store is smaller.
    pub fn query(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        // Brute-force scan. Rows are read in rowid order and sorted with a
        // stable sort so equal scores preserve insertion order.
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.chunk_index, c.content, c.page_start, c.page_end, e.embedding
            FROM chunks c
            JOIN embeddings e ON c.id = e.chunk_id
            ORDER BY c.rowid
            "#,
        )?;

        let rows: Vec<(String, u32, String, i64, i64, Vec<u8>)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut scored: Vec<RetrievedChunk> = rows
            .into_iter()
            .map(|(chunk_id, chunk_index, content, page_start, page_end, blob)| {
                let embedding = deserialize_embedding(&blob);
                let score = cosine_similarity(query_embedding, &embedding);
                RetrievedChunk {
                    chunk_id,
                    chunk_index,
                    content,
                    page_start: page_start as usize,
                    page_end: page_end as usize,
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Drop every entry, keeping the pinned configuration.
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM embeddings", [])?;
        tx.execute("DELETE FROM chunks", [])?;

        tx.commit()?;
        Ok(())
    }

    /// Get statistics about the index.
    pub fn stats(&self) -> Result<IndexStats> {
        let chunk_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        Ok(IndexStats {
            chunk_count: chunk_count as u64,
            dimensions: self.config.as_ref().map(|c| c.dimensions).unwrap_or(0),
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<u64> {
        Ok(self.stats()?.chunk_count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Statistics about the vector index.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub chunk_count: u64,
    pub dimensions: u32,
}

/// Serialize an embedding to a binary blob (f32 little-endian).
fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding from a binary blob.
fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot_product / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::models::ChunkMetadata;

    fn chunk(index: u32, content: &str) -> Chunk {
        Chunk::new(
            index,
            content.to_string(),
            ChunkMetadata {
                page_start: 1,
                page_end: 1,
                start_offset: 0,
                end_offset: content.chars().count(),
            },
        )
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_embedding_blob_round_trip() {
        let values = vec![1.0f32, -2.5, 3.25];
        assert_eq!(deserialize_embedding(&serialize_embedding(&values)), values);
    }

    #[test]
    fn test_query_orders_by_similarity() {
        let mut index = VectorIndex::in_memory().unwrap();
        index
            .index(
                &[chunk(0, "x axis"), chunk(1, "y axis"), chunk(2, "diagonal")],
                &[
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    vec![0.7, 0.7],
                ],
            )
            .unwrap();

        let results = index.query(&[1.0, 0.1], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "x axis");
        assert_eq!(results[1].content, "diagonal");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_query_ties_keep_insertion_order() {
        let mut index = VectorIndex::in_memory().unwrap();
        index
            .index(
                &[chunk(0, "first"), chunk(1, "second"), chunk(2, "third")],
                &[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .unwrap();

        let results = index.query(&[1.0, 0.0], 3).unwrap();
        let contents: Vec<_> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_query_returns_fewer_than_k_when_small() {
        let mut index = VectorIndex::in_memory().unwrap();
        index
            .index(&[chunk(0, "only")], &[vec![1.0, 0.0]])
            .unwrap();

        assert_eq!(index.query(&[1.0, 0.0], 10).unwrap().len(), 1);
        assert!(VectorIndex::in_memory()
            .unwrap()
            .query(&[1.0, 0.0], 4)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_index_appends_without_dedup() {
        let mut index = VectorIndex::in_memory().unwrap();
        let chunks = [chunk(0, "same text")];
        let embeddings = [vec![1.0, 0.0]];
        index.index(&chunks, &embeddings).unwrap();
        index
            .index(&[chunk(0, "same text")], &embeddings)
            .unwrap();

        assert_eq!(index.len().unwrap(), 2);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = VectorIndex::in_memory().unwrap();
        index
            .configure(EmbeddingConfig {
                dimensions: 3,
                ..Default::default()
            })
            .unwrap();

        let err = index
            .index(&[chunk(0, "bad")], &[vec![1.0, 0.0]])
            .unwrap_err();
        assert!(matches!(
            err,
            VectorIndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.len().unwrap(), 0);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut index = VectorIndex::in_memory().unwrap();
        let err = index
            .index(&[chunk(0, "a"), chunk(1, "b")], &[vec![1.0]])
            .unwrap_err();
        assert!(matches!(err, VectorIndexError::CountMismatch { .. }));
    }

    #[test]
    fn test_file_backed_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");

        {
            let mut index = VectorIndex::open(&db_path).unwrap();
            index
                .configure(EmbeddingConfig {
                    dimensions: 2,
                    ..Default::default()
                })
                .unwrap();
            index
                .index(&[chunk(0, "persisted")], &[vec![0.5, 0.5]])
                .unwrap();
        }

        let index = VectorIndex::open(&db_path).unwrap();
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(index.config().unwrap().dimensions, 2);
        let results = index.query(&[0.5, 0.5], 1).unwrap();
        assert_eq!(results[0].content, "persisted");
    }

    #[test]
    fn test_open_pinned_rejects_other_model() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");

        VectorIndex::open_pinned(Some(&db_path), EmbeddingConfig::default()).unwrap();

        let other = EmbeddingConfig {
            model: "some-other-model".to_string(),
            ..Default::default()
        };
        let err = VectorIndex::open_pinned(Some(&db_path), other).unwrap_err();
        assert!(matches!(err, VectorIndexError::ModelMismatch { .. }));
    }

    #[test]
    fn test_clear_keeps_config() {
        let mut index = VectorIndex::in_memory().unwrap();
        index.configure(EmbeddingConfig::default()).unwrap();
        index
            .index(&[chunk(0, "gone")], &[vec![1.0; 1536]])
            .unwrap();

        index.clear().unwrap();
        assert!(index.is_empty().unwrap());
        assert!(index.config().is_some());
    }
}
