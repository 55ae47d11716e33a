//! Remote model providers for embeddings and answer generation.
//!
//! Both remote calls sit behind traits so the pipeline never couples to a
//! vendor client object and tests can substitute deterministic fakes.

mod openai;

pub use openai::{OpenAiEmbedder, OpenAiGenerator};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderInitError {
    #[error("API key contains characters invalid in an HTTP header")]
    InvalidApiKey,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Text-in, vector-out remote embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Returns one vector per input, in input
    /// order, all with the same dimensionality.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Prompt-in, text-out remote generation service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
