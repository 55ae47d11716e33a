//! Application configuration.
//!
//! Loaded from a TOML file (default `<config_dir>/folio/config.toml`),
//! with every field defaulted so a missing file just means defaults.
//! Credentials fall back to the `OPENAI_API_KEY` environment variable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rag::{ChunkingConfig, EmbeddingConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// HTTP front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on uploaded PDF size, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Number of chunks returned per query.
    pub top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Remote embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingProviderConfig {
    /// Provider: "openai", "ollama", or "lmstudio"
    pub provider: String,
    pub model: String,
    pub dimensions: u32,
    /// Override the provider's default endpoint.
    pub base_url: Option<String>,
    /// Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Texts per embedding request.
    pub batch_size: usize,
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            base_url: None,
            api_key: None,
            batch_size: 32,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

/// Remote generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider: "openai", "ollama", or "lmstudio"
    pub provider: String,
    pub model: String,
    /// Maximum tokens the model may generate.
    pub max_tokens: usize,
    pub temperature: f32,
    pub base_url: Option<String>,
    /// Falls back to `OPENAI_API_KEY` when unset.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Budget for retrieved context stuffed into the prompt, in characters.
    /// Lowest-ranked chunks are dropped whole when the budget is exceeded.
    pub max_context_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 400,
            temperature: 0.2,
            base_url: None,
            api_key: None,
            timeout_secs: 60,
            max_context_chars: 12_000,
        }
    }
}

/// Vector index persistence. In-memory when no path is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub retriever: RetrieverConfig,
    pub embedding: EmbeddingProviderConfig,
    pub generation: GenerationConfig,
    pub index: IndexConfig,
}

impl AppConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("folio").join("config.toml"))
    }

    /// Default on-disk index location used by the CLI.
    pub fn default_index_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("folio").join("index.db"))
    }

    /// Load configuration from `path`, or from the default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path.map(PathBuf::from).or_else(Self::default_path);

        let mut config = match resolved {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)?;
                toml::from_str(&raw)?
            }
            _ => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// The embedding model identity pinned into the vector index.
    pub fn pinned_embedding(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: self.embedding.provider.clone(),
            model: self.embedding.model.clone(),
            dimensions: self.embedding.dimensions,
        }
    }

    fn apply_env(&mut self) {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.generation.api_key.is_none() {
            self.generation.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7860);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retriever.top_k, 4);
        assert!(config.index.path.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dimensions = 768
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "0.0.0.0");
        assert_eq!(parsed.embedding.provider, "ollama");
        assert_eq!(parsed.embedding.dimensions, 768);
        assert_eq!(parsed.generation.model, "gpt-4o-mini");
    }
}
