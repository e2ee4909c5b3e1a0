// Embeddings module
// Text chunking plus the pluggable embedding backends

pub mod chunking;
pub mod hashing;
pub mod ollama;


use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{EmbeddingConfig, EmbeddingProvider};

pub use chunking::{ChunkingConfig, ChunkingError, Chunker, TextWindow, Windows, count_words};
pub use hashing::HashingEmbedder;
pub use ollama::{OllamaClient, OllamaEmbedder};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Failed to load embedding model '{model}': {message}")]
    Load { model: String, message: String },

    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Mismatch between request and response counts: {expected} vs {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A loaded embedding model.
///
/// Implementations must be deterministic: the vector for a given text is the
/// same whether it was embedded alone or as part of a batch.
pub trait Embedder: Send + Sync + fmt::Debug {
    /// Identifier of the pinned model
    fn model_id(&self) -> &str;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed a single text, typically a query
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed many texts at once, preserving order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Loads an embedding model. Loading is expensive, so callers memoize the result.
#[async_trait]
pub trait EmbedderLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn Embedder>, EmbeddingError>;
}

/// Loader that picks the backend named in the configuration
#[derive(Debug, Clone)]
pub struct ConfiguredLoader {
    config: EmbeddingConfig,
}

impl ConfiguredLoader {
    #[inline]
    pub const fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmbedderLoader for ConfiguredLoader {
    #[inline]
    async fn load(&self) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        match self.config.provider {
            EmbeddingProvider::Hashing => {
                let embedder = HashingEmbedder::new(self.config.dimension as usize);
                info!(
                    "Loaded hashing embedder with {} dimensions",
                    embedder.dimension()
                );
                Ok(Arc::new(embedder))
            }
            EmbeddingProvider::Ollama => {
                let config = self.config.clone();
                let model = config.model.clone();
                // The Ollama client is blocking
                let embedder = tokio::task::spawn_blocking(move || OllamaEmbedder::connect(&config))
                    .await
                    .map_err(|e| EmbeddingError::Load {
                        model,
                        message: format!("loader task failed: {}", e),
                    })??;
                Ok(Arc::new(embedder))
            }
        }
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
