// Similarity index module
// Exact cosine top-k over an immutable set of chunk vectors


use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::embeddings::normalize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A window of document text, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub document_id: Uuid,
    /// Filename of the source document
    pub source_name: String,
    /// Position within the document, continuous across pages
    pub chunk_index: usize,
    /// 1-based page the window was taken from
    pub page_number: Option<u32>,
    pub text: String,
    pub word_count: usize,
}

/// A chunk returned by a search along with its cosine similarity
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub documents: usize,
    pub dimension: usize,
    /// Vectors plus chunk text, in bytes
    pub approximate_bytes: usize,
}

#[derive(Debug)]
struct Entry {
    chunk: Arc<Chunk>,
    vector: Vec<f32>,
}

/// Immutable exact-search index.
///
/// Vectors are normalized when the index is built, so scoring is a plain dot
/// product. A new corpus means a new index.
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    entries: Vec<Entry>,
    dimension: usize,
}

impl SimilarityIndex {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(chunk, vector)` pairs. Every vector must have the same length.
    #[inline]
    pub fn build<I>(entries: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (Arc<Chunk>, Vec<f32>)>,
    {
        let mut dimension = None;
        let mut built = Vec::new();

        for (chunk, mut vector) in entries {
            let expected = *dimension.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            normalize(&mut vector);
            built.push(Entry { chunk, vector });
        }

        debug!("Built similarity index with {} entries", built.len());

        Ok(Self {
            entries: built,
            dimension: dimension.unwrap_or(0),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Chunks in insertion order
    #[inline]
    pub fn chunks(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    /// The `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order.
    #[inline]
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, dot(&query, &entry.vector)))
            .collect();

        // Stable sort, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                chunk: Arc::clone(&self.entries[position].chunk),
                score,
            })
            .collect())
    }

    #[inline]
    pub fn stats(&self) -> IndexStats {
        let documents: HashSet<Uuid> = self
            .entries
            .iter()
            .map(|entry| entry.chunk.document_id)
            .collect();
        let approximate_bytes = self
            .entries
            .iter()
            .map(|entry| entry.vector.len() * size_of::<f32>() + entry.chunk.text.len())
            .sum();

        IndexStats {
            entries: self.entries.len(),
            documents: documents.len(),
            dimension: self.dimension,
            approximate_bytes,
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// The published index, swapped whole on every rebuild.
///
/// Readers take a snapshot and search it without holding any lock, so a
/// concurrent rebuild is never observed half-done.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    current: Arc<RwLock<Arc<SimilarityIndex>>>,
}

impl SharedIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub async fn snapshot(&self) -> Arc<SimilarityIndex> {
        Arc::clone(&*self.current.read().await)
    }

    /// Build a new index from `entries` and publish it.
    /// On error the previous index stays published.
    #[inline]
    pub async fn replace<I>(&self, entries: I) -> Result<Arc<SimilarityIndex>, IndexError>
    where
        I: IntoIterator<Item = (Arc<Chunk>, Vec<f32>)>,
    {
        let index = Arc::new(SimilarityIndex::build(entries)?);
        self.publish(Arc::clone(&index)).await;
        Ok(index)
    }

    /// Publish an already built index
    #[inline]
    pub async fn publish(&self, index: Arc<SimilarityIndex>) {
        *self.current.write().await = index;
    }

    #[inline]
    pub async fn clear(&self) {
        self.publish(Arc::new(SimilarityIndex::empty())).await;
    }
}
