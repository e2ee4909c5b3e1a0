#[cfg(test)]
mod tests;

use xxhash_rust::xxh3::xxh3_64;

use super::{Embedder, EmbeddingError, normalize};

pub const DEFAULT_HASHING_DIMENSION: usize = 384;
const MODEL_ID: &str = "hashing-unigram-v1";

/// Offline embedder based on the hashing trick.
///
/// Each lowercased word is hashed into one of `dimension` buckets and adds
/// +1 or -1 depending on a second hash bit, then the vector is normalized.
/// Texts sharing vocabulary end up close in cosine space, which is enough
/// for exercising retrieval without a model server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    #[inline]
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0_f32; self.dimension];

        for word in text.split_whitespace() {
            let token: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if token.is_empty() {
                continue;
            }

            let hash = xxh3_64(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        Ok(vector)
    }
}
