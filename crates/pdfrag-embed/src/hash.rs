//! Deterministic offline embedder.
//!
//! Hashes each lowercase word with blake3 into a signed bucket of a fixed
//! size vector and L2-normalises the result. Texts that share words land
//! close together under cosine similarity, which is enough for dry runs
//! and tests without an embedding service.

use async_trait::async_trait;
use pdfrag_core::{EmbedError, Embedder, EmbeddingVector};

/// Default dimension of [`HashEmbedder`] vectors.
pub const DEFAULT_HASH_DIMENSION: usize = 256;

/// Feature-hashing embedder that needs no model or network.
pub struct HashEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashEmbedder {
    /// Create a hash embedder with the default dimension.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_HASH_DIMENSION)
    }

    /// Create a hash embedder producing vectors of `dimension` values.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_name: format!("blake3-hash-{dimension}"),
        }
    }

    /// Vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> EmbeddingVector {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = blake3::hash(word.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&bytes[..8]);
            let index = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
