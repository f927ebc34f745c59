//! Core traits for pdfrag components.
//!
//! - [`DocumentLoader`]: Load documents from a source file
//! - [`Chunker`]: Split document text into overlapping chunks
//! - [`Embedder`]: Generate vector embeddings
//! - [`IndexProvider`] / [`VectorIndex`]: Vector index lifecycle and data plane
//! - [`ChatModel`]: Complete a prompt with a language model
//!
//! Backends are swapped behind these traits without touching the pipelines.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::error::{ChunkError, CompletionError, EmbedError, LoadError, StoreError};
use crate::types::{
    ChatMessage, ChunkConfig, Document, EmbeddingVector, IndexDescriptor, IndexRecord, IndexSpec,
    IndexStats, QueryMatch, TextChunk,
};

// ============================================================================
// Loading
// ============================================================================

/// Trait for loading documents from files.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Check if this loader handles the given file.
    fn can_load(&self, path: &Path) -> bool;

    /// Check if this loader recognises the file from its leading bytes.
    ///
    /// Consulted only when no loader accepts the path.
    fn can_load_content(&self, _header: &[u8]) -> bool {
        false
    }

    /// Load the file as one or more documents (typically one per page).
    async fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError>;
}

// ============================================================================
// Chunking
// ============================================================================

/// Trait for splitting text into chunks.
///
/// Chunking is pure and deterministic, so the trait is synchronous.
pub trait Chunker: Send + Sync {
    /// Name of this chunking strategy.
    fn name(&self) -> &str;

    /// Split `text` into chunks according to `config`.
    fn split(&self, text: &str, config: &ChunkConfig) -> Result<Vec<TextChunk>, ChunkError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
///
/// The vector dimension is a property of the model and is not assumed by
/// callers; it is read from the first response of a run.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embed several texts, preserving input order.
    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        self.embed_many(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("empty embedding result".to_string()))
    }
}

// ============================================================================
// Vector index
// ============================================================================

/// Data-plane handle to a single vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Index name.
    fn name(&self) -> &str;

    /// Write or replace records by id. Returns the number of records written.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, StoreError>;

    /// Return up to `top_k` nearest records, highest score first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError>;

    /// Get index statistics.
    async fn stats(&self) -> Result<IndexStats, StoreError>;
}

/// Index lifecycle: list, describe, create and open indexes.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// Names of all existing indexes.
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Stored configuration of an index, or `None` if it does not exist.
    async fn describe(&self, name: &str) -> Result<Option<IndexDescriptor>, StoreError>;

    /// Create an index. Creating an index that already exists is not an error.
    async fn create(&self, spec: &IndexSpec) -> Result<IndexDescriptor, StoreError>;

    /// Open a handle to an existing index.
    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>, StoreError>;

    /// Create the index if it does not exist; otherwise leave it untouched.
    ///
    /// An existing index is returned as stored. Differences from `spec` are
    /// logged here and left to the caller to act on.
    async fn ensure(&self, spec: &IndexSpec) -> Result<IndexDescriptor, StoreError> {
        match self.describe(&spec.name).await? {
            Some(existing) => {
                if existing.dimension != spec.dimension {
                    warn!(
                        "Index '{}' exists with dimension {}, requested {}",
                        spec.name, existing.dimension, spec.dimension
                    );
                }
                if existing.metric != spec.metric {
                    warn!(
                        "Index '{}' exists with metric {}, requested {}",
                        spec.name, existing.metric, spec.metric
                    );
                }
                if let (Some(stored), Some(requested)) =
                    (&existing.embedding_model, &spec.embedding_model)
                {
                    if stored != requested {
                        warn!(
                            "Index '{}' was built with model '{}', requested '{}'",
                            spec.name, stored, requested
                        );
                    }
                }
                Ok(existing)
            }
            None => self.create(spec).await,
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Trait for chat completion models.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Complete the conversation and return the assistant's text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistanceMetric;
    use std::sync::Mutex;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn embed_many(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct EmptyEmbedder;

    #[async_trait]
    impl Embedder for EmptyEmbedder {
        fn model_name(&self) -> &str {
            "empty"
        }

        async fn embed_many(&self, _texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
            Ok(vec![])
        }
    }

    /// Provider that records `create` calls.
    struct RecordingProvider {
        existing: Option<IndexDescriptor>,
        created: Mutex<Vec<IndexSpec>>,
    }

    #[async_trait]
    impl IndexProvider for RecordingProvider {
        async fn list(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.existing.iter().map(|d| d.name.clone()).collect())
        }

        async fn describe(&self, _name: &str) -> Result<Option<IndexDescriptor>, StoreError> {
            Ok(self.existing.clone())
        }

        async fn create(&self, spec: &IndexSpec) -> Result<IndexDescriptor, StoreError> {
            self.created.lock().unwrap().push(spec.clone());
            Ok(IndexDescriptor::from(spec))
        }

        async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>, StoreError> {
            Err(StoreError::NotFound(name.to_string()))
        }
    }

    fn spec(dimension: usize) -> IndexSpec {
        IndexSpec {
            name: "docs".to_string(),
            dimension,
            metric: DistanceMetric::Cosine,
            embedding_model: Some("fixed".to_string()),
        }
    }

    #[tokio::test]
    async fn test_embed_default_uses_embed_many() {
        let embedding = FixedEmbedder.embed("abcd").await.unwrap();
        assert_eq!(embedding, vec![4.0]);
    }

    #[tokio::test]
    async fn test_embed_default_rejects_empty_result() {
        let err = EmptyEmbedder.embed("abcd").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_index() {
        let provider = RecordingProvider {
            existing: None,
            created: Mutex::new(vec![]),
        };

        let descriptor = provider.ensure(&spec(3)).await.unwrap();

        assert_eq!(descriptor.dimension, 3);
        assert_eq!(provider.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_leaves_existing_index_untouched() {
        let provider = RecordingProvider {
            existing: Some(IndexDescriptor::from(&spec(768))),
            created: Mutex::new(vec![]),
        };

        let descriptor = provider.ensure(&spec(384)).await.unwrap();

        // Existing configuration is returned as stored, not replaced
        assert_eq!(descriptor.dimension, 768);
        assert!(provider.created.lock().unwrap().is_empty());
    }
}
