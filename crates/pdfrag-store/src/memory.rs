//! In-memory index backend.
//!
//! Keeps every index in process memory and searches by brute force. Nothing
//! is persisted; useful for tests and one-shot runs.

use async_trait::async_trait;
use pdfrag_core::{
    IndexDescriptor, IndexProvider, IndexRecord, IndexSpec, IndexStats, QueryMatch, StoreError,
    VectorIndex,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::data::IndexData;
use crate::validate_spec;

/// Provider of in-memory indexes.
///
/// # Example
///
/// ```rust
/// use pdfrag_store::MemoryProvider;
/// use pdfrag_core::{DistanceMetric, IndexProvider, IndexSpec, VectorIndex};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = MemoryProvider::new();
/// provider
///     .ensure(&IndexSpec {
///         name: "docs".to_string(),
///         dimension: 3,
///         metric: DistanceMetric::Cosine,
///         embedding_model: None,
///     })
///     .await?;
///
/// let index = provider.open("docs").await?;
/// assert_eq!(index.stats().await?.record_count, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryProvider {
    indexes: RwLock<HashMap<String, Arc<MemoryIndex>>>,
}

impl MemoryProvider {
    /// Create a provider with no indexes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexProvider for MemoryProvider {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe(&self, name: &str) -> Result<Option<IndexDescriptor>, StoreError> {
        let index = self.indexes.read().await.get(name).cloned();
        match index {
            Some(index) => Ok(Some(index.data.read().await.descriptor.clone())),
            None => Ok(None),
        }
    }

    async fn create(&self, spec: &IndexSpec) -> Result<IndexDescriptor, StoreError> {
        validate_spec(spec)?;
        let mut indexes = self.indexes.write().await;
        if let Some(existing) = indexes.get(&spec.name) {
            return Ok(existing.data.read().await.descriptor.clone());
        }

        let descriptor = IndexDescriptor::from(spec);
        indexes.insert(
            spec.name.clone(),
            Arc::new(MemoryIndex {
                name: spec.name.clone(),
                data: RwLock::new(IndexData::new(descriptor.clone())),
            }),
        );
        debug!(
            "Created memory index '{}' (dimension: {}, metric: {})",
            spec.name, spec.dimension, spec.metric
        );
        Ok(descriptor)
    }

    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>, StoreError> {
        let index = self
            .indexes
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        Ok(index)
    }
}

/// A single in-memory index.
pub struct MemoryIndex {
    name: String,
    data: RwLock<IndexData>,
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, StoreError> {
        let written = self.data.write().await.upsert(records)?;
        debug!("Upserted {} records into '{}'", written, self.name);
        Ok(written)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        self.data.read().await.query(vector, top_k)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        Ok(self.data.read().await.stats())
    }
}
