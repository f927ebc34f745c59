//! Embedder pool for concurrent embedding operations.

use futures::future::join_all;
use pdfrag_core::{EmbedError, Embedder, EmbeddingVector};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::guard::DimensionGuard;

/// Default number of texts sent in one request.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Result of embedding many texts where some may have failed.
#[derive(Debug)]
pub struct BatchEmbedding {
    /// One slot per input, in input order; `None` where embedding failed
    pub vectors: Vec<Option<EmbeddingVector>>,
    /// `(input index, error)` for every failed input, in input order
    pub failures: Vec<(usize, EmbedError)>,
    /// Dimension fixed by the first successful vector
    pub dimension: Option<usize>,
}

impl BatchEmbedding {
    /// Number of inputs.
    #[must_use]
    pub fn total(&self) -> usize {
        self.vectors.len()
    }

    /// Number of inputs embedded successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.vectors.iter().filter(|v| v.is_some()).count()
    }

    /// Whether every input was embedded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// First dimension mismatch among the failures, if any.
    #[must_use]
    pub fn dimension_mismatch(&self) -> Option<(usize, usize)> {
        self.failures.iter().find_map(|(_, err)| match err {
            EmbedError::DimensionMismatch { expected, actual } => Some((*expected, *actual)),
            _ => None,
        })
    }

    /// Summary error for the failed inputs, if any failed.
    pub fn failure(&mut self) -> Option<EmbedError> {
        if self.failures.is_empty() {
            return None;
        }
        let failed = self.failures.len();
        let total = self.total();
        let (_, first) = self.failures.remove(0);
        Some(EmbedError::Partial {
            failed,
            total,
            first: Box::new(first),
        })
    }

    /// All vectors in input order, or an error if any input failed.
    ///
    /// A dimension mismatch is reported as such rather than as a partial failure.
    pub fn into_vectors(mut self) -> Result<Vec<EmbeddingVector>, EmbedError> {
        if let Some((expected, actual)) = self.dimension_mismatch() {
            return Err(EmbedError::DimensionMismatch { expected, actual });
        }
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(self.vectors.into_iter().flatten().collect())
    }
}

/// Pool that fans embedding requests out over batches with concurrency control.
pub struct EmbedderPool {
    embedder: Arc<dyn Embedder>,
    /// Semaphore to limit concurrent requests
    semaphore: Semaphore,
    max_concurrent: usize,
    batch_size: usize,
}

impl EmbedderPool {
    /// Create a new embedder pool.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            embedder,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of texts per request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Get the model name.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Get the underlying embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Get pool statistics.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get max concurrent operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Get texts per request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed all texts, keeping input order and recording per-input failures.
    ///
    /// A failed batch is retried one text at a time so that a single bad
    /// input does not discard its neighbours. Every vector passes through a
    /// [`DimensionGuard`]; vectors whose length differs from the first
    /// successful vector are recorded as [`EmbedError::DimensionMismatch`].
    pub async fn embed_all(&self, texts: &[&str]) -> BatchEmbedding {
        let batches = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch(batch));
        let results: Vec<Result<EmbeddingVector, EmbedError>> =
            join_all(batches).await.into_iter().flatten().collect();

        let mut guard = DimensionGuard::new();
        let mut vectors = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result.and_then(|vector| guard.check(vector.len()).map(|_| vector)) {
                Ok(vector) => vectors.push(Some(vector)),
                Err(err) => {
                    vectors.push(None);
                    failures.push((index, err));
                }
            }
        }

        debug!(
            "Embedded {}/{} texts with {}",
            texts.len() - failures.len(),
            texts.len(),
            self.model_name()
        );

        BatchEmbedding {
            vectors,
            failures,
            dimension: guard.dimension(),
        }
    }

    /// Embed a single query.
    pub async fn embed_query(&self, query: &str) -> Result<EmbeddingVector, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Request(format!("semaphore error: {e}")))?;

        let vector = self.embedder.embed(query).await?;
        DimensionGuard::new().check(vector.len())?;
        Ok(vector)
    }

    /// Embed one batch; returns exactly one result per input.
    async fn embed_batch(&self, texts: &[&str]) -> Vec<Result<EmbeddingVector, EmbedError>> {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return texts
                    .iter()
                    .map(|_| Err(EmbedError::Request(format!("semaphore error: {e}"))))
                    .collect();
            }
        };

        match self.embedder.embed_many(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors.into_iter().map(Ok).collect(),
            Ok(vectors) => {
                warn!(
                    "Embedder returned {} vectors for {} texts, embedding one at a time",
                    vectors.len(),
                    texts.len()
                );
                self.embed_each(texts).await
            }
            Err(err) if texts.len() > 1 => {
                warn!(
                    "Batch of {} texts failed ({}), embedding one at a time",
                    texts.len(),
                    err
                );
                self.embed_each(texts).await
            }
            Err(err) => vec![Err(err)],
        }
    }

    async fn embed_each(&self, texts: &[&str]) -> Vec<Result<EmbeddingVector, EmbedError>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embedder.embed(text).await);
        }
        results
    }
}
