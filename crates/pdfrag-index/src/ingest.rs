//! Ingestion pipeline: load → chunk → embed → upsert.

use pdfrag_core::{
    ChunkConfig, ChunkPayload, Chunker, DistanceMetric, Document, EmbeddingVector, Error,
    IndexProvider, IndexRecord, IndexSpec, IngestReport, LoadError, Result, TextChunk,
};
use pdfrag_embed::EmbedderPool;
use pdfrag_extract::LoaderRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::ids::record_id;

/// Default name of the target index.
pub const DEFAULT_INDEX_NAME: &str = "pdfrag";

/// Default number of records per upsert request.
pub const DEFAULT_UPSERT_BATCH_SIZE: usize = 100;

/// Ingestion progress events.
#[derive(Debug, Clone)]
pub enum IngestUpdate {
    Started { path: PathBuf },
    Loaded { path: PathBuf, documents: usize },
    Chunked { path: PathBuf, chunks: usize },
    Embedded { path: PathBuf, succeeded: usize, failed: usize },
    Upserted { path: PathBuf, written: usize, total: usize },
    Completed { report: IngestReport },
    Failed { path: PathBuf, error: String },
}

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Target index
    pub index_name: String,
    /// Metric used when the index has to be created
    pub metric: DistanceMetric,
    /// Chunk size and overlap
    pub chunk_config: ChunkConfig,
    /// Records per upsert request
    pub upsert_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            metric: DistanceMetric::Cosine,
            chunk_config: ChunkConfig::default(),
            upsert_batch_size: DEFAULT_UPSERT_BATCH_SIZE,
        }
    }
}

/// A chunk together with the page it was cut from.
struct PageChunk {
    source: String,
    page: Option<u32>,
    title: Option<String>,
    chunk: TextChunk,
}

/// Runs one source document through the full pipeline into a vector index.
pub struct IngestionPipeline {
    loaders: Arc<LoaderRegistry>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<EmbedderPool>,
    provider: Arc<dyn IndexProvider>,
    config: IngestConfig,
    update_tx: broadcast::Sender<IngestUpdate>,
}

impl IngestionPipeline {
    /// Create a new ingestion pipeline.
    pub fn new(
        loaders: Arc<LoaderRegistry>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<EmbedderPool>,
        provider: Arc<dyn IndexProvider>,
        config: IngestConfig,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(256);
        Self {
            loaders,
            chunker,
            embedder,
            provider,
            config,
            update_tx,
        }
    }

    /// Subscribe to ingestion updates.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestUpdate> {
        self.update_tx.subscribe()
    }

    /// Pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest the document at `path`.
    ///
    /// Records that were embedded are upserted even when other chunks failed;
    /// the run then returns [`pdfrag_core::EmbedError::Partial`]. Nothing is
    /// written when the embedding dimension changes mid-run or disagrees
    /// with an existing index.
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport> {
        let _ = self.update_tx.send(IngestUpdate::Started {
            path: path.to_path_buf(),
        });

        match self.run(path).await {
            Ok(report) => {
                info!(
                    "Ingested {:?} into '{}' ({} documents, {} chunks, {} records)",
                    path, report.index, report.documents, report.chunks, report.records_written
                );
                let _ = self.update_tx.send(IngestUpdate::Completed {
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                error!("Failed to ingest {:?}: {}", path, e);
                let _ = self.update_tx.send(IngestUpdate::Failed {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, path: &Path) -> Result<IngestReport> {
        let index_name = self.config.index_name.as_str();
        let model = self.embedder.model_name().to_string();

        // Load
        let loaded = self.loaders.load(path).await?;
        let page_total = loaded.len();
        let documents: Vec<Document> = loaded
            .into_iter()
            .filter(|doc| !doc.text.trim().is_empty())
            .collect();
        if documents.len() < page_total {
            debug!(
                "Skipped {} blank pages in {:?}",
                page_total - documents.len(),
                path
            );
        }
        if documents.is_empty() {
            return Err(LoadError::InvalidDocument {
                path: path.display().to_string(),
                reason: "no extractable text".to_string(),
            }
            .into());
        }
        let source = documents[0].source.clone();
        let _ = self.update_tx.send(IngestUpdate::Loaded {
            path: path.to_path_buf(),
            documents: documents.len(),
        });

        // Chunk
        let mut pending = Vec::new();
        for doc in &documents {
            let chunks = self.chunker.split(&doc.text, &self.config.chunk_config)?;
            pending.extend(chunks.into_iter().map(|chunk| PageChunk {
                source: doc.source.clone(),
                page: doc.page,
                title: doc.metadata.title.clone(),
                chunk,
            }));
        }
        info!(
            "Split {:?} into {} chunks (size {}, overlap {})",
            path,
            pending.len(),
            self.config.chunk_config.chunk_size,
            self.config.chunk_config.overlap
        );
        let _ = self.update_tx.send(IngestUpdate::Chunked {
            path: path.to_path_buf(),
            chunks: pending.len(),
        });

        // Embed
        let chunk_count = pending.len();
        let texts: Vec<&str> = pending.iter().map(|p| p.chunk.text.as_str()).collect();
        let mut embedded = self.embedder.embed_all(&texts).await;
        let _ = self.update_tx.send(IngestUpdate::Embedded {
            path: path.to_path_buf(),
            succeeded: embedded.succeeded(),
            failed: embedded.failures.len(),
        });

        if let Some((expected, actual)) = embedded.dimension_mismatch() {
            return Err(Error::DimensionMismatch { expected, actual });
        }
        let failure = embedded.failure();
        let Some(dimension) = embedded.dimension else {
            return Err(match failure {
                Some(err) => err.into(),
                None => Error::Other(format!("no chunks produced for {}", path.display())),
            });
        };

        // Ensure the index
        let descriptor = self
            .provider
            .ensure(&IndexSpec {
                name: index_name.to_string(),
                dimension,
                metric: self.config.metric,
                embedding_model: Some(model.clone()),
            })
            .await?;
        if descriptor.dimension != dimension {
            return Err(Error::DimensionMismatch {
                expected: descriptor.dimension,
                actual: dimension,
            });
        }
        if let Some(stored) = descriptor.embedding_model {
            if stored != model {
                return Err(Error::ModelMismatch {
                    index_model: stored,
                    embedder_model: model,
                });
            }
        }
        let index = self.provider.open(index_name).await?;

        // Upsert
        let records: Vec<IndexRecord> = pending
            .into_iter()
            .zip(std::mem::take(&mut embedded.vectors))
            .filter_map(|(page_chunk, vector)| {
                vector.map(|vector| build_record(page_chunk, vector, &model))
            })
            .collect();

        let batch_size = self.config.upsert_batch_size.max(1);
        let mut written = 0;
        for batch in records.chunks(batch_size) {
            written += index.upsert(batch).await?;
            debug!("Upserted {}/{} records into '{}'", written, records.len(), index_name);
            let _ = self.update_tx.send(IngestUpdate::Upserted {
                path: path.to_path_buf(),
                written,
                total: records.len(),
            });
        }

        if let Some(err) = failure {
            warn!(
                "{} records written to '{}' before reporting embedding failures",
                written, index_name
            );
            return Err(err.into());
        }

        Ok(IngestReport {
            source,
            index: index_name.to_string(),
            documents: documents.len(),
            chunks: chunk_count,
            records_written: written,
            dimension,
        })
    }
}

fn build_record(page_chunk: PageChunk, vector: EmbeddingVector, model: &str) -> IndexRecord {
    let PageChunk {
        source,
        page,
        title,
        chunk,
    } = page_chunk;

    let mut payload = ChunkPayload {
        text: chunk.text,
        source,
        page,
        chunk_index: chunk.ordinal,
        char_start: chunk.char_range.start,
        char_end: chunk.char_range.end,
        embedding_model: Some(model.to_string()),
        ..Default::default()
    };
    if let Some(title) = title {
        payload.extra.insert("title".to_string(), title);
    }

    IndexRecord {
        id: record_id(&payload.source, page, &chunk.char_range),
        vector,
        payload,
    }
}
