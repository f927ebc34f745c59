//! Ingestion pipeline for pdfrag.
//!
//! Runs a source document through loading → chunking → embedding → upsert
//! into a vector index.
//!
//! # Components
//!
//! - [`IngestionPipeline`]: coordinates one ingestion run
//! - [`IngestConfig`]: target index, metric, chunking and batch sizes
//! - [`IngestUpdate`]: events emitted during ingestion
//! - [`record_id`]: stable record identifiers
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfrag_index::{IngestConfig, IngestionPipeline, IngestUpdate};
//!
//! let pipeline = IngestionPipeline::new(loaders, chunker, embedder, provider, IngestConfig::default());
//!
//! let mut updates = pipeline.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(update) = updates.recv().await {
//!         if let IngestUpdate::Upserted { written, total, .. } = update {
//!             println!("{written}/{total}");
//!         }
//!     }
//! });
//!
//! let report = pipeline.ingest(Path::new("paper.pdf")).await?;
//! ```

pub mod ids;
pub mod ingest;

pub use ids::{RECORD_ID_LEN, record_id};
pub use ingest::{
    DEFAULT_INDEX_NAME, DEFAULT_UPSERT_BATCH_SIZE, IngestConfig, IngestUpdate, IngestionPipeline,
};
