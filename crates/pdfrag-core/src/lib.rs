//! # pdfrag-core
//!
//! Core types and traits for pdfrag, a retrieval-augmented generation
//! pipeline over PDF documents.
//!
//! This crate provides the abstractions shared by every other crate:
//!
//! - **Loading**: [`DocumentLoader`] trait for turning files into [`Document`]s
//! - **Chunking**: [`Chunker`] trait for splitting text into overlapping chunks
//! - **Embedding**: [`Embedder`] trait for converting text to vectors
//! - **Vector index**: [`IndexProvider`] and [`VectorIndex`] traits
//! - **Completion**: [`ChatModel`] trait for the answering model
//! - **Retry**: [`RetryPolicy`] for timeouts and backoff around remote calls
//!
//! ## Architecture
//!
//! ```text
//! ingest: PDF → DocumentLoader → Chunker → Embedder → IndexProvider::ensure → VectorIndex::upsert
//! query:  question → Embedder → VectorIndex::query → prompt → ChatModel → answer
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Document`] | Text of one page with its source |
//! | [`TextChunk`] | A window over a document's text |
//! | [`IndexRecord`] | `(id, vector, payload)` stored in an index |
//! | [`QueryMatch`] | A retrieved record with its score |
//! | [`IndexDescriptor`] | Stored configuration of an index, including model identity |
//!
//! ## Related Crates
//!
//! - `pdfrag-extract`: PDF and text loaders
//! - `pdfrag-chunker`: Recursive character chunker
//! - `pdfrag-embed`: Ollama embedder, embedder pool and dimension guard
//! - `pdfrag-store`: Pinecone, local-file and in-memory indexes
//! - `pdfrag-index`: Ingestion pipeline
//! - `pdfrag-query`: Query pipeline and chat backend

pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{
    ChunkError, CompletionError, EmbedError, Error, LoadError, Result, StoreError,
    is_transient_status,
};
pub use retry::{RetryPolicy, Retryable};
pub use traits::*;
pub use types::*;
