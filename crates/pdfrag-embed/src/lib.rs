//! # pdfrag-embed
//!
//! Embedding generation for pdfrag.
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`OllamaEmbedder`] | Embeddings from an Ollama server (`/api/embed`) |
//! | [`HashEmbedder`] | Deterministic offline embeddings for dry runs and tests |
//! | [`EmbedderPool`] | Batched, concurrency-limited, order-preserving fan-out |
//! | [`DimensionGuard`] | Fixes the run's dimension on the first vector |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdfrag_embed::{EmbedderPool, OllamaEmbedder};
//! use std::sync::Arc;
//!
//! let embedder = OllamaEmbedder::new("http://localhost:11434", "embeddinggemma")?;
//! let pool = EmbedderPool::new(Arc::new(embedder), 4);
//!
//! let batch = pool.embed_all(&["Hello world", "Machine learning"]).await;
//! let vectors = batch.into_vectors()?;
//! ```
//!
//! Vector dimension is never configured; it is whatever the model returns
//! first, and every later vector in the run must match it.

pub mod guard;
pub mod hash;
pub mod ollama;
pub mod pool;

pub use guard::DimensionGuard;
pub use hash::{DEFAULT_HASH_DIMENSION, HashEmbedder};
pub use ollama::{DEFAULT_EMBEDDING_MODEL, OllamaEmbedder};
pub use pool::{BatchEmbedding, DEFAULT_BATCH_SIZE, EmbedderPool};
