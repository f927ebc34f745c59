//! Core types for pdfrag.
//!
//! ## Documents and chunks
//! - [`Document`]: text of one page produced by a loader
//! - [`TextChunk`]: an overlapping window over a document's text
//! - [`ChunkConfig`]: chunk size and overlap in characters
//!
//! ## Index records
//! - [`IndexRecord`]: `(id, vector, payload)` triple stored in a vector index
//! - [`ChunkPayload`]: metadata stored next to each vector
//! - [`IndexSpec`] / [`IndexDescriptor`]: requested and stored index configuration
//! - [`DistanceMetric`]: similarity function of an index
//!
//! ## Retrieval
//! - [`QueryMatch`]: a retrieved record with its similarity score
//! - [`ChatMessage`]: one message submitted to a completion model
//! - [`IngestReport`] / [`AnswerOutput`]: results of the two pipeline operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// A dense embedding vector.
pub type EmbeddingVector = Vec<f32>;

// ============================================================================
// Documents
// ============================================================================

/// Text extracted from one page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Extracted text
    pub text: String,
    /// Source identifier (canonical path of the loaded file)
    pub source: String,
    /// Page number (1-indexed), if the loader splits by page
    pub page: Option<u32>,
    /// Document-level metadata
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document without page or title metadata.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            page: None,
            metadata: DocumentMetadata::default(),
        }
    }

    /// Set the page number.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Metadata shared by all pages of a loaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Document title
    pub title: Option<String>,
    /// Total page count
    pub page_count: Option<u32>,
}

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for chunking. Sizes are counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
}

impl ChunkConfig {
    /// Create a chunk configuration.
    #[must_use]
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            overlap: 150,
        }
    }
}

/// A contiguous window over a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk within its document (0-indexed)
    pub ordinal: u32,
    /// Chunk text
    pub text: String,
    /// Character range in the source text
    pub char_range: Range<usize>,
    /// Byte range in the source text
    pub byte_range: Range<usize>,
}

impl TextChunk {
    /// Number of characters in the chunk.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.char_range.end - self.char_range.start
    }
}

// ============================================================================
// Vector index
// ============================================================================

/// Distance metric for vector search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl DistanceMetric {
    /// Lowercase name used in configuration files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclidean => "euclidean",
        }
    }

    /// Similarity of two vectors under this metric; higher is closer.
    ///
    /// Euclidean distance `d` is mapped to `1 / (1 + d)`.
    #[must_use]
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return f32::NEG_INFINITY;
        }
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a * norm_b)
            }
            Self::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Self::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "dotproduct" => Ok(Self::Dot),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

/// Requested configuration of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name
    pub name: String,
    /// Vector dimension
    pub dimension: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
    /// Embedding model whose vectors the index holds
    pub embedding_model: Option<String>,
}

/// Stored configuration of an existing index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name
    pub name: String,
    /// Vector dimension fixed at creation
    pub dimension: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
    /// Embedding model tag, if the index carries one
    #[serde(default)]
    pub embedding_model: Option<String>,
    /// Data-plane host (remote backends only)
    #[serde(default)]
    pub host: Option<String>,
    /// Whether the index accepts reads and writes
    #[serde(default = "default_ready")]
    pub ready: bool,
}

fn default_ready() -> bool {
    true
}

impl From<&IndexSpec> for IndexDescriptor {
    fn from(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name.clone(),
            dimension: spec.dimension,
            metric: spec.metric,
            embedding_model: spec.embedding_model.clone(),
            host: None,
            ready: true,
        }
    }
}

/// Metadata stored next to each vector.
///
/// Field names are flat so that remote backends which only accept scalar
/// metadata values can store the payload unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Source chunk text
    pub text: String,
    /// Source identifier
    #[serde(default)]
    pub source: String,
    /// Page number (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Chunk ordinal within its page
    #[serde(default)]
    pub chunk_index: u32,
    /// First character offset within the page text
    #[serde(default)]
    pub char_start: usize,
    /// End character offset (exclusive)
    #[serde(default)]
    pub char_end: usize,
    /// Embedding model that produced the vector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Additional key-value metadata
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl ChunkPayload {
    /// Payload carrying only text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A record stored in a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Unique record identifier
    pub id: String,
    /// Embedding vector
    pub vector: EmbeddingVector,
    /// Payload with at least the chunk text
    pub payload: ChunkPayload,
}

/// A retrieved record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record identifier
    pub id: String,
    /// Similarity score (higher is closer)
    pub score: f32,
    /// Stored payload
    pub payload: ChunkPayload,
}

/// Vector index statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Index name
    pub name: String,
    /// Number of stored records
    pub record_count: u64,
    /// Vector dimension (0 when unknown)
    pub dimension: usize,
    /// Last update time, when the backend tracks it
    pub last_updated: Option<DateTime<Utc>>,
}

// ============================================================================
// Completion
// ============================================================================

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
}

/// One message submitted to a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Pipeline outputs
// ============================================================================

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Source that was ingested
    pub source: String,
    /// Target index
    pub index: String,
    /// Documents (pages) loaded with non-blank text
    pub documents: usize,
    /// Chunks produced
    pub chunks: usize,
    /// Records written to the index
    pub records_written: usize,
    /// Observed embedding dimension
    pub dimension: usize,
}

/// Answer to a question together with the context it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOutput {
    /// Question as asked
    pub question: String,
    /// Completion text, verbatim
    pub answer: String,
    /// Retrieved context, in prompt order
    pub matches: Vec<QueryMatch>,
}
