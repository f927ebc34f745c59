//! Error types for pdfrag.
//!
//! Each pipeline stage has its own error enum; [`Error`] wraps them so that
//! the rendered message always names the failing stage.

use thiserror::Error;

/// Main error type for pdfrag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Document loading failed
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Chunking failed
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector index operation failed
    #[error("index error: {0}")]
    Store(#[from] StoreError),

    /// Chat completion failed
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Embedding dimension changed mid-run or differs from an existing index
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The index was built with a different embedding model
    #[error("embedding model mismatch: index was built with '{index_model}', embedder is '{embedder_model}'")]
    ModelMismatch {
        index_model: String,
        embedder_model: String,
    },

    /// Missing or invalid configuration
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Document loading errors.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The path cannot be read
    #[error("cannot access {path}: {source}")]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid document of the expected type
    #[error("invalid document {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    /// No registered loader accepts the file
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("loading failed: {0}")]
    Failed(String),
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Request could not be sent or the connection failed
    #[error("request failed: {0}")]
    Request(String),

    /// The call did not complete within its timeout
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A vector's length differs from the dimension fixed earlier in the run
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Some items of a batch could not be embedded
    #[error("{failed} of {total} inputs failed to embed; first failure: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: Box<EmbedError>,
    },
}

impl EmbedError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => is_transient_status(*status),
            Self::InvalidResponse(_) | Self::DimensionMismatch { .. } | Self::Partial { .. } => {
                false
            }
        }
    }
}

/// Vector index errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("index initialization failed: {0}")]
    Init(String),

    #[error("upsert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    /// The named index does not exist
    #[error("index not found: {0}")]
    NotFound(String),

    /// A vector's length differs from the index dimension
    #[error("dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The service asked the caller to slow down
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The call did not complete within its timeout
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Request could not be sent or the connection failed
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The caller passed arguments the index cannot serve
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Timeout(_) | Self::Request(_) => true,
            Self::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Chat completion errors.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The model answered with no text
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl CompletionError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => is_transient_status(*status),
            Self::InvalidResponse(_) | Self::EmptyResponse => false,
        }
    }
}

/// HTTP 429 and 5xx are worth retrying.
#[must_use]
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Result type alias for pdfrag operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ========== LoadError Tests ==========

    #[test]
    fn test_load_error_file_access_display() {
        let err = LoadError::FileAccess {
            path: "/missing.pdf".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "cannot access /missing.pdf: no such file");
    }

    #[test]
    fn test_load_error_invalid_document_display() {
        let err = LoadError::InvalidDocument {
            path: "notes.pdf".to_string(),
            reason: "missing header".to_string(),
        };
        assert_eq!(err.to_string(), "invalid document notes.pdf: missing header");
    }

    // ========== ChunkError Tests ==========

    #[test]
    fn test_chunk_error_invalid_config_display() {
        let err = ChunkError::InvalidConfig("chunk_size must be > 0".to_string());
        assert_eq!(err.to_string(), "invalid configuration: chunk_size must be > 0");
    }

    // ========== EmbedError Tests ==========

    #[test]
    fn test_embed_error_transient_classification() {
        assert!(EmbedError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(EmbedError::Request("connection refused".to_string()).is_transient());
        assert!(
            EmbedError::Status {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            EmbedError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !EmbedError::Status {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !EmbedError::DimensionMismatch {
                expected: 768,
                actual: 384
            }
            .is_transient()
        );
    }

    #[test]
    fn test_embed_error_partial_display() {
        let err = EmbedError::Partial {
            failed: 2,
            total: 10,
            first: Box::new(EmbedError::Timeout(Duration::from_secs(30))),
        };
        assert_eq!(
            err.to_string(),
            "2 of 10 inputs failed to embed; first failure: timed out after 30s"
        );
    }

    // ========== StoreError Tests ==========

    #[test]
    fn test_store_error_transient_classification() {
        assert!(StoreError::RateLimited("slow down".to_string()).is_transient());
        assert!(StoreError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(!StoreError::NotFound("docs".to_string()).is_transient());
        assert!(
            !StoreError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
            .is_transient()
        );
    }

    #[test]
    fn test_store_error_not_found_display() {
        let err = StoreError::NotFound("docs".to_string());
        assert_eq!(err.to_string(), "index not found: docs");
    }

    // ========== CompletionError Tests ==========

    #[test]
    fn test_completion_error_transient_classification() {
        assert!(
            CompletionError::Status {
                status: 502,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!CompletionError::EmptyResponse.is_transient());
    }

    // ========== Main Error Tests ==========

    #[test]
    fn test_error_names_failing_stage() {
        let err: Error = EmbedError::Request("connection reset".to_string()).into();
        assert_eq!(err.to_string(), "embedding error: request failed: connection reset");

        let err: Error = StoreError::Query("bad vector".to_string()).into();
        assert_eq!(err.to_string(), "index error: query failed: bad vector");

        let err: Error = CompletionError::EmptyResponse.into();
        assert_eq!(
            err.to_string(),
            "completion error: model returned an empty response"
        );
    }

    #[test]
    fn test_error_dimension_mismatch_display() {
        let err = Error::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 768, got 384");
    }

    #[test]
    fn test_error_model_mismatch_display() {
        let err = Error::ModelMismatch {
            index_model: "nomic-embed-text".to_string(),
            embedder_model: "embeddinggemma".to_string(),
        };
        assert!(err.to_string().contains("nomic-embed-text"));
        assert!(err.to_string().contains("embeddinggemma"));
    }

    #[test]
    fn test_error_config_display() {
        let err = Error::Config("PINECONE_API_KEY is not set".to_string());
        assert_eq!(err.to_string(), "config error: PINECONE_API_KEY is not set");
    }

    #[test]
    fn test_is_transient_status() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(599));
        assert!(!is_transient_status(404));
        assert!(!is_transient_status(200));
    }
}
