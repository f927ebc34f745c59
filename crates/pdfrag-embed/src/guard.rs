//! Embedding dimension guard.

use pdfrag_core::EmbedError;

/// Fixes the embedding dimension on the first vector it sees and rejects
/// any later vector of a different length.
///
/// Vectors are never truncated or padded to fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimensionGuard {
    dimension: Option<usize>,
}

impl DimensionGuard {
    /// Create a guard with no dimension fixed yet.
    #[must_use]
    pub fn new() -> Self {
        Self { dimension: None }
    }

    /// Create a guard with a known dimension, e.g. that of an existing index.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
        }
    }

    /// The fixed dimension, once known.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Check a vector of length `actual`, fixing the dimension if unset.
    pub fn check(&mut self, actual: usize) -> Result<usize, EmbedError> {
        if actual == 0 {
            return Err(EmbedError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }
        match self.dimension {
            None => {
                self.dimension = Some(actual);
                Ok(actual)
            }
            Some(expected) if expected == actual => Ok(actual),
            Some(expected) => Err(EmbedError::DimensionMismatch { expected, actual }),
        }
    }
}
