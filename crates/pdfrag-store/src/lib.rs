//! Vector index backends for pdfrag.
//!
//! Every backend implements [`IndexProvider`](pdfrag_core::IndexProvider)
//! for the index lifecycle and hands out
//! [`VectorIndex`](pdfrag_core::VectorIndex) handles for upsert and query.
//!
//! | Backend | Storage | Use |
//! |---------|---------|-----|
//! | [`PineconeProvider`] | Pinecone serverless | Default remote index |
//! | [`LocalProvider`] | One JSON file per index | Offline use without a Pinecone account |
//! | [`MemoryProvider`] | Process memory | Tests |
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfrag_store::LocalProvider;
//! use pdfrag_core::{IndexProvider, VectorIndex};
//!
//! let provider = LocalProvider::new("/var/lib/pdfrag/indexes");
//! provider.ensure(&spec).await?;
//!
//! let index = provider.open(&spec.name).await?;
//! index.upsert(&records).await?;
//! let matches = index.query(&query_vector, 5).await?;
//! ```

mod data;
pub mod local;
pub mod memory;
pub mod pinecone;

pub use local::{LocalIndex, LocalProvider};
pub use memory::{MemoryIndex, MemoryProvider};
pub use pinecone::{PineconeConfig, PineconeIndex, PineconeProvider};

use pdfrag_core::{IndexSpec, StoreError};

/// Checks shared by the in-process backends.
///
/// Names double as file names, so only ASCII letters, digits, `-` and `_`
/// are accepted.
pub(crate) fn validate_spec(spec: &IndexSpec) -> Result<(), StoreError> {
    let name_ok = !spec.name.is_empty()
        && spec
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !name_ok {
        return Err(StoreError::InvalidRequest(format!(
            "invalid index name '{}'",
            spec.name
        )));
    }
    if spec.dimension == 0 {
        return Err(StoreError::InvalidRequest(
            "dimension must be at least 1".to_string(),
        ));
    }
    Ok(())
}
