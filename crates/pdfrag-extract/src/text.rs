//! Plain text document loader.

use async_trait::async_trait;
use pdfrag_core::{Document, DocumentLoader, DocumentMetadata, LoadError};
use std::path::Path;
use tokio::fs;

/// Extensions accepted by [`TextLoader`].
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "rst"];

/// Loader for plain text files. Produces a single [`Document`] without page numbers.
pub struct TextLoader;

impl TextLoader {
    /// Create a new text loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    fn name(&self) -> &str {
        "text"
    }

    fn can_load(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }

    async fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let bytes = fs::read(path).await.map_err(|source| LoadError::FileAccess {
            path: path.display().to_string(),
            source,
        })?;

        let text = String::from_utf8(bytes).map_err(|e| LoadError::InvalidDocument {
            path: path.display().to_string(),
            reason: format!("not valid UTF-8: {e}"),
        })?;

        let source = fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        Ok(vec![Document {
            text,
            source,
            page: None,
            metadata: DocumentMetadata {
                title: None,
                page_count: Some(1),
            },
        }])
    }
}
