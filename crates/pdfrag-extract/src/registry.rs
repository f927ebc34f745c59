//! Loader registry for routing files to document loaders.

use pdfrag_core::{Document, DocumentLoader, LoadError};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::{PdfLoader, TextLoader};

/// Registry of document loaders, consulted in registration order.
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { loaders: vec![] }
    }

    /// Registry with the PDF loader first and the text loader as fallback.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfLoader::new());
        registry.register(TextLoader::new());
        registry
    }

    /// Register a loader.
    pub fn register<L: DocumentLoader + 'static>(&mut self, loader: L) {
        self.loaders.push(Arc::new(loader));
    }

    /// Get the first loader that accepts the file.
    #[must_use]
    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn DocumentLoader>> {
        self.loaders
            .iter()
            .find(|loader| loader.can_load(path))
            .cloned()
    }

    /// Get the first loader that recognises the file's leading bytes.
    pub async fn get_for_content(
        &self,
        path: &Path,
    ) -> Result<Option<Arc<dyn DocumentLoader>>, LoadError> {
        let header = read_header(path).await?;
        Ok(self
            .loaders
            .iter()
            .find(|loader| loader.can_load_content(&header))
            .cloned())
    }

    /// Load a file with the matching loader.
    ///
    /// Loaders are matched by path first, then by file content.
    pub async fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        let loader = match self.get_for_file(path) {
            Some(loader) => loader,
            None => self.get_for_content(path).await?.ok_or_else(|| {
                LoadError::UnsupportedType(
                    path.extension()
                        .and_then(|ext| ext.to_str())
                        .map_or_else(|| path.display().to_string(), |ext| format!(".{ext}")),
                )
            })?,
        };

        debug!("Loading {:?} with '{}' loader", path, loader.name());
        loader.load(path).await
    }
}

/// Read up to the first 8 bytes of a file.
async fn read_header(path: &Path) -> Result<Vec<u8>, LoadError> {
    let file_access = |source: std::io::Error| LoadError::FileAccess {
        path: path.display().to_string(),
        source,
    };
    let file = tokio::fs::File::open(path).await.map_err(file_access)?;
    let mut header = Vec::with_capacity(8);
    file.take(8)
        .read_to_end(&mut header)
        .await
        .map_err(file_access)?;
    Ok(header)
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::write_pdf;
    use tempfile::tempdir;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = LoaderRegistry::new();
        assert!(registry.get_for_file(Path::new("a.txt")).is_none());
    }

    #[test]
    fn test_routes_by_extension() {
        let registry = LoaderRegistry::with_defaults();

        let pdf = registry.get_for_file(Path::new("doc.pdf")).unwrap();
        assert_eq!(pdf.name(), "pdf");

        let text = registry.get_for_file(Path::new("notes.md")).unwrap();
        assert_eq!(text.name(), "text");
    }

    #[tokio::test]
    async fn test_load_pdf() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("doc.pdf");
        write_pdf(&path, &["Hello registry"], None);

        let documents = LoaderRegistry::default().load(&path).await.unwrap();

        assert_eq!(documents.len(), 1);
        assert!(documents[0].text.contains("Hello"));
    }

    #[tokio::test]
    async fn test_load_text() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "Hello, world!").unwrap();

        let documents = LoaderRegistry::default().load(&path).await.unwrap();

        assert_eq!(documents[0].text, "Hello, world!");
    }

    #[tokio::test]
    async fn test_load_pdf_without_extension() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("download.bin");
        write_pdf(&path, &["Hello sniffing"], None);

        let documents = LoaderRegistry::default().load(&path).await.unwrap();

        assert_eq!(documents.len(), 1);
        assert!(documents[0].text.contains("Hello"));
    }

    #[tokio::test]
    async fn test_load_unsupported_type() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let err = LoaderRegistry::default().load(&path).await.unwrap_err();

        match err {
            LoadError::UnsupportedType(ext) => assert_eq!(ext, ".bin"),
            other => panic!("Expected UnsupportedType error, got {other:?}"),
        }
    }
}
