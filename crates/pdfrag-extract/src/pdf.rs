//! PDF document loader.
//!
//! Uses lopdf to extract text page by page and falls back to pdf-extract for
//! whole-document text when lopdf finds none.

use async_trait::async_trait;
use lopdf::{Document as PdfDocument, Object};
use pdfrag_core::{Document, DocumentLoader, DocumentMetadata, LoadError};
use std::path::Path;
use tracing::{debug, info, warn};

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Loader for PDF files. Produces one [`Document`] per page.
pub struct PdfLoader;

impl PdfLoader {
    /// Create a new PDF loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Text and metadata pulled out of a PDF on the blocking pool.
struct ExtractedPdf {
    /// `(page number, text)`; page is `None` when only whole-document text is available
    pages: Vec<(Option<u32>, String)>,
    page_count: u32,
    title: Option<String>,
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    fn name(&self) -> &str {
        "pdf"
    }

    fn can_load(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }

    fn can_load_content(&self, header: &[u8]) -> bool {
        header.starts_with(PDF_MAGIC)
    }

    async fn load(&self, path: &Path) -> Result<Vec<Document>, LoadError> {
        debug!("Loading PDF: {:?}", path);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LoadError::FileAccess {
                path: path.display().to_string(),
                source,
            })?;

        if !bytes.starts_with(PDF_MAGIC) {
            return Err(LoadError::InvalidDocument {
                path: path.display().to_string(),
                reason: "missing %PDF- header".to_string(),
            });
        }

        let source = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        // lopdf and pdf-extract are blocking
        let extracted = match tokio::task::spawn_blocking(move || extract_pdf(&bytes)).await {
            Ok(result) => result,
            // pdf-extract panics on some malformed input
            Err(e) if e.is_panic() => Err("parser panicked".to_string()),
            Err(e) => return Err(LoadError::Failed(format!("Task join error: {e}"))),
        }
        .map_err(|reason| LoadError::InvalidDocument {
            path: path.display().to_string(),
            reason,
        })?;

        let metadata = DocumentMetadata {
            title: extracted.title,
            page_count: Some(extracted.page_count),
        };

        let documents: Vec<Document> = extracted
            .pages
            .into_iter()
            .map(|(page, text)| Document {
                text,
                source: source.clone(),
                page,
                metadata: metadata.clone(),
            })
            .collect();

        info!(
            "Loaded {} page(s) from {}",
            documents.len(),
            path.display()
        );
        Ok(documents)
    }
}

/// Extract per-page text, falling back to whole-document extraction.
fn extract_pdf(bytes: &[u8]) -> Result<ExtractedPdf, String> {
    let doc = PdfDocument::load_mem(bytes).map_err(|e| format!("failed to parse PDF: {e}"))?;
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err("document has no pages".to_string());
    }
    let page_count = page_numbers.len() as u32;
    let title = document_title(&doc);

    let mut pages = Vec::with_capacity(page_numbers.len());
    for number in &page_numbers {
        match doc.extract_text(&[*number]) {
            Ok(text) => pages.push((Some(*number), text)),
            Err(e) => {
                debug!("Failed to extract text from page {}: {}", number, e);
                pages.push((Some(*number), String::new()));
            }
        }
    }

    if pages.iter().any(|(_, text)| !text.trim().is_empty()) {
        return Ok(ExtractedPdf {
            pages,
            page_count,
            title,
        });
    }

    warn!("No per-page text found, falling back to whole-document extraction");
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| format!("text extraction failed: {e}"))?;

    Ok(ExtractedPdf {
        pages: split_pages(&text, page_count),
        page_count,
        title,
    })
}

/// Split whole-document text on form feeds when they line up with the page count.
fn split_pages(text: &str, page_count: u32) -> Vec<(Option<u32>, String)> {
    let parts: Vec<&str> = text.split('\x0C').collect();
    if parts.len() > 1 && parts.len() == page_count as usize {
        parts
            .into_iter()
            .zip(1u32..)
            .map(|(part, page)| (Some(page), part.to_string()))
            .collect()
    } else {
        vec![(None, text.to_string())]
    }
}

/// Title from the document information dictionary.
fn document_title(doc: &PdfDocument) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let title = info.get(b"Title").ok()?.as_str().ok()?;
    let title = String::from_utf8_lossy(title).trim().to_string();
    (!title.is_empty()).then_some(title)
}
