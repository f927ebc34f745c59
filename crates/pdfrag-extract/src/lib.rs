//! # pdfrag-extract
//!
//! Document loaders that turn source files into [`Document`](pdfrag_core::Document)s
//! for chunking.
//!
//! | Loader | Formats | Output |
//! |--------|---------|--------|
//! | [`PdfLoader`] | `.pdf` | One document per page (lopdf), whole-document fallback (pdf-extract) |
//! | [`TextLoader`] | `.txt`, `.md`, `.rst` | One document |
//!
//! [`LoaderRegistry`] routes a path to the first loader that accepts it.
//!
//! ```rust,ignore
//! use pdfrag_extract::LoaderRegistry;
//! use std::path::Path;
//!
//! let registry = LoaderRegistry::with_defaults();
//! let pages = registry.load(Path::new("document.pdf")).await?;
//! println!("Loaded {} pages", pages.len());
//! ```

pub mod pdf;
pub mod registry;
pub mod text;

pub use pdf::PdfLoader;
pub use registry::LoaderRegistry;
pub use text::TextLoader;
