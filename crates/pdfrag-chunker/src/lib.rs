//! Text chunking for pdfrag.

pub mod recursive;

pub use recursive::RecursiveChunker;
