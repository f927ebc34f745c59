//! Question answering for pdfrag.
//!
//! [`QueryPipeline`] embeds a question, retrieves the closest chunks from a
//! vector index, and asks a [`pdfrag_core::ChatModel`] to answer from them.
//! [`OllamaChat`] is the chat backend.

pub mod chat;
pub mod pipeline;
pub mod prompt;

pub use chat::{DEFAULT_CHAT_MODEL, OllamaChat};
pub use pipeline::{DEFAULT_TOP_K, QueryConfig, QueryPipeline};
pub use prompt::{DEFAULT_SEPARATOR, NO_CONTEXT, build_context, build_prompt};
