//! Prompt construction.

use pdfrag_core::QueryMatch;

/// Context placed in the prompt when retrieval found nothing.
pub const NO_CONTEXT: &str = "(no relevant context found)";

/// Default separator between retrieved chunk texts.
pub const DEFAULT_SEPARATOR: &str = " ";

/// Join the payload texts of `matches` in retrieval order.
///
/// Returns [`NO_CONTEXT`] when there are no matches.
#[must_use]
pub fn build_context(matches: &[QueryMatch], separator: &str) -> String {
    if matches.is_empty() {
        return NO_CONTEXT.to_string();
    }
    matches
        .iter()
        .map(|m| m.payload.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Prompt asking the model to answer `question` from `context`.
#[must_use]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the following question based on the context:\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}
