//! Ollama embedding client.

use async_trait::async_trait;
use pdfrag_core::{EmbedError, Embedder, EmbeddingVector, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default embedding model served by Ollama.
pub const DEFAULT_EMBEDDING_MODEL: &str = "embeddinggemma";

/// Embedder backed by an Ollama server's `/api/embed` endpoint.
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    /// Build a client for the server at `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, EmbedError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(EmbedError::Request("missing embedding model name".to_string()));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| EmbedError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the timeout and retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One request without retries.
    async fn request(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::InvalidResponse(format!("failed to parse response: {e}")))?;
        parse_embeddings(parsed, texts.len())
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts with {}", texts.len(), self.model);
        self.retry
            .run("ollama embed", || self.request(texts))
            .await
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingVector>,
}

/// Validate that the response holds one non-empty vector per input.
fn parse_embeddings(
    response: EmbedResponse,
    expected: usize,
) -> Result<Vec<EmbeddingVector>, EmbedError> {
    if response.embeddings.len() != expected {
        return Err(EmbedError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected,
            response.embeddings.len()
        )));
    }
    if response.embeddings.iter().any(Vec::is_empty) {
        return Err(EmbedError::InvalidResponse(
            "response contains an empty embedding".to_string(),
        ));
    }
    Ok(response.embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let embedder = OllamaEmbedder::new("http://localhost:11434/", "embeddinggemma").unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:11434/api/embed");
        assert_eq!(embedder.model_name(), "embeddinggemma");
    }

    #[test]
    fn test_rejects_empty_model() {
        assert!(OllamaEmbedder::new("http://localhost:11434", "  ").is_err());
    }

    #[test]
    fn test_request_serialization() {
        let inputs = ["first", "second"];
        let request = EmbedRequest {
            model: "embeddinggemma",
            input: &inputs,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "embeddinggemma");
        assert_eq!(json["input"][1], "second");
    }

    #[test]
    fn test_parse_embeddings() {
        let response: EmbedResponse = serde_json::from_str(
            r#"{"model":"embeddinggemma","embeddings":[[0.1,0.2],[0.3,0.4]]}"#,
        )
        .unwrap();
        let vectors = parse_embeddings(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn test_parse_embeddings_count_mismatch() {
        let response: EmbedResponse =
            serde_json::from_str(r#"{"embeddings":[[0.1,0.2]]}"#).unwrap();
        let err = parse_embeddings(response, 2).unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_embeddings_missing_field() {
        let response: EmbedResponse = serde_json::from_str(r#"{"error":"model not found"}"#).unwrap();
        assert!(parse_embeddings(response, 1).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_request_error() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "embeddinggemma")
            .unwrap()
            .with_retry(RetryPolicy::no_retry(Duration::from_secs(5)));

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "embeddinggemma").unwrap();
        assert!(embedder.embed_many(&[]).await.unwrap().is_empty());
    }
}
