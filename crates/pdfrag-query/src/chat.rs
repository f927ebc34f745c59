//! Ollama chat client.

use async_trait::async_trait;
use pdfrag_core::{ChatMessage, ChatModel, CompletionError, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default chat model served by Ollama.
pub const DEFAULT_CHAT_MODEL: &str = "gemma3:4b";

/// Chat model backed by an Ollama server's `/api/chat` endpoint.
#[derive(Clone)]
pub struct OllamaChat {
    client: Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaChat {
    /// Build a client for the server at `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, CompletionError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(CompletionError::Request(
                "missing chat model name".to_string(),
            ));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| CompletionError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
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

    async fn request(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            CompletionError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        parse_content(parsed)
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        debug!("Sending {} messages to {}", messages.len(), self.model);
        self.retry
            .run("ollama chat", || self.request(messages))
            .await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

fn parse_content(response: ChatResponse) -> Result<String, CompletionError> {
    let message = response.message.ok_or_else(|| {
        CompletionError::InvalidResponse("response has no message".to_string())
    })?;
    if message.content.is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint() {
        let chat = OllamaChat::new("http://localhost:11434/", DEFAULT_CHAT_MODEL).unwrap();
        assert_eq!(chat.endpoint(), "http://localhost:11434/api/chat");
        assert_eq!(chat.model_name(), "gemma3:4b");
    }

    #[test]
    fn test_request_serialization() {
        let messages = [ChatMessage::user("hello")];
        let request = ChatRequest {
            model: "gemma3:4b",
            messages: &messages,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_parse_content_verbatim() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"model":"gemma3:4b","message":{"role":"assistant","content":"  The answer.\n"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(parse_content(response).unwrap(), "  The answer.\n");
    }

    #[test]
    fn test_parse_empty_content() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":""}}"#).unwrap();
        assert!(matches!(
            parse_content(response),
            Err(CompletionError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_whitespace_content_verbatim() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"\n "}}"#).unwrap();
        assert_eq!(parse_content(response).unwrap(), "\n ");
    }

    #[test]
    fn test_parse_missing_message() {
        let response: ChatResponse = serde_json::from_str(r#"{"error":"oops"}"#).unwrap();
        assert!(matches!(
            parse_content(response),
            Err(CompletionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let chat = OllamaChat::new("http://127.0.0.1:9", DEFAULT_CHAT_MODEL)
            .unwrap()
            .with_retry(RetryPolicy::no_retry(Duration::from_secs(5)));

        let err = chat.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
