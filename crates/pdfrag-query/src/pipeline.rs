//! Question answering over a vector index.

use pdfrag_core::{
    AnswerOutput, ChatMessage, ChatModel, EmbedError, Error, IndexProvider, Result, StoreError,
};
use pdfrag_embed::{DimensionGuard, EmbedderPool};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::prompt::{DEFAULT_SEPARATOR, build_context, build_prompt};

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Configuration for the query pipeline.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Index to search
    pub index_name: String,
    /// Separator between retrieved chunk texts
    pub separator: String,
}

impl QueryConfig {
    /// Configuration for `index_name` with the default separator.
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// Embeds a question, retrieves the closest chunks and asks the chat model.
pub struct QueryPipeline {
    embedder: Arc<EmbedderPool>,
    provider: Arc<dyn IndexProvider>,
    chat: Arc<dyn ChatModel>,
    config: QueryConfig,
}

impl QueryPipeline {
    /// Create a new query pipeline.
    pub fn new(
        embedder: Arc<EmbedderPool>,
        provider: Arc<dyn IndexProvider>,
        chat: Arc<dyn ChatModel>,
        config: QueryConfig,
    ) -> Self {
        Self {
            embedder,
            provider,
            chat,
            config,
        }
    }

    /// Answer `question` from the `top_k` closest chunks.
    ///
    /// The completion text is returned verbatim.
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<String> {
        Ok(self.answer_with_context(question, top_k).await?.answer)
    }

    /// Answer `question` and return the retrieved matches alongside.
    ///
    /// An index with no matching records is not an error: the prompt is sent
    /// with a placeholder context.
    pub async fn answer_with_context(&self, question: &str, top_k: usize) -> Result<AnswerOutput> {
        let name = self.config.index_name.as_str();
        let model = self.embedder.model_name();

        let descriptor = self
            .provider
            .describe(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        match &descriptor.embedding_model {
            Some(stored) if stored != model => {
                return Err(Error::ModelMismatch {
                    index_model: stored.clone(),
                    embedder_model: model.to_string(),
                });
            }
            Some(_) => {}
            None => warn!(
                "Index '{}' does not record its embedding model; assuming '{}'",
                name, model
            ),
        }

        let vector = self.embedder.embed_query(question).await?;
        DimensionGuard::with_dimension(descriptor.dimension)
            .check(vector.len())
            .map_err(|e| match e {
                EmbedError::DimensionMismatch { expected, actual } => {
                    Error::DimensionMismatch { expected, actual }
                }
                other => Error::Embedding(other),
            })?;

        let index = self.provider.open(name).await?;
        let matches = index.query(&vector, top_k).await?;
        debug!("Retrieved {} chunks from '{}'", matches.len(), name);
        if matches.is_empty() {
            info!("No context found in '{}' for the question", name);
        }

        let context = build_context(&matches, &self.config.separator);
        let prompt = build_prompt(&context, question);
        let answer = self.chat.complete(&[ChatMessage::user(prompt)]).await?;

        Ok(AnswerOutput {
            question: question.to_string(),
            answer,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::NO_CONTEXT;
    use async_trait::async_trait;
    use pdfrag_core::{
        ChatRole, ChunkPayload, CompletionError, DistanceMetric, Embedder, IndexRecord,
        IndexSpec,
    };
    use pdfrag_embed::HashEmbedder;
    use pdfrag_store::MemoryProvider;
    use tokio::sync::Mutex;

    /// Records every prompt and answers with a fixed reply.
    struct RecordingChat {
        reply: String,
        prompts: Mutex<Vec<ChatMessage>>,
    }

    impl RecordingChat {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
        ) -> std::result::Result<String, CompletionError> {
            self.prompts.lock().await.extend_from_slice(messages);
            if self.reply.is_empty() {
                return Err(CompletionError::EmptyResponse);
            }
            Ok(self.reply.clone())
        }
    }

    struct Setup {
        provider: Arc<MemoryProvider>,
        embedder: Arc<HashEmbedder>,
        chat: Arc<RecordingChat>,
    }

    async fn setup(texts: &[&str], model_tag: Option<&str>) -> Setup {
        let embedder = Arc::new(HashEmbedder::with_dimension(64));
        let provider = Arc::new(MemoryProvider::new());
        provider
            .create(&IndexSpec {
                name: "docs".to_string(),
                dimension: 64,
                metric: DistanceMetric::Cosine,
                embedding_model: model_tag.map(str::to_string),
            })
            .await
            .unwrap();

        let index = provider.open("docs").await.unwrap();
        let mut records = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            records.push(IndexRecord {
                id: format!("chunk-{i}"),
                vector: embedder.embed(text).await.unwrap(),
                payload: ChunkPayload::from_text(*text),
            });
        }
        index.upsert(&records).await.unwrap();

        Setup {
            provider,
            embedder,
            chat: Arc::new(RecordingChat::new("It is about ownership.")),
        }
    }

    fn pipeline(setup: &Setup) -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(EmbedderPool::new(setup.embedder.clone(), 1)),
            setup.provider.clone(),
            setup.chat.clone(),
            QueryConfig::new("docs"),
        )
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context() {
        let setup = setup(
            &[
                "rust ownership rules borrow checker",
                "baking bread needs flour and yeast",
            ],
            Some("blake3-hash-64"),
        )
        .await;

        let output = pipeline(&setup)
            .answer_with_context("what are the rust ownership rules", 1)
            .await
            .unwrap();

        assert_eq!(output.answer, "It is about ownership.");
        assert_eq!(output.matches.len(), 1);
        assert_eq!(output.matches[0].id, "chunk-0");

        let prompts = setup.chat.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].role, ChatRole::User);
        assert!(prompts[0]
            .content
            .contains("Context:\nrust ownership rules borrow checker\n\n"));
        assert!(prompts[0]
            .content
            .ends_with("Question: what are the rust ownership rules\n\nAnswer:"));
    }

    #[tokio::test]
    async fn test_empty_index_still_answers() {
        let setup = setup(&[], Some("blake3-hash-64")).await;

        let output = pipeline(&setup)
            .answer_with_context("anything at all", 5)
            .await
            .unwrap();

        assert!(output.matches.is_empty());
        assert!(!output.answer.is_empty());
        let prompts = setup.chat.prompts.lock().await;
        assert!(prompts[0].content.contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn test_top_k_larger_than_index() {
        let setup = setup(&["first chunk", "second chunk"], Some("blake3-hash-64")).await;

        let output = pipeline(&setup)
            .answer_with_context("chunk", DEFAULT_TOP_K)
            .await
            .unwrap();

        assert_eq!(output.matches.len(), 2);
    }

    #[tokio::test]
    async fn test_model_mismatch() {
        let setup = setup(&["text"], Some("embeddinggemma")).await;

        let result = pipeline(&setup).answer("question", 5).await;

        assert!(matches!(result, Err(Error::ModelMismatch { .. })));
        assert!(setup.chat.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_model_tag_is_allowed() {
        let setup = setup(&["text"], None).await;
        assert!(pipeline(&setup).answer("question", 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_index() {
        let setup = setup(&[], None).await;
        let pipeline = QueryPipeline::new(
            Arc::new(EmbedderPool::new(setup.embedder.clone(), 1)),
            setup.provider.clone(),
            setup.chat.clone(),
            QueryConfig::new("other"),
        );

        let result = pipeline.answer("question", 5).await;

        assert!(matches!(result, Err(Error::Store(StoreError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_with_index() {
        let setup = setup(&[], None).await;
        let pipeline = QueryPipeline::new(
            Arc::new(EmbedderPool::new(Arc::new(HashEmbedder::with_dimension(8)), 1)),
            setup.provider.clone(),
            setup.chat.clone(),
            QueryConfig::new("docs"),
        );

        let result = pipeline.answer("question", 5).await;

        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 64,
                actual: 8
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_completion_is_error() {
        let mut setup = setup(&["text"], None).await;
        setup.chat = Arc::new(RecordingChat::new(""));

        let result = pipeline(&setup).answer("question", 5).await;

        assert!(matches!(
            result,
            Err(Error::Completion(CompletionError::EmptyResponse))
        ));
    }
}
