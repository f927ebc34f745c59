//! Integration tests for the full pdfrag pipeline.
//!
//! Tests the complete flow: load → chunk → embed → upsert → query → answer.

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, Stream, dictionary};
use pdfrag_chunker::RecursiveChunker;
use pdfrag_core::{
    ChatMessage, ChatModel, ChunkConfig, CompletionError, DistanceMetric, EmbedError, Embedder,
    EmbeddingVector, Error, IndexProvider, IndexSpec,
};
use pdfrag_embed::{EmbedderPool, HashEmbedder};
use pdfrag_extract::LoaderRegistry;
use pdfrag_index::{IngestConfig, IngestionPipeline, record_id};
use pdfrag_query::{NO_CONTEXT, QueryConfig, QueryPipeline};
use pdfrag_store::{LocalProvider, MemoryProvider};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::Mutex;

const TEST_DIM: usize = 64;
const INDEX: &str = "test-index";

/// Mock embedder for testing (no embedding service needed).
struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        // Deterministic embeddings based on text content
        Ok(texts
            .iter()
            .map(|text| {
                let hash = blake3::hash(text.as_bytes());
                let bytes = hash.as_bytes();
                (0..self.dimension)
                    .map(|i| (f32::from(bytes[i % 32]) / 255.0) - 0.5)
                    .collect()
            })
            .collect())
    }
}

/// Chat model that records prompts and answers with a canned reply.
struct MockChat {
    prompts: Mutex<Vec<String>>,
}

impl MockChat {
    fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for MockChat {
    fn model_name(&self) -> &str {
        "mock-chat"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let mut prompts = self.prompts.lock().await;
        prompts.extend(messages.iter().map(|m| m.content.clone()));
        if messages.iter().any(|m| m.content.contains(NO_CONTEXT)) {
            Ok("The document does not say.".to_string())
        } else {
            Ok("Answer drawn from the context.".to_string())
        }
    }
}

fn ingestion(
    provider: Arc<dyn IndexProvider>,
    embedder: Arc<dyn Embedder>,
    chunk_config: ChunkConfig,
) -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::new(LoaderRegistry::with_defaults()),
        Arc::new(RecursiveChunker::new()),
        Arc::new(EmbedderPool::new(embedder, 4).with_batch_size(2)),
        provider,
        IngestConfig {
            index_name: INDEX.to_string(),
            chunk_config,
            ..Default::default()
        },
    )
}

fn querying(
    provider: Arc<dyn IndexProvider>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<MockChat>,
) -> QueryPipeline {
    QueryPipeline::new(
        Arc::new(EmbedderPool::new(embedder, 1)),
        provider,
        chat,
        QueryConfig::new(INDEX),
    )
}

/// 3000 characters without whitespace, so chunk boundaries fall exactly on
/// the size limit.
fn unbroken_text() -> String {
    (0..3000u32)
        .map(|i| char::from(b'a' + ((i * 7 + i / 100) % 26) as u8))
        .collect()
}

/// Write a PDF with one text line per page.
fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[tokio::test]
async fn test_three_chunk_document_retrieves_middle_chunk() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("document.txt");
    let text = unbroken_text();
    std::fs::write(&path, &text).unwrap();

    let provider: Arc<dyn IndexProvider> = Arc::new(MemoryProvider::new());
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(TEST_DIM));

    let report = ingestion(provider.clone(), embedder.clone(), ChunkConfig::new(1200, 150))
        .ingest(&path)
        .await
        .unwrap();
    assert_eq!(report.chunks, 3);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.dimension, TEST_DIM);

    // Chunk 2 covers characters 1050..2250
    let chunk_two: String = text.chars().skip(1050).take(1200).collect();
    let vector = embedder.embed(&chunk_two).await.unwrap();

    let index = provider.open(INDEX).await.unwrap();
    let matches = index.query(&vector, 3).await.unwrap();

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].id, record_id(&report.source, None, &(1050..2250)));
    assert_eq!(matches[0].payload.text, chunk_two);
    assert_eq!(matches[0].payload.chunk_index, 1);
    assert!((matches[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_empty_index_still_answers() {
    let provider = Arc::new(MemoryProvider::new());
    provider
        .create(&IndexSpec {
            name: INDEX.to_string(),
            dimension: TEST_DIM,
            metric: DistanceMetric::Cosine,
            embedding_model: Some("mock-embedder".to_string()),
        })
        .await
        .unwrap();
    let chat = Arc::new(MockChat::new());

    let output = querying(provider, Arc::new(MockEmbedder::new(TEST_DIM)), chat.clone())
        .answer_with_context("What are the main findings?", 5)
        .await
        .unwrap();

    assert!(output.matches.is_empty());
    assert!(!output.answer.is_empty());
    let prompts = chat.prompts.lock().await;
    assert!(prompts[0].contains(NO_CONTEXT));
    assert!(prompts[0].contains("Question: What are the main findings?"));
}

#[tokio::test]
async fn test_top_k_exceeding_record_count() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("short.txt");
    std::fs::write(&path, "First paragraph about rust.\n\nSecond paragraph about bread.").unwrap();

    let provider: Arc<dyn IndexProvider> = Arc::new(MemoryProvider::new());
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(TEST_DIM));
    let report = ingestion(provider.clone(), embedder.clone(), ChunkConfig::new(30, 0))
        .ingest(&path)
        .await
        .unwrap();
    assert_eq!(report.records_written, 2);

    let output = querying(provider, embedder, Arc::new(MockChat::new()))
        .answer_with_context("rust", 5)
        .await
        .unwrap();

    assert_eq!(output.matches.len(), 2);
    assert!(output.matches[0].score >= output.matches[1].score);
}

#[tokio::test]
async fn test_reingestion_is_idempotent_in_memory() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("document.txt");
    std::fs::write(&path, unbroken_text()).unwrap();

    let provider: Arc<dyn IndexProvider> = Arc::new(MemoryProvider::new());
    let pipeline = ingestion(
        provider.clone(),
        Arc::new(MockEmbedder::new(TEST_DIM)),
        ChunkConfig::default(),
    );

    let first = pipeline.ingest(&path).await.unwrap();
    let second = pipeline.ingest(&path).await.unwrap();

    let stats = provider.open(INDEX).await.unwrap().stats().await.unwrap();
    assert_eq!(first.records_written, second.records_written);
    assert_eq!(stats.record_count, first.records_written as u64);
}

#[tokio::test]
async fn test_reingestion_is_idempotent_on_disk() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("document.txt");
    std::fs::write(&path, unbroken_text()).unwrap();
    let data_dir = temp_dir.path().join("indexes");

    let first = ingestion(
        Arc::new(LocalProvider::new(&data_dir)),
        Arc::new(MockEmbedder::new(TEST_DIM)),
        ChunkConfig::default(),
    )
    .ingest(&path)
    .await
    .unwrap();

    // A fresh provider reads the index back from disk
    let provider: Arc<dyn IndexProvider> = Arc::new(LocalProvider::new(&data_dir));
    ingestion(
        provider.clone(),
        Arc::new(MockEmbedder::new(TEST_DIM)),
        ChunkConfig::default(),
    )
    .ingest(&path)
    .await
    .unwrap();

    let stats = provider.open(INDEX).await.unwrap().stats().await.unwrap();
    assert_eq!(stats.record_count, first.records_written as u64);
}

#[tokio::test]
async fn test_dimension_mismatch_with_existing_index() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("document.txt");
    std::fs::write(&path, unbroken_text()).unwrap();
    let provider: Arc<dyn IndexProvider> = Arc::new(MemoryProvider::new());

    let first = ingestion(
        provider.clone(),
        Arc::new(MockEmbedder::new(TEST_DIM)),
        ChunkConfig::default(),
    )
    .ingest(&path)
    .await
    .unwrap();

    let result = ingestion(
        provider.clone(),
        Arc::new(MockEmbedder::new(TEST_DIM * 2)),
        ChunkConfig::default(),
    )
    .ingest(&path)
    .await;

    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: TEST_DIM,
            actual
        }) if actual == TEST_DIM * 2
    ));
    let stats = provider.open(INDEX).await.unwrap().stats().await.unwrap();
    assert_eq!(stats.record_count, first.records_written as u64);
}

#[tokio::test]
async fn test_query_with_other_embedder_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("document.txt");
    std::fs::write(&path, unbroken_text()).unwrap();
    let provider: Arc<dyn IndexProvider> = Arc::new(MemoryProvider::new());

    ingestion(
        provider.clone(),
        Arc::new(MockEmbedder::new(TEST_DIM)),
        ChunkConfig::default(),
    )
    .ingest(&path)
    .await
    .unwrap();

    let result = querying(
        provider,
        Arc::new(HashEmbedder::with_dimension(TEST_DIM)),
        Arc::new(MockChat::new()),
    )
    .answer("anything", 5)
    .await;

    assert!(matches!(result, Err(Error::ModelMismatch { .. })));
}

#[tokio::test]
async fn test_pdf_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("paper.pdf");
    write_pdf(
        &path,
        &[
            "Ownership rules in Rust prevent data races at compile time.",
            "",
            "Sourdough bread needs flour water salt and a starter.",
        ],
    );

    let provider: Arc<dyn IndexProvider> = Arc::new(MemoryProvider::new());
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::with_dimension(1024));

    let report = ingestion(provider.clone(), embedder.clone(), ChunkConfig::default())
        .ingest(&path)
        .await
        .unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.records_written, 2);

    let chat = Arc::new(MockChat::new());
    let output = querying(provider, embedder, chat.clone())
        .answer_with_context("How should I make sourdough bread?", 1)
        .await
        .unwrap();

    assert_eq!(output.answer, "Answer drawn from the context.");
    assert_eq!(output.matches.len(), 1);
    assert_eq!(output.matches[0].payload.page, Some(3));
    assert!(output.matches[0].payload.text.contains("Sourdough"));

    let prompts = chat.prompts.lock().await;
    assert!(prompts[0].contains("Sourdough bread needs flour"));
}
