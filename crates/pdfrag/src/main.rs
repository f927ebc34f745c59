//! # pdfrag CLI
//!
//! Ask questions about a PDF with retrieval-augmented generation.
//!
//! ## Commands
//!
//! - `pdfrag ingest [PDF]` - Chunk, embed and index a document
//! - `pdfrag query <QUESTION>` - Answer a question from the indexed document
//! - `pdfrag status` - Show index statistics
//! - `pdfrag config show|init|path` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! # Index a PDF into Pinecone
//! PINECONE_API_KEY=... INDEX_NAME=papers pdfrag ingest paper.pdf
//!
//! # Ask a question
//! pdfrag query "Summarize the main findings of the PDF."
//!
//! # Get JSON output with the retrieved context
//! pdfrag --format json query "What dataset was used?" --top-k 3
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfrag_chunker::RecursiveChunker;
use pdfrag_core::{ChatModel, Embedder, IndexProvider};
use pdfrag_embed::{EmbedderPool, HashEmbedder, OllamaEmbedder};
use pdfrag_extract::LoaderRegistry;
use pdfrag_index::{IngestConfig, IngestUpdate, IngestionPipeline};
use pdfrag_query::{OllamaChat, QueryConfig, QueryPipeline};
use pdfrag_store::{LocalProvider, PineconeConfig, PineconeProvider};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::{Config, EmbedBackend, IndexBackend};

#[derive(Parser)]
#[command(name = "pdfrag")]
#[command(about = "Ask questions about a PDF with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/pdfrag/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a document
    Ingest {
        /// Document to ingest (default: PDF_PATH or source.pdf_path)
        pdf: Option<PathBuf>,
    },

    /// Answer a question from the indexed document
    Query {
        /// Question to answer
        question: String,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the retrieved chunks after the answer
        #[arg(long)]
        show_context: bool,
    },

    /// Show index status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    index: String,
    backend: &'static str,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

fn backend_name(backend: IndexBackend) -> &'static str {
    match backend {
        IndexBackend::Pinecone => "pinecone",
        IndexBackend::Local | IndexBackend::Auto => "local",
    }
}

/// Create the index provider selected by the configuration.
fn create_provider(config: &Config) -> Result<Arc<dyn IndexProvider>> {
    match config.index_backend() {
        IndexBackend::Pinecone => {
            let api_key = config
                .pinecone
                .api_key
                .clone()
                .context("Pinecone API key is not set")?;
            let mut settings =
                PineconeConfig::new(api_key, &config.pinecone.cloud, &config.pinecone.region);
            settings.retry = config.retry.policy();
            let provider =
                PineconeProvider::new(settings).context("Failed to create Pinecone client")?;
            Ok(Arc::new(provider))
        }
        IndexBackend::Local | IndexBackend::Auto => {
            let dir = config
                .data_dir()
                .context("Failed to get data directory")?;
            info!("Using local indexes in {}", dir.display());
            Ok(Arc::new(LocalProvider::new(dir)))
        }
    }
}

/// Create the embedder pool selected by the configuration.
fn create_embedder(config: &Config) -> Result<Arc<EmbedderPool>> {
    let embedding = &config.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.backend {
        EmbedBackend::Ollama => Arc::new(
            OllamaEmbedder::new(&config.ollama.host, &embedding.model)
                .context("Failed to create Ollama embedder")?
                .with_retry(config.retry.policy()),
        ),
        EmbedBackend::Hash => {
            warn!("Using the hash embedder; answers will only reflect word overlap");
            Arc::new(HashEmbedder::with_dimension(embedding.hash_dimension))
        }
    };

    Ok(Arc::new(
        EmbedderPool::new(embedder, embedding.max_concurrent).with_batch_size(embedding.batch_size),
    ))
}

fn create_chat(config: &Config) -> Result<Arc<dyn ChatModel>> {
    let chat = OllamaChat::new(&config.ollama.host, &config.query.chat_model)
        .context("Failed to create Ollama chat client")?
        .with_retry(config.retry.policy());
    Ok(Arc::new(chat))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().context("Failed to load config"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Ingest { pdf } => {
            config.validate().context("Invalid configuration")?;

            let path = pdf
                .or_else(|| config.source.pdf_path.clone())
                .context("No document given (pass a path or set PDF_PATH)")?;
            if !path.exists() {
                anyhow::bail!("Document does not exist: {}", path.display());
            }

            let provider = create_provider(&config)?;
            let embedder = create_embedder(&config)?;

            let pipeline = IngestionPipeline::new(
                Arc::new(LoaderRegistry::with_defaults()),
                Arc::new(RecursiveChunker::new()),
                embedder,
                provider,
                IngestConfig {
                    index_name: config.index.name.clone(),
                    metric: config.index.metric,
                    chunk_config: config.chunking.chunk_config(),
                    upsert_batch_size: config.index.upsert_batch_size,
                },
            );

            // Spawn progress reporter
            let mut updates = pipeline.subscribe();
            let progress_handle = tokio::spawn(async move {
                while let Ok(update) = updates.recv().await {
                    match update {
                        IngestUpdate::Loaded { documents, .. } => {
                            info!("Loaded {} pages with text", documents);
                        }
                        IngestUpdate::Embedded {
                            succeeded, failed, ..
                        } => {
                            info!("Embedded {} chunks ({} failed)", succeeded, failed);
                        }
                        IngestUpdate::Upserted { written, total, .. } => {
                            info!("Upserted {}/{} records", written, total);
                        }
                        IngestUpdate::Completed { .. } | IngestUpdate::Failed { .. } => break,
                        IngestUpdate::Started { .. } | IngestUpdate::Chunked { .. } => {}
                    }
                }
            });

            let result = pipeline.ingest(&path).await;
            drop(pipeline);
            let _ = progress_handle.await;
            let report = result.with_context(|| format!("Failed to ingest {}", path.display()))?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Text => {
                    println!("Ingested {}", report.source);
                    println!("  Index:      {}", report.index);
                    println!("  Pages:      {}", report.documents);
                    println!("  Chunks:     {}", report.chunks);
                    println!("  Records:    {}", report.records_written);
                    println!("  Dimension:  {}", report.dimension);
                }
            }
        }

        Commands::Query {
            question,
            top_k,
            show_context,
        } => {
            config.validate().context("Invalid configuration")?;
            let top_k = top_k.unwrap_or(config.query.top_k);
            if top_k == 0 {
                anyhow::bail!("--top-k must be at least 1");
            }

            let pipeline = QueryPipeline::new(
                create_embedder(&config)?,
                create_provider(&config)?,
                create_chat(&config)?,
                QueryConfig {
                    index_name: config.index.name.clone(),
                    separator: config.query.separator.clone(),
                },
            );

            let output = pipeline
                .answer_with_context(&question, top_k)
                .await
                .context("Query failed")?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("\n=== Final Answer ===\n");
                    println!("{}", output.answer);
                    if show_context {
                        println!("\n=== Context ===\n");
                        if output.matches.is_empty() {
                            println!("No relevant chunks found.");
                        }
                        for (i, m) in output.matches.iter().enumerate() {
                            let page = m
                                .payload
                                .page
                                .map(|p| format!(", page {p}"))
                                .unwrap_or_default();
                            println!("{}. {} (score: {:.3}{})", i + 1, m.id, m.score, page);
                            println!("   {}", truncate(&m.payload.text, 100));
                            println!();
                        }
                    }
                }
            }
        }

        Commands::Status => {
            config.validate().context("Invalid configuration")?;
            let provider = create_provider(&config)?;
            let name = config.index.name.clone();
            let backend = backend_name(config.index_backend());

            let descriptor = provider
                .describe(&name)
                .await
                .context("Failed to describe index")?;

            let Some(descriptor) = descriptor else {
                match cli.format {
                    OutputFormat::Json => {
                        let output = StatusOutput {
                            index: name,
                            backend,
                            exists: false,
                            dimension: None,
                            metric: None,
                            embedding_model: None,
                            record_count: None,
                            last_updated: None,
                        };
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    }
                    OutputFormat::Text => {
                        println!("Index '{name}' not found ({backend})");
                        println!("Run 'pdfrag ingest <PDF>' to create it.");
                    }
                }
                return Ok(());
            };

            let index = provider.open(&name).await.context("Failed to open index")?;
            let stats = index.stats().await.context("Failed to read index stats")?;

            match cli.format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        index: name,
                        backend,
                        exists: true,
                        dimension: Some(descriptor.dimension),
                        metric: Some(descriptor.metric.to_string()),
                        embedding_model: descriptor.embedding_model,
                        record_count: Some(stats.record_count),
                        last_updated: stats.last_updated.map(|t| t.to_rfc3339()),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Index Status for '{name}' ({backend})");
                    println!("  Records:   {}", stats.record_count);
                    println!("  Dimension: {}", descriptor.dimension);
                    println!("  Metric:    {}", descriptor.metric);
                    if let Some(model) = &descriptor.embedding_model {
                        println!("  Model:     {model}");
                    }
                    if let Some(last) = stats.last_updated {
                        println!("  Updated:   {}", last.format("%Y-%m-%d %H:%M:%S"));
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let shown = config.redacted();
                match cli.format {
                    OutputFormat::Json => {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&shown)
                                .context("Failed to serialize config")?
                        );
                    }
                    OutputFormat::Text => {
                        println!(
                            "{}",
                            toml::to_string_pretty(&shown).context("Failed to serialize config")?
                        );
                    }
                }
            }
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

/// Truncate a string to `max_chars` characters, adding ellipsis if needed.
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_chars {
        s
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 100), "line one line two");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_cli_parses_query() {
        let cli = Cli::parse_from(["pdfrag", "--format", "json", "query", "what?", "-k", "3"]);
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Query {
                question, top_k, ..
            } => {
                assert_eq!(question, "what?");
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_cli_ingest_path_is_optional() {
        let cli = Cli::parse_from(["pdfrag", "ingest"]);
        assert!(matches!(cli.command, Commands::Ingest { pdf: None }));
    }

    #[test]
    fn test_hash_backend_builds_offline() {
        let mut config = Config::default();
        config.embedding.backend = EmbedBackend::Hash;
        config.embedding.hash_dimension = 32;
        let pool = create_embedder(&config).unwrap();
        assert_eq!(pool.model_name(), "blake3-hash-32");
    }

    #[test]
    fn test_local_provider_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.index.data_dir = Some(dir.path().to_path_buf());
        assert!(create_provider(&config).is_ok());
    }
}
