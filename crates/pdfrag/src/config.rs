//! Configuration handling for pdfrag.
//!
//! Settings come from `<config_dir>/config.toml` (or `--config`), then the
//! environment variables listed in [`Config::apply_env`] override them.

use directories::ProjectDirs;
use pdfrag_core::{ChunkConfig, DistanceMetric, Error, RetryPolicy};
use pdfrag_embed::{DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL, DEFAULT_HASH_DIMENSION};
use pdfrag_index::{DEFAULT_INDEX_NAME, DEFAULT_UPSERT_BATCH_SIZE};
use pdfrag_query::{DEFAULT_CHAT_MODEL, DEFAULT_SEPARATOR, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Source document
    #[serde(default)]
    pub source: SourceConfig,

    /// Vector index
    #[serde(default)]
    pub index: IndexConfig,

    /// Pinecone account settings
    #[serde(default)]
    pub pinecone: PineconeSettings,

    /// Ollama server
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Timeouts and retries for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source document configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    /// PDF ingested when `pdfrag ingest` is given no path
    pub pdf_path: Option<PathBuf>,
}

/// Where vectors are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Pinecone when an API key is configured, local otherwise
    #[default]
    Auto,
    Pinecone,
    Local,
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name
    #[serde(default = "default_index_name")]
    pub name: String,

    /// Backend
    #[serde(default)]
    pub backend: IndexBackend,

    /// Metric used when creating the index
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Directory of the local backend (default: platform data dir)
    pub data_dir: Option<PathBuf>,

    /// Records per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_upsert_batch_size() -> usize {
    DEFAULT_UPSERT_BATCH_SIZE
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            backend: IndexBackend::default(),
            metric: DistanceMetric::default(),
            data_dir: None,
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

/// Pinecone account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeSettings {
    /// API key
    pub api_key: Option<String>,

    /// Serverless cloud
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Serverless region
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for PineconeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            cloud: default_cloud(),
            region: default_region(),
        }
    }
}

/// Ollama server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL
    #[serde(default = "default_ollama_host")]
    pub host: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedBackend {
    #[default]
    Ollama,
    /// Offline feature hashing
    Hash,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend
    #[serde(default)]
    pub backend: EmbedBackend,

    /// Ollama embedding model
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max concurrent embedding requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Dimension of the hash backend
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_concurrent() -> usize {
    4
}

fn default_hash_dimension() -> usize {
    DEFAULT_HASH_DIMENSION
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbedBackend::default(),
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            max_concurrent: default_max_concurrent(),
            hash_dimension: default_hash_dimension(),
        }
    }
}

/// Chunking configuration, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    ChunkConfig::default().chunk_size
}

fn default_overlap() -> usize {
    ChunkConfig::default().overlap
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(self.chunk_size, self.overlap)
    }
}

/// Query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Separator between retrieved chunk texts
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Ollama chat model
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            separator: default_separator(),
            chat_model: default_chat_model(),
        }
    }
}

/// Timeout and retry settings shared by all remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// First backoff delay (ms)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Longest backoff delay (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Timeout of each attempt (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> usize {
    4
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    16_000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply the environment.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(None)
    }

    /// Load from `path` (or the default location), then apply the environment.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file given explicitly is an error.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => Self::read(&path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&contents)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Parse TOML contents.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    ///
    /// `PDF_PATH`, `INDEX_NAME`, `PINECONE_API_KEY`, `PINECONE_ENV` (region),
    /// `PINECONE_CLOUD`, `OLLAMA_HOST` and `PDFRAG_DATA_DIR` are recognised.
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = get("PDF_PATH") {
            self.source.pdf_path = Some(PathBuf::from(path));
        }
        if let Some(name) = get("INDEX_NAME") {
            self.index.name = name;
        }
        if let Some(key) = get("PINECONE_API_KEY") {
            self.pinecone.api_key = Some(key);
        }
        if let Some(region) = get("PINECONE_ENV") {
            self.pinecone.region = region;
        }
        if let Some(cloud) = get("PINECONE_CLOUD") {
            self.pinecone.cloud = cloud;
        }
        if let Some(host) = get("OLLAMA_HOST") {
            self.ollama.host = normalize_host(&host);
        }
        if let Some(dir) = get("PDFRAG_DATA_DIR") {
            self.index.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Backend actually used for the index.
    pub fn index_backend(&self) -> IndexBackend {
        match self.index.backend {
            IndexBackend::Auto if self.pinecone.api_key.is_some() => IndexBackend::Pinecone,
            IndexBackend::Auto => IndexBackend::Local,
            backend => backend,
        }
    }

    /// Directory of the local index backend.
    pub fn data_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.index.data_dir {
            return Some(dir.clone());
        }
        ProjectDirs::from("", "", "pdfrag").map(|dirs| dirs.data_dir().join("indexes"))
    }

    /// Check the settings needed before any external call.
    pub fn validate(&self) -> Result<(), Error> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if chunking.overlap >= chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunking.overlap, chunking.chunk_size
            )));
        }
        if self.index.name.trim().is_empty() {
            return Err(Error::Config(
                "index name is empty (set index.name or INDEX_NAME)".to_string(),
            ));
        }
        if self.index.upsert_batch_size == 0 {
            return Err(Error::Config("index.upsert_batch_size must be positive".to_string()));
        }
        if self.embedding.batch_size == 0 || self.embedding.max_concurrent == 0 {
            return Err(Error::Config(
                "embedding.batch_size and embedding.max_concurrent must be positive".to_string(),
            ));
        }
        if self.embedding.backend == EmbedBackend::Hash && self.embedding.hash_dimension == 0 {
            return Err(Error::Config("embedding.hash_dimension must be positive".to_string()));
        }
        if self.query.top_k == 0 {
            return Err(Error::Config("query.top_k must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 || self.retry.timeout_secs == 0 {
            return Err(Error::Config(
                "retry.max_attempts and retry.timeout_secs must be positive".to_string(),
            ));
        }
        if self.index_backend() == IndexBackend::Pinecone && self.pinecone.api_key.is_none() {
            return Err(Error::Config(
                "the pinecone backend needs an API key (set PINECONE_API_KEY)".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy safe to print, with secrets masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.pinecone.api_key.is_some() {
            config.pinecone.api_key = Some("********".to_string());
        }
        config
    }

    /// Path of the default config file.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Sample configuration file with every setting at its default.
    pub fn sample_toml() -> String {
        format!(
            r#"# pdfrag configuration
# Environment variables override these values:
#   PDF_PATH, INDEX_NAME, PINECONE_API_KEY, PINECONE_ENV, PINECONE_CLOUD,
#   OLLAMA_HOST, PDFRAG_DATA_DIR

[source]
# pdf_path = "/path/to/document.pdf"

[index]
name = "{index}"
# "auto" uses Pinecone when an API key is set, the local backend otherwise
backend = "auto"
metric = "cosine"
upsert_batch_size = {upsert}
# data_dir = "/path/to/indexes"

[pinecone]
# api_key = "..."
cloud = "aws"
region = "us-east-1"

[ollama]
host = "http://localhost:11434"

[embedding]
# "ollama" or "hash" (offline, for testing)
backend = "ollama"
model = "{model}"
batch_size = {batch}
max_concurrent = 4
hash_dimension = {hash_dim}

[chunking]
chunk_size = {chunk_size}
overlap = {overlap}

[query]
top_k = {top_k}
separator = " "
chat_model = "{chat}"

[retry]
max_attempts = 4
base_delay_ms = 500
max_delay_ms = 16000
timeout_secs = 60

[logging]
level = "info"
"#,
            index = DEFAULT_INDEX_NAME,
            upsert = DEFAULT_UPSERT_BATCH_SIZE,
            model = DEFAULT_EMBEDDING_MODEL,
            batch = DEFAULT_BATCH_SIZE,
            hash_dim = DEFAULT_HASH_DIMENSION,
            chunk_size = default_chunk_size(),
            overlap = default_overlap(),
            top_k = DEFAULT_TOP_K,
            chat = DEFAULT_CHAT_MODEL,
        )
    }
}

/// Accept `OLLAMA_HOST` values without a scheme, as the Ollama CLI does.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Get the config directory for pdfrag.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("PDFRAG_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "pdfrag").map(|dirs| dirs.config_dir().to_path_buf())
}
