//! Pinecone serverless index backend.
//!
//! Index lifecycle goes through the control plane (`https://api.pinecone.io`);
//! reads and writes go to the index's own data-plane host. Every request runs
//! under the provider's [`RetryPolicy`].

use async_trait::async_trait;
use pdfrag_core::{
    ChunkPayload, DistanceMetric, IndexDescriptor, IndexProvider, IndexRecord, IndexSpec,
    IndexStats, QueryMatch, RetryPolicy, StoreError, VectorIndex,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Control plane base URL.
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// API version sent with every request.
pub const API_VERSION: &str = "2025-01";

/// Maximum vectors per upsert request.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Tag carrying the embedding model name on created indexes.
const MODEL_TAG: &str = "embedding_model";

/// Settings for [`PineconeProvider`].
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// API key
    pub api_key: String,
    /// Serverless cloud (e.g. `aws`)
    pub cloud: String,
    /// Serverless region (e.g. `us-east-1`)
    pub region: String,
    /// Control plane base URL
    pub control_url: String,
    /// Timeout and retry for each request
    pub retry: RetryPolicy,
    /// How long to wait for a new index to become ready
    pub ready_timeout: Duration,
    /// Delay between readiness checks
    pub poll_interval: Duration,
}

impl PineconeConfig {
    /// Settings with default URL, retry and readiness timing.
    pub fn new(
        api_key: impl Into<String>,
        cloud: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            cloud: cloud.into(),
            region: region.into(),
            control_url: CONTROL_PLANE_URL.to_string(),
            retry: RetryPolicy::default(),
            ready_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Shared HTTP plumbing for control- and data-plane calls.
#[derive(Clone)]
struct PineconeClient {
    client: Client,
    retry: RetryPolicy,
}

impl PineconeClient {
    fn new(api_key: &str, retry: RetryPolicy) -> Result<Self, StoreError> {
        if api_key.trim().is_empty() {
            return Err(StoreError::Init("missing Pinecone API key".to_string()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| StoreError::Init("invalid Pinecone API key".to_string()))?,
        );
        headers.insert(
            "X-Pinecone-API-Version",
            HeaderValue::from_static(API_VERSION),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Init(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, retry })
    }

    /// Send a request that must reach `resource`; 404 is [`StoreError::NotFound`].
    async fn send<B, T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        resource: &str,
    ) -> Result<T, StoreError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.fetch(method, url, body)
            .await?
            .ok_or_else(|| StoreError::NotFound(resource.to_string()))
    }

    /// Send a request with retries; `Ok(None)` on 404.
    async fn fetch<B, T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, StoreError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let operation = format!("pinecone {method} {url}");
        self.retry
            .run(&operation, || async {
                let mut request = self.client.request(method.clone(), url);
                if let Some(body) = body {
                    request = request.json(body);
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| StoreError::Request(e.to_string()))?;

                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !status.is_success() {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    return Err(status_error(status.as_u16(), body));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StoreError::Request(e.to_string()))?;
                // Some endpoints answer with an empty body
                let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
                serde_json::from_slice(bytes)
                    .map(Some)
                    .map_err(|e| StoreError::Query(format!("invalid response: {e}")))
            })
            .await
    }
}

/// Map a non-success status to an error.
fn status_error(status: u16, body: String) -> StoreError {
    match status {
        429 => StoreError::RateLimited(body),
        404 => StoreError::NotFound(body),
        400 | 422 => StoreError::InvalidRequest(body),
        _ => StoreError::Status { status, body },
    }
}

/// Provider of Pinecone serverless indexes.
pub struct PineconeProvider {
    http: PineconeClient,
    control_url: String,
    cloud: String,
    region: String,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl PineconeProvider {
    /// Create a provider from settings.
    pub fn new(config: PineconeConfig) -> Result<Self, StoreError> {
        Ok(Self {
            http: PineconeClient::new(&config.api_key, config.retry)?,
            control_url: config.control_url.trim_end_matches('/').to_string(),
            cloud: config.cloud,
            region: config.region,
            ready_timeout: config.ready_timeout,
            poll_interval: config.poll_interval,
        })
    }

    async fn describe_model(&self, name: &str) -> Result<Option<IndexModel>, StoreError> {
        let url = format!("{}/indexes/{}", self.control_url, name);
        self.http.fetch::<(), IndexModel>(Method::GET, &url, None).await
    }

    /// Poll until the index reports ready or the readiness timeout passes.
    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescriptor, StoreError> {
        let started = Instant::now();
        loop {
            if let Some(model) = self.describe_model(name).await? {
                let descriptor = model.into_descriptor()?;
                if descriptor.ready {
                    return Ok(descriptor);
                }
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(StoreError::Init(format!(
                    "index '{}' not ready after {:?}",
                    name, self.ready_timeout
                )));
            }
            debug!("Waiting for index '{}' to become ready", name);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl IndexProvider for PineconeProvider {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/indexes", self.control_url);
        let list: Option<IndexList> = self.http.fetch::<(), _>(Method::GET, &url, None).await?;
        Ok(list
            .map(|l| l.indexes.into_iter().map(|m| m.name).collect())
            .unwrap_or_default())
    }

    async fn describe(&self, name: &str) -> Result<Option<IndexDescriptor>, StoreError> {
        self.describe_model(name)
            .await?
            .map(IndexModel::into_descriptor)
            .transpose()
    }

    async fn create(&self, spec: &IndexSpec) -> Result<IndexDescriptor, StoreError> {
        validate_pinecone_name(&spec.name)?;
        if spec.dimension == 0 {
            return Err(StoreError::InvalidRequest(
                "dimension must be at least 1".to_string(),
            ));
        }

        let mut tags = HashMap::new();
        if let Some(model) = &spec.embedding_model {
            tags.insert(MODEL_TAG.to_string(), model.clone());
        }
        let request = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: pinecone_metric(spec.metric),
            spec: CreateSpec {
                serverless: Serverless {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
            tags,
        };

        let url = format!("{}/indexes", self.control_url);
        match self
            .http
            .send::<_, Value>(Method::POST, &url, Some(&request), &spec.name)
            .await
        {
            Ok(_) => info!(
                "Created Pinecone index '{}' ({} dims, {}) in {}/{}",
                spec.name, spec.dimension, spec.metric, self.cloud, self.region
            ),
            // 409: created concurrently or by an earlier attempt
            Err(StoreError::Status { status: 409, .. }) => {
                debug!("Index '{}' already exists", spec.name);
            }
            Err(e) => return Err(e),
        }

        self.wait_until_ready(&spec.name).await
    }

    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>, StoreError> {
        let mut descriptor = self
            .describe(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if !descriptor.ready {
            descriptor = self.wait_until_ready(name).await?;
        }
        let host = descriptor
            .host
            .ok_or_else(|| StoreError::Init(format!("index '{name}' has no host")))?;

        Ok(Arc::new(PineconeIndex {
            http: self.http.clone(),
            base_url: host_url(&host),
            name: name.to_string(),
        }))
    }
}

/// Data-plane handle to one Pinecone index.
pub struct PineconeIndex {
    http: PineconeClient,
    base_url: String,
    name: String,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, StoreError> {
        let url = format!("{}/vectors/upsert", self.base_url);
        let mut written = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let mut vectors = Vec::with_capacity(batch.len());
            for record in batch {
                let metadata = serde_json::to_value(&record.payload).map_err(|e| {
                    StoreError::Insert(format!("failed to encode metadata: {e}"))
                })?;
                vectors.push(UpsertVector {
                    id: &record.id,
                    values: &record.vector,
                    metadata,
                });
            }
            let request = UpsertRequest { vectors };

            // An empty body carries no count
            let response: Option<UpsertResponse> = self
                .http
                .send(Method::POST, &url, Some(&request), &self.name)
                .await?;
            let count = response.map_or(batch.len(), |r| r.upserted_count);
            written += count;
            debug!("Upserted {} vectors into '{}'", count, self.name);
        }
        Ok(written)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        if top_k == 0 {
            return Err(StoreError::InvalidRequest(
                "top_k must be at least 1".to_string(),
            ));
        }
        let url = format!("{}/query", self.base_url);
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response: QueryResponse = self
            .http
            .send(Method::POST, &url, Some(&request), &self.name)
            .await?;

        let mut matches: Vec<QueryMatch> = response
            .matches
            .into_iter()
            .map(PineconeMatch::into_match)
            .collect::<Result<_, _>>()?;
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        let url = format!("{}/describe_index_stats", self.base_url);
        let empty = serde_json::json!({});
        let response: StatsResponse = self
            .http
            .send(Method::POST, &url, Some(&empty), &self.name)
            .await?;
        Ok(IndexStats {
            name: self.name.clone(),
            record_count: response.total_vector_count,
            dimension: response.dimension,
            last_updated: None,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

impl IndexModel {
    fn into_descriptor(self) -> Result<IndexDescriptor, StoreError> {
        let dimension = self.dimension.filter(|&d| d > 0).ok_or_else(|| {
            StoreError::Init(format!("index '{}' has no dimension", self.name))
        })?;
        Ok(IndexDescriptor {
            metric: self
                .metric
                .as_deref()
                .and_then(|m| m.parse().ok())
                .unwrap_or_default(),
            dimension,
            embedding_model: self.tags.and_then(|mut tags| tags.remove(MODEL_TAG)),
            ready: self.status.is_some_and(|s| s.ready),
            host: self.host.filter(|h| !h.is_empty()),
            name: self.name,
        })
    }
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'static str,
    spec: CreateSpec<'a>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    tags: HashMap<String, String>,
}

#[derive(Serialize)]
struct CreateSpec<'a> {
    serverless: Serverless<'a>,
}

#[derive(Serialize)]
struct Serverless<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl PineconeMatch {
    fn into_match(self) -> Result<QueryMatch, StoreError> {
        let payload = match self.metadata {
            Some(metadata) => {
                serde_json::from_value(normalize_metadata(metadata)).map_err(|e| {
                    StoreError::Query(format!("invalid metadata on '{}': {e}", self.id))
                })?
            }
            None => ChunkPayload::default(),
        };
        Ok(QueryMatch {
            id: self.id,
            score: self.score,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Pinecone's name for a metric.
fn pinecone_metric(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "cosine",
        DistanceMetric::Dot => "dotproduct",
        DistanceMetric::Euclidean => "euclidean",
    }
}

/// Data-plane base URL for an index host.
fn host_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Pinecone index names: 1-45 lowercase alphanumerics or hyphens.
fn validate_pinecone_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= 45
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidRequest(format!(
            "invalid Pinecone index name '{name}': use 1-45 lowercase letters, digits or hyphens"
        )))
    }
}

/// Make returned metadata deserializable into [`ChunkPayload`].
///
/// Pinecone stores every number as a float, so integral values come back
/// as `2.0`; those are turned back into integers. Values that are neither
/// strings nor numbers are stringified to fit the string-valued extras.
fn normalize_metadata(metadata: Map<String, Value>) -> Value {
    let normalized = metadata
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64 => {
                        Value::Number(Number::from(f as u64))
                    }
                    _ => Value::String(n.to_string()),
                },
                Value::String(_) => value,
                Value::Bool(b) => Value::String(b.to_string()),
                other => Value::String(other.to_string()),
            };
            (key, value)
        })
        .collect();
    Value::Object(normalized)
}
