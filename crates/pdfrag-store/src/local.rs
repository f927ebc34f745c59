//! Local file index backend.
//!
//! Each index is one JSON file `<data_dir>/<name>.json` holding its
//! descriptor and records. The file is rewritten atomically (temp file +
//! rename) after every upsert; search is brute force over the loaded records.

use async_trait::async_trait;
use pdfrag_core::{
    IndexDescriptor, IndexProvider, IndexRecord, IndexSpec, IndexStats, QueryMatch, StoreError,
    VectorIndex,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::data::IndexData;
use crate::validate_spec;

const INDEX_EXTENSION: &str = "json";

/// Provider of JSON-file indexes under a data directory.
pub struct LocalProvider {
    dir: PathBuf,
    /// Opened indexes, so every handle to a name shares one state
    open: Mutex<HashMap<String, Arc<LocalIndex>>>,
}

impl LocalProvider {
    /// Create a provider rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{INDEX_EXTENSION}"))
    }

    async fn load(&self, name: &str) -> Result<Option<IndexData>, StoreError> {
        let path = self.index_path(name);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        let data: IndexData = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Persistence(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(data))
    }
}

#[async_trait]
impl IndexProvider for LocalProvider {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StoreError::Persistence(e.to_string())),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(INDEX_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn describe(&self, name: &str) -> Result<Option<IndexDescriptor>, StoreError> {
        if let Some(index) = self.open.lock().await.get(name) {
            return Ok(Some(index.data.read().await.descriptor.clone()));
        }
        Ok(self.load(name).await?.map(|data| data.descriptor))
    }

    async fn create(&self, spec: &IndexSpec) -> Result<IndexDescriptor, StoreError> {
        validate_spec(spec)?;
        let _open = self.open.lock().await;
        if let Some(existing) = self.load(&spec.name).await? {
            return Ok(existing.descriptor);
        }

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Persistence(format!("failed to create {}: {e}", self.dir.display()))
        })?;

        let data = IndexData::new(IndexDescriptor::from(spec));
        persist(&self.index_path(&spec.name), &data).await?;
        info!(
            "Created local index '{}' at {}",
            spec.name,
            self.index_path(&spec.name).display()
        );
        Ok(data.descriptor)
    }

    async fn open(&self, name: &str) -> Result<Arc<dyn VectorIndex>, StoreError> {
        let mut open = self.open.lock().await;
        if let Some(index) = open.get(name) {
            return Ok(Arc::clone(index) as Arc<dyn VectorIndex>);
        }

        let data = self
            .load(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let index = Arc::new(LocalIndex {
            name: name.to_string(),
            path: self.index_path(name),
            data: RwLock::new(data),
        });
        open.insert(name.to_string(), Arc::clone(&index));
        Ok(index)
    }
}

/// A single JSON-file index.
pub struct LocalIndex {
    name: String,
    path: PathBuf,
    data: RwLock<IndexData>,
}

#[async_trait]
impl VectorIndex for LocalIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize, StoreError> {
        let mut data = self.data.write().await;

        // Apply to a copy so a failed write leaves memory and disk in agreement
        let mut updated = data.clone();
        let written = updated.upsert(records)?;
        persist(&self.path, &updated).await?;
        *data = updated;

        debug!("Upserted {} records into '{}'", written, self.name);
        Ok(written)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        self.data.read().await.query(vector, top_k)
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        Ok(self.data.read().await.stats())
    }
}

/// Write `data` to `path` through a temporary file and rename.
async fn persist(path: &Path, data: &IndexData) -> Result<(), StoreError> {
    let json = serde_json::to_vec(data)
        .map_err(|e| StoreError::Persistence(format!("failed to serialize index: {e}")))?;

    let tmp = path.with_extension(format!("{INDEX_EXTENSION}.tmp"));
    fs::write(&tmp, &json).await.map_err(|e| {
        StoreError::Persistence(format!("failed to write {}: {e}", tmp.display()))
    })?;
    fs::rename(&tmp, path).await.map_err(|e| {
        StoreError::Persistence(format!("failed to replace {}: {e}", path.display()))
    })?;
    Ok(())
}
