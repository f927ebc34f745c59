//! In-process index state shared by the memory and local backends.

use chrono::{DateTime, Utc};
use pdfrag_core::{IndexDescriptor, IndexRecord, IndexStats, QueryMatch, StoreError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Records of one index plus its stored configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexData {
    pub descriptor: IndexDescriptor,
    #[serde(default)]
    pub records: BTreeMap<String, IndexRecord>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl IndexData {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            descriptor,
            records: BTreeMap::new(),
            last_updated: None,
        }
    }

    /// Insert or replace records by id.
    ///
    /// The whole batch is rejected if any vector has the wrong dimension.
    pub fn upsert(&mut self, records: &[IndexRecord]) -> Result<usize, StoreError> {
        let expected = self.descriptor.dimension;
        if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.vector.len(),
            });
        }

        for record in records {
            self.records.insert(record.id.clone(), record.clone());
        }
        if !records.is_empty() {
            self.last_updated = Some(Utc::now());
        }
        Ok(records.len())
    }

    /// Brute-force nearest-neighbour search, highest score first.
    ///
    /// Ties are broken by id so results are deterministic.
    pub fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        if top_k == 0 {
            return Err(StoreError::InvalidRequest(
                "top_k must be at least 1".to_string(),
            ));
        }
        if vector.len() != self.descriptor.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.descriptor.dimension,
                actual: vector.len(),
            });
        }

        let metric = self.descriptor.metric;
        let mut scored: Vec<(f32, &IndexRecord)> = self
            .records
            .values()
            .map(|record| (metric.similarity(vector, &record.vector), record))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| QueryMatch {
                id: record.id.clone(),
                score,
                payload: record.payload.clone(),
            })
            .collect())
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            name: self.descriptor.name.clone(),
            record_count: self.records.len() as u64,
            dimension: self.descriptor.dimension,
            last_updated: self.last_updated,
        }
    }
}
