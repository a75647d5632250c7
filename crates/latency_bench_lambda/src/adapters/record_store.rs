use std::collections::HashMap;

use async_trait::async_trait;
use latency_bench_core::contract::BenchmarkRecord;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Key-value store the workload handler measures against.
///
/// `get` returns `Ok(None)` for a missing key; callers decide whether that is
/// an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, key: &str, record: &BenchmarkRecord) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<BenchmarkRecord>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, BenchmarkRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put(&self, key: &str, record: &BenchmarkRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<BenchmarkRecord>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }
}
