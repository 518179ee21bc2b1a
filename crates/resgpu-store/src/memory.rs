//! In-memory store

use async_trait::async_trait;
use resgpu_core::ResgpuResult;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::traits::{KeyValue, Store};

/// Store backed by a process-local map.
///
/// Used for embedded runs and tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> ResgpuResult<Vec<KeyValue>> {
        let records = self.records.read().await;
        Ok(records
            .get(key)
            .map(|value| vec![KeyValue::new(key, value.clone())])
            .unwrap_or_default())
    }

    async fn put(&self, key: &str, value: String) -> ResgpuResult<()> {
        self.records.write().await.insert(key.to_string(), value);
        debug!(key = key, "Stored record");
        Ok(())
    }

    async fn delete(&self, key: &str) -> ResgpuResult<()> {
        if self.records.write().await.remove(key).is_some() {
            debug!(key = key, "Deleted record");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
