//! Store trait definitions

use async_trait::async_trait;
use futures::future::try_join_all;
use resgpu_core::{ResgpuError, ResgpuResult};

/// One stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Key of a node's resource record
pub fn node_key(prefix: &str, nodename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), nodename)
}

/// Key-value store holding one record per node.
///
/// Stores do no locking across calls: a read followed by a write of the
/// same key is last-writer-wins.
#[async_trait]
pub trait Store: Send + Sync {
    /// All records stored under `key`; a healthy store yields zero or one
    async fn get(&self, key: &str) -> ResgpuResult<Vec<KeyValue>>;

    /// Exactly one record per key, in key order.
    ///
    /// Any key without exactly one record fails the whole lookup with
    /// `InvalidRecordCount`. Keys are fetched concurrently.
    async fn get_multi(&self, keys: &[String]) -> ResgpuResult<Vec<KeyValue>> {
        let lookups = keys.iter().map(|key| async move {
            let mut records = self.get(key).await?;
            if records.len() != 1 {
                return Err(ResgpuError::InvalidRecordCount(format!(
                    "key: {}, count: {}",
                    key,
                    records.len()
                )));
            }
            Ok(records.remove(0))
        });
        try_join_all(lookups).await
    }

    /// Insert or replace the record under `key`
    async fn put(&self, key: &str, value: String) -> ResgpuResult<()>;

    /// Remove the record under `key`; removing an absent key succeeds
    async fn delete(&self, key: &str) -> ResgpuResult<()>;

    /// Get the store backend name
    fn name(&self) -> &'static str;
}
