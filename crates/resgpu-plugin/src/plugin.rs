//! Plugin handle and node record access

use resgpu_core::{NodeResourceInfo, PluginConfig, ResgpuError, ResgpuResult};
use resgpu_store::{node_key, Store};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// The GPU resource plugin.
///
/// Every operation loads the records it needs, runs the pure engines from
/// `resgpu-scheduler` and writes at most one record back. Nothing guards a
/// read-modify-write cycle: the host must serialize mutating calls for the
/// same node.
pub struct Plugin {
    /// Plugin name, also the key read from engine info resources
    name: String,
    /// Store key prefix
    prefix: String,
    store: Arc<dyn Store>,
}

impl Plugin {
    /// Create a plugin over an already opened store
    pub fn new(config: &PluginConfig, store: Arc<dyn Store>) -> Self {
        debug!(
            name = %config.name,
            prefix = %config.store.prefix,
            store = store.name(),
            "Plugin initialized"
        );
        Self {
            name: config.name.clone(),
            prefix: config.store.prefix.clone(),
            store,
        }
    }

    /// Get the plugin name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, nodename: &str) -> String {
        node_key(&self.prefix, nodename)
    }

    /// Load the record of one node
    pub(crate) async fn load_node(&self, nodename: &str) -> ResgpuResult<NodeResourceInfo> {
        let key = self.key(nodename);
        let records = self.store.get(&key).await?;
        match records.as_slice() {
            [] => Err(ResgpuError::NodeNotExists(nodename.to_string())),
            [record] => Ok(serde_json::from_str(&record.value)?),
            _ => Err(ResgpuError::InvalidRecordCount(format!(
                "key: {}, count: {}",
                key,
                records.len()
            ))),
        }
    }

    /// Load the records of several nodes, in the given order.
    ///
    /// A repeated name is loaded once, at its first position. Fails as a
    /// whole if any node has no record.
    pub(crate) async fn load_nodes(
        &self,
        nodenames: &[String],
    ) -> ResgpuResult<Vec<(String, NodeResourceInfo)>> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = nodenames
            .iter()
            .filter(|nodename| seen.insert(nodename.as_str()))
            .collect();
        let keys: Vec<String> = unique.iter().map(|n| self.key(n)).collect();
        let records = self.store.get_multi(&keys).await?;

        unique
            .into_iter()
            .zip(records)
            .map(|(nodename, record)| {
                let info = serde_json::from_str(&record.value)?;
                Ok((nodename.clone(), info))
            })
            .collect()
    }

    /// Validate and persist the record of one node
    pub(crate) async fn save_node(
        &self,
        nodename: &str,
        info: &NodeResourceInfo,
    ) -> ResgpuResult<()> {
        if let Err(e) = info.validate() {
            error!(node = %nodename, error = %e, "Refusing to save invalid node record");
            return Err(e);
        }
        let value = serde_json::to_string(info)?;
        self.store.put(&self.key(nodename), value).await
    }

    /// Delete the record of one node
    pub(crate) async fn delete_node(&self, nodename: &str) -> ResgpuResult<()> {
        self.store.delete(&self.key(nodename)).await
    }
}

/// Reject an empty node name before touching the store
pub(crate) fn ensure_nodename(nodename: &str) -> ResgpuResult<()> {
    if nodename.trim().is_empty() {
        return Err(ResgpuError::EmptyNodeName);
    }
    Ok(())
}

/// Reject an empty node list or any empty name in it
pub(crate) fn ensure_nodenames(nodenames: &[String]) -> ResgpuResult<()> {
    if nodenames.is_empty() {
        return Err(ResgpuError::EmptyNodeName);
    }
    nodenames.iter().try_for_each(|n| ensure_nodename(n))
}
