//! Node lifecycle, capacity and usage operations

use resgpu_core::{
    EngineInfo, NodeResource, NodeResourceInfo, NodeResourceRequest, ResgpuError, ResgpuResult,
    WorkloadResource, WorkloadResourceRequest,
};
use resgpu_scheduler::{
    calculate_node_resource, estimate_nodes, reconcile, repair, select_most_idle,
    NodesDeployCapacity, RepairOutcome, ResourceSource,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::plugin::{ensure_nodename, ensure_nodenames, Plugin};

/// Priority hint returned with the most idle node
pub const IDLE_PRIORITY: i64 = 100;

/// A capacity or usage ledger before and after an update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceChange {
    pub before: NodeResource,
    pub after: NodeResource,
}

/// A node record together with its drift against live workloads
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeResourceReport {
    pub capacity: NodeResource,
    pub usage: NodeResource,
    pub diffs: Vec<String>,
}

/// The least utilized node among a candidate set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MostIdleNode {
    pub nodename: String,
    pub priority: i64,
}

impl Plugin {
    /// Register a node.
    ///
    /// Capacity comes from `resource`; when that is empty it falls back to
    /// what the engine reports for this plugin. Usage starts empty.
    pub async fn add_node(
        &self,
        nodename: &str,
        resource: Option<&NodeResourceRequest>,
        engine_info: Option<&EngineInfo>,
    ) -> ResgpuResult<NodeResourceInfo> {
        ensure_nodename(nodename)?;

        match self.load_node(nodename).await {
            Ok(_) => return Err(ResgpuError::NodeExists(nodename.to_string())),
            Err(ResgpuError::NodeNotExists(_)) | Err(ResgpuError::InvalidRecordCount(_)) => {}
            Err(e) => {
                error!(node = %nodename, error = %e, "Failed to get resource info of node");
                return Err(e);
            }
        }

        let mut capacity = NodeResource::new(
            resource
                .map(NodeResourceRequest::prod_count_map)
                .unwrap_or_default(),
        );
        if capacity.prod_count_map.is_empty() {
            if let Some(reported) = engine_info
                .map(|i| i.resource(self.name()))
                .transpose()?
                .flatten()
            {
                capacity = reported;
            }
        }

        let info = NodeResourceInfo::new(capacity, NodeResource::default());
        self.save_node(nodename, &info).await?;

        info!(node = %nodename, capacity = info.capacity.count(), "Node added");
        Ok(info)
    }

    /// Forget a node; removing an unknown node succeeds
    pub async fn remove_node(&self, nodename: &str) -> ResgpuResult<()> {
        ensure_nodename(nodename)?;

        if let Err(e) = self.delete_node(nodename).await {
            error!(node = %nodename, error = %e, "Failed to delete node");
            return Err(e);
        }
        info!(node = %nodename, "Node removed");
        Ok(())
    }

    /// How many copies of `req` each node can still take.
    ///
    /// Every node must exist; nodes with no room are left out of the map.
    pub async fn get_nodes_deploy_capacity(
        &self,
        nodenames: &[String],
        req: &WorkloadResourceRequest,
    ) -> ResgpuResult<NodesDeployCapacity> {
        ensure_nodenames(nodenames)?;
        if let Err(e) = req.validate() {
            error!(error = %e, "Invalid workload resource request");
            return Err(e);
        }

        let nodes = self.load_nodes(nodenames).await?;
        let result = estimate_nodes(nodes.iter().map(|(n, i)| (n.as_str(), i)), req);

        debug!(
            nodes = nodenames.len(),
            available = result.nodes_deploy_capacity_map.len(),
            total = result.total,
            "Estimated deploy capacity"
        );
        Ok(result)
    }

    /// Update the installed capacity of a node
    pub async fn set_node_resource_capacity(
        &self,
        nodename: &str,
        resource_request: Option<&NodeResourceRequest>,
        resource: Option<&NodeResource>,
        delta: bool,
        incr: bool,
    ) -> ResgpuResult<ResourceChange> {
        ensure_nodename(nodename)?;
        let mut info = self.load_node(nodename).await?;
        let before = info.capacity.clone();

        // An overwrite request without a ledger keeps the current capacity
        let request = resource_request.cloned().map(|mut req| {
            if !delta {
                req.load_from_origin(&before);
            }
            req
        });

        let source = ResourceSource::pick(request.as_ref(), resource, &[]);
        info.capacity = calculate_node_resource(source, &before, delta, incr);

        if let Err(e) = self.save_node(nodename, &info).await {
            error!(node = %nodename, error = %e, ?info, "Failed to set node capacity");
            return Err(e);
        }

        info!(
            node = %nodename,
            before = before.count(),
            after = info.capacity.count(),
            "Node capacity updated"
        );
        Ok(ResourceChange {
            before,
            after: info.capacity,
        })
    }

    /// Update the allocated usage of a node
    pub async fn set_node_resource_usage(
        &self,
        nodename: &str,
        resource_request: Option<&NodeResourceRequest>,
        resource: Option<&NodeResource>,
        workloads_resource: &[WorkloadResource],
        delta: bool,
        incr: bool,
    ) -> ResgpuResult<ResourceChange> {
        ensure_nodename(nodename)?;
        let mut info = self.load_node(nodename).await?;
        let before = info.usage.clone();

        let source = ResourceSource::pick(resource_request, resource, workloads_resource);
        info.usage = calculate_node_resource(source, &before, delta, incr);

        if let Err(e) = self.save_node(nodename, &info).await {
            error!(node = %nodename, error = %e, ?info, "Failed to set node usage");
            return Err(e);
        }

        debug!(
            node = %nodename,
            before = before.count(),
            after = info.usage.count(),
            "Node usage updated"
        );
        Ok(ResourceChange {
            before,
            after: info.usage,
        })
    }

    /// Read a node record and compare its usage with the live workloads
    pub async fn get_node_resource_info(
        &self,
        nodename: &str,
        workloads_resource: &[WorkloadResource],
    ) -> ResgpuResult<NodeResourceReport> {
        ensure_nodename(nodename)?;
        let info = self.load_node(nodename).await.map_err(|e| {
            error!(node = %nodename, error = %e, "Failed to get resource info of node");
            e
        })?;

        let report = reconcile(&info, workloads_resource);
        Ok(NodeResourceReport {
            capacity: info.capacity,
            usage: info.usage,
            diffs: report.diffs,
        })
    }

    /// Replace a node record wholesale
    pub async fn set_node_resource_info(
        &self,
        nodename: &str,
        capacity: NodeResource,
        usage: NodeResource,
    ) -> ResgpuResult<()> {
        ensure_nodename(nodename)?;
        let info = NodeResourceInfo::new(capacity, usage);
        self.save_node(nodename, &info).await?;

        info!(
            node = %nodename,
            capacity = info.capacity.count(),
            usage = info.usage.count(),
            "Node resource info set"
        );
        Ok(())
    }

    /// Rewrite a node's usage from its live workloads when they disagree.
    ///
    /// A failed save does not fail the call; it is reported in the outcome.
    pub async fn fix_node_resource(
        &self,
        nodename: &str,
        workloads_resource: &[WorkloadResource],
    ) -> ResgpuResult<RepairOutcome> {
        ensure_nodename(nodename)?;
        let mut info = self.load_node(nodename).await.map_err(|e| {
            error!(node = %nodename, error = %e, "Failed to get resource info of node");
            e
        })?;

        let report = reconcile(&info, workloads_resource);
        if !repair(&mut info, &report) {
            return Ok(RepairOutcome::new(info, report.diffs));
        }

        info!(node = %nodename, diffs = report.diffs.len(), "Fixing node usage");
        let saved = self.save_node(nodename, &info).await;
        let outcome = RepairOutcome::new(info, report.diffs);
        match saved {
            Ok(()) => Ok(outcome),
            Err(e) => {
                warn!(node = %nodename, error = %e, "Failed to save fixed node usage");
                Ok(outcome.with_persist_error(e))
            }
        }
    }

    /// Pick the node with the lowest usage ratio; every node must exist
    pub async fn get_most_idle_node(&self, nodenames: &[String]) -> ResgpuResult<MostIdleNode> {
        ensure_nodenames(nodenames)?;
        let nodes = self.load_nodes(nodenames).await?;

        let idle = select_most_idle(nodes.iter().map(|(n, i)| (n.as_str(), i)))
            .ok_or(ResgpuError::EmptyNodeName)?;

        debug!(node = %idle.nodename, ratio = idle.ratio, "Selected most idle node");
        Ok(MostIdleNode {
            nodename: idle.nodename,
            priority: IDLE_PRIORITY,
        })
    }
}
