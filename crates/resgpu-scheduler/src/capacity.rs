//! Deploy capacity estimation across nodes

use resgpu_core::{ratio, NodeResourceInfo, WorkloadResourceRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::allocator::free;

/// Capacity reported for a request that needs no device
pub const MAX_CAPACITY: i64 = 1_000_000;

/// How many copies of a request fit on one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDeployCapacity {
    /// Number of slices that fit
    pub capacity: i64,
    /// Node usage over capacity
    pub usage: f64,
    /// Request size over node capacity
    pub rate: f64,
    /// Host-side weight, carries no allocation meaning
    pub weight: i64,
}

/// Estimate the deploy capacity of a single node
pub fn estimate(info: &NodeResourceInfo, req: &WorkloadResourceRequest) -> NodeDeployCapacity {
    let capacity = if req.count() == 0 {
        MAX_CAPACITY
    } else {
        let available = info.available();
        req.prod_count_map
            .iter()
            .filter(|(_, wanted)| *wanted > 0)
            .map(|(prod, wanted)| free(&available, prod) / wanted)
            .min()
            .unwrap_or(MAX_CAPACITY)
    };

    let node_count = info.capacity.count();
    NodeDeployCapacity {
        capacity,
        usage: ratio(info.usage.count(), node_count),
        rate: ratio(req.count(), node_count),
        weight: 1,
    }
}

/// Deploy capacity of a set of nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodesDeployCapacity {
    /// Nodes that can take at least one slice
    pub nodes_deploy_capacity_map: BTreeMap<String, NodeDeployCapacity>,
    /// Sum of capacities, saturating at `i64::MAX`
    pub total: i64,
}

impl NodesDeployCapacity {
    /// Record a node; nodes that cannot take a single slice are left out
    /// and a node already recorded keeps its first estimate
    pub fn insert(&mut self, nodename: impl Into<String>, capacity: NodeDeployCapacity) {
        if capacity.capacity <= 0 {
            return;
        }
        let nodename = nodename.into();
        if self.nodes_deploy_capacity_map.contains_key(&nodename) {
            return;
        }
        self.total = self.total.saturating_add(capacity.capacity);
        self.nodes_deploy_capacity_map.insert(nodename, capacity);
    }
}

/// Estimate and aggregate the deploy capacity of several nodes
pub fn estimate_nodes<'a, I>(nodes: I, req: &WorkloadResourceRequest) -> NodesDeployCapacity
where
    I: IntoIterator<Item = (&'a str, &'a NodeResourceInfo)>,
{
    let mut result = NodesDeployCapacity::default();
    for (nodename, info) in nodes {
        result.insert(nodename, estimate(info, req));
    }
    result
}
