//! Greedy allocator that carves identical device slices out of a node

use resgpu_core::{
    EngineParams, NodeResourceInfo, ProdCountMap, ResgpuError, ResgpuResult, WorkloadResource,
    WorkloadResourceRequest,
};
use serde::Serialize;
use tracing::debug;

use crate::capacity::MAX_CAPACITY;

/// Result of a deploy calculation: one entry per workload slot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeployPlan {
    /// Engine params for each slot
    pub engines_params: Vec<EngineParams>,
    /// Resource each slot will hold
    pub workloads_resource: Vec<WorkloadResource>,
}

impl DeployPlan {
    pub fn len(&self) -> usize {
        self.workloads_resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads_resource.is_empty()
    }
}

/// Free count of a product; negative availability counts as nothing free
pub(crate) fn free(available: &ProdCountMap, prod: &str) -> i64 {
    available.get(prod).max(0)
}

/// Allocate `deploy_count` slices of `req` from the node's free resource.
///
/// All-or-nothing: if any slice cannot be fully satisfied the whole call
/// fails with `InsufficientResource` and no slice is returned. An empty
/// request yields `deploy_count` empty slices. More than [`MAX_CAPACITY`]
/// slices are never planned.
pub fn allocate(
    info: &NodeResourceInfo,
    deploy_count: usize,
    req: &WorkloadResourceRequest,
) -> ResgpuResult<DeployPlan> {
    if deploy_count as u64 > MAX_CAPACITY as u64 {
        return Err(ResgpuError::InsufficientResource(format!(
            "deploy count {} exceeds the limit of {}",
            deploy_count, MAX_CAPACITY
        )));
    }

    let mut available = info.available();
    let mut plan = DeployPlan::default();

    for index in 0..deploy_count {
        for (prod, wanted) in req.prod_count_map.iter() {
            let have = free(&available, prod);
            if have < wanted {
                return Err(ResgpuError::InsufficientResource(format!(
                    "slot {} of {} needs {} {}, only {} free",
                    index + 1,
                    deploy_count,
                    wanted,
                    prod,
                    have
                )));
            }
        }

        for (prod, wanted) in req.prod_count_map.iter() {
            let remaining = available.get(prod).saturating_sub(wanted);
            available.insert(prod, remaining);
        }

        plan.engines_params
            .push(EngineParams::new(req.prod_count_map.clone()));
        plan.workloads_resource
            .push(WorkloadResource::new(req.prod_count_map.clone()));
    }

    debug!(
        slots = plan.len(),
        request = req.count(),
        "Allocated workload slots"
    );

    Ok(plan)
}
