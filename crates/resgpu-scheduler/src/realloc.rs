//! Reallocation of a running workload's resource

use resgpu_core::{
    EngineParams, NodeResourceInfo, ResgpuResult, WorkloadResource, WorkloadResourceRequest,
};
use serde::Serialize;
use tracing::debug;

use crate::allocator::allocate;

/// Outcome of a realloc calculation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReallocPlan {
    /// Engine params for the resized workload
    pub engine_params: EngineParams,
    /// Signed change to apply to the node usage
    pub delta_resource: WorkloadResource,
    /// Resource the workload holds after the resize
    pub workload_resource: WorkloadResource,
}

/// Compute the new resource of a workload that currently holds `origin`.
///
/// The request is added to the origin; negative counts shrink it and a
/// product never drops below zero. The workload's current holding is
/// returned to the free pool before the new resource is allocated, so a
/// resize only needs headroom for the growth. `info` is not modified.
pub fn realloc(
    info: &NodeResourceInfo,
    origin: &WorkloadResource,
    req: &WorkloadResourceRequest,
) -> ResgpuResult<ReallocPlan> {
    req.validate_prod()?;
    origin.validate()?;

    let mut freed = info.clone();
    freed.usage.sub(&origin.prod_count_map);

    let mut merged = origin.prod_count_map.clone();
    merged.add(&req.prod_count_map);
    merged.retain_positive();
    let merged = WorkloadResourceRequest::new(merged);
    merged.validate()?;

    let mut plan = allocate(&freed, 1, &merged)?;
    let engine_params = plan.engines_params.remove(0);
    let workload_resource = plan.workloads_resource.remove(0);

    let delta_resource = WorkloadResource::new(
        workload_resource
            .prod_count_map
            .signed_diff(&origin.prod_count_map),
    );

    debug!(
        origin = origin.count(),
        new = workload_resource.count(),
        delta = delta_resource.count(),
        "Calculated realloc"
    );

    Ok(ReallocPlan {
        engine_params,
        delta_resource,
        workload_resource,
    })
}
